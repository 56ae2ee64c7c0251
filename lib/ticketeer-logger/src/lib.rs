//! Implements a threaded terminal and file system logger for the Ticketeer Discord bot.
#![deny(clippy::expect_used, unsafe_code, clippy::unwrap_used)]
#![warn(clippy::nursery, clippy::todo, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::thread::JoinHandle;
use std::time::Duration;

pub use crossbeam_channel::SendError;
use crossbeam_channel::{Receiver, Sender};
use owo_colors::{OwoColorize, Stream};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// The logging thread's sender channel.
static SENDER: OnceLock<Sender<Message>> = OnceLock::new();

/// Queues a log.
///
/// If the logging thread has not been installed, the log is printed directly to the standard
/// error stream instead.
///
/// # Errors
///
/// This function will return an error if the logging thread is closed.
pub fn queue(kind: Level, text: impl Display) -> Result<(), SendError<Message>> {
    let log = Log::new(Time::now(), kind, text);

    let Some(sender) = SENDER.get() else {
        eprintln!("{} (logger not installed)", log.display(None));

        return Ok(());
    };

    sender.send(Message::Queue(log))
}

/// Flushes the logger queue.
///
/// # Errors
///
/// This function will return an error if the logging thread is closed.
pub fn flush() -> Result<(), SendError<Message>> {
    SENDER.get().map_or(Ok(()), |sender| sender.send(Message::Flush))
}

/// Closes the logging thread.
///
/// Once closed, the thread cannot be re-installed and queueing a log will always return an error.
///
/// # Errors
///
/// This function will return an error if the logging thread is already closed.
pub fn close() -> Result<(), SendError<Message>> {
    SENDER.get().map_or(Ok(()), |sender| sender.send(Message::Close))
}

/// Installs the logging thread.
///
/// The returned handle must be kept alive; dropping it closes the thread and waits for the
/// remaining queue to be written.
///
/// # Errors
///
/// This function will return an error if a logger is already installed or if the thread could not
/// be spawned.
pub fn install(config: Config) -> std::io::Result<Handle> {
    let (sender, receiver) = crossbeam_channel::unbounded();

    if SENDER.set(sender).is_err() {
        let message = "the logging thread has already been installed";

        return Err(std::io::Error::new(std::io::ErrorKind::AlreadyExists, message));
    }

    let logger = Logger::new(config);
    let thread = std::thread::Builder::new()
        .name("logger".to_string())
        .spawn(move || self::consume(logger, &receiver))?;

    Ok(Handle { thread: Some(thread) })
}

/// Runs the logging thread's receiver loop.
fn consume(mut logger: Logger, receiver: &Receiver<Message>) -> std::io::Result<()> {
    use crossbeam_channel::RecvTimeoutError::{Disconnected, Timeout};

    let timeout = Duration::from_millis(logger.config.stale_time);

    loop {
        match receiver.recv_timeout(timeout) {
            Ok(Message::Queue(log)) if !logger.config.disabled() => logger.queue(log)?,
            Ok(Message::Flush) | Err(Timeout) if !logger.is_empty() => logger.flush()?,
            Ok(Message::Close) | Err(Disconnected) => return logger.flush(),
            _ => {}
        }
    }
}

/// A handle to the installed logging thread.
#[derive(Debug)]
pub struct Handle {
    /// The logging thread.
    thread: Option<JoinHandle<std::io::Result<()>>>,
}

impl Handle {
    /// Closes the logging thread and waits for it to finish writing.
    ///
    /// # Errors
    ///
    /// This function will return an error if the final flush failed.
    pub fn join(mut self) -> std::io::Result<()> {
        self.close_and_join()
    }

    /// Closes the logging thread and waits for it to finish writing.
    fn close_and_join(&mut self) -> std::io::Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        // The thread exits on its own if the channel is already closed.
        close().ok();

        thread.join().unwrap_or_else(|_| {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "the logging thread panicked"))
        })
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Err(error) = self.close_and_join() {
            eprintln!("unable to finish logging: {error}");
        }
    }
}

/// A message to be sent to the logging thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Outputs a log.
    Queue(Log),
    /// Flushes the logger.
    Flush,
    /// Closes the logging thread.
    Close,
}

/// A logger instance.
#[derive(Debug)]
pub struct Logger {
    /// The logger's configuration.
    config: Config,
    /// The output file path for all logs.
    path: Option<Box<Path>>,
    /// The output file path for error logs.
    error_path: Option<Box<Path>>,
    /// The logger's output queue.
    queue: Vec<Log>,
}

impl Logger {
    /// A time format for log file names.
    pub const FILENAME_FORMAT: &'static [FormatItem<'static>] = format_description!(
        version = 2,
        "[year repr:last_two][month padding:zero repr:numerical][day padding:zero]-[hour \
         padding:zero repr:24][minute padding:zero][second padding:zero]"
    );

    /// Creates a new [`Logger`].
    #[must_use]
    pub fn new(config: Config) -> Self {
        let time = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let name = time.format(Self::FILENAME_FORMAT).unwrap_or_else(|_| "latest".to_string());
        let file = |dir: &Path| dir.join(&name).with_extension("txt").into_boxed_path();

        let path = config.directory.as_deref().filter(|_| config.write).map(file);
        let error_path = config.error_directory.as_deref().filter(|_| config.write_errors).map(file);
        let queue = Vec::with_capacity(config.queue_size);

        Self { config, path, error_path, queue }
    }

    /// Returns whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns whether the queue is full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.config.queue_size
    }

    /// Appends a log to the queue, flushing the logger if its capacity is met or exceeded.
    ///
    /// # Errors
    ///
    /// This function will return an error if log(s) failed to output during a flush.
    pub fn queue(&mut self, log: Log) -> std::io::Result<()> {
        self.queue.push(log);

        if self.is_full() { self.flush() } else { Ok(()) }
    }

    /// Flushes the output queue of this [`Logger`].
    ///
    /// # Errors
    ///
    /// This function will return an error if log(s) failed to output.
    pub fn flush(&mut self) -> std::io::Result<()> {
        let logs = std::mem::take(&mut self.queue);

        if self.config.print {
            self.print(&logs)?;
        }
        if let Some(ref path) = self.path {
            Self::append(path, logs.iter())?;
        }
        if let Some(ref path) = self.error_path {
            Self::append(path, logs.iter().filter(|l| l.kind.error))?;
        }

        Ok(())
    }

    /// Prints the given logs to the terminal, sending errors to the standard error stream.
    fn print(&self, logs: &[Log]) -> std::io::Result<()> {
        let mut out = None;
        let mut err = None;

        for log in logs {
            let stream = log.stream();
            let text = log.display(self.config.support_color().then_some(stream));

            if log.kind.error {
                writeln!(err.get_or_insert_with(|| std::io::stderr().lock()), "{text}")?;
            } else {
                writeln!(out.get_or_insert_with(|| std::io::stdout().lock()), "{text}")?;
            }
        }

        Ok(())
    }

    /// Appends the given logs to the file at the given path.
    fn append<'l>(path: &Path, logs: impl Iterator<Item = &'l Log>) -> std::io::Result<()> {
        let buffer = logs.map(|l| l.display(None)).collect::<Vec<_>>();

        if buffer.is_empty() {
            return Ok(());
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let mut file = File::options().append(true).create(true).open(path)?;

        writeln!(file, "{}", buffer.join("\n"))
    }
}

/// A logger configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Whether console output is enabled.
    pub print: bool,
    /// Whether log file writing is enabled.
    pub write: bool,
    /// Whether error log file writing is enabled.
    pub write_errors: bool,
    /// Whether console colors are enabled.
    pub color: bool,
    /// The logger's output queue capacity.
    pub queue_size: usize,
    /// The logger's output queue timeout in milliseconds.
    pub stale_time: u64,
    /// The directory that log files are written into.
    pub directory: Option<PathBuf>,
    /// The directory that error log files are written into.
    pub error_directory: Option<PathBuf>,
}

impl Config {
    /// Returns whether this [`Config`] has logging disabled entirely.
    #[must_use]
    pub const fn disabled(&self) -> bool {
        !(self.print || self.write || self.write_errors) || self.queue_size == 0
    }

    /// Returns whether this [`Config`] allows color support.
    #[must_use]
    pub const fn support_color(&self) -> bool {
        self.print && self.color
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            print: true,
            write: true,
            write_errors: true,
            color: true,
            queue_size: 8,
            stale_time: 5_000,
            directory: Some(PathBuf::from("logs")),
            error_directory: Some(PathBuf::from("logs/errors")),
        }
    }
}

/// A log entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    /// The log's timestamp.
    pub time: Time,
    /// The log's level.
    pub kind: Level,
    /// The log's text.
    pub text: Box<str>,
}

impl Log {
    /// Creates a new [`Log`].
    pub fn new(time: Time, kind: Level, text: impl Display) -> Self {
        Self { time, kind, text: text.to_string().into_boxed_str() }
    }

    /// Returns the preferred output stream of this [`Log`].
    #[must_use]
    pub const fn stream(&self) -> Stream {
        if self.kind.error { Stream::Stderr } else { Stream::Stdout }
    }

    /// Formats and returns a display string representing this log.
    #[must_use]
    pub fn display(&self, color_stream: Option<Stream>) -> String {
        let time = self.time.display(color_stream);
        let kind = self.kind.display(color_stream);

        format!("{time} {kind} {}", self.text)
    }
}

/// A log timestamp.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Time {
    inner: OffsetDateTime,
}

impl Time {
    /// A time format for log headers.
    pub const FORMAT: &'static [FormatItem<'static>] = format_description!(
        version = 2,
        "\\[[day padding:zero]-[month padding:zero repr:numerical]-[year repr:last_two] [hour \
         padding:zero repr:24]:[minute padding:zero]:[second padding:zero].[subsecond digits:3]\\]"
    );

    /// Creates a new [`Time`].
    #[must_use]
    pub const fn new(inner: OffsetDateTime) -> Self {
        Self { inner }
    }

    /// Creates a new [`Time`] containing the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::new(OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()))
    }

    /// Formats and returns a display string representing this timestamp.
    #[must_use]
    pub fn display(&self, color_stream: Option<Stream>) -> String {
        let text = self.inner.format(Self::FORMAT).unwrap_or_else(|_| self.inner.to_string());

        if let Some(stream) = color_stream {
            text.if_supports_color(stream, |s| s.dimmed()).to_string()
        } else {
            text
        }
    }
}

/// A log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Level {
    /// The log level's name.
    pub name: &'static str,
    /// Whether the log level is considered an error.
    pub error: bool,
    /// Colorizes a string with the associated level color.
    pub color: fn(&String) -> String,
}

impl Level {
    /// Creates a new [`Level`].
    pub const fn new(name: &'static str, error: bool, color: fn(&String) -> String) -> Self {
        Self { name, error, color }
    }

    /// Formats and returns a display string representing this log level.
    #[must_use]
    pub fn display(&self, color_stream: Option<Stream>) -> String {
        let text = format!("({})", self.name);

        if let Some(stream) = color_stream {
            text.if_supports_color(stream, self.color).to_string()
        } else {
            text
        }
    }
}

/// Defines log levels.
macro_rules! levels {
    {$($const:ident($name:literal, $error:literal, $color:ident),)* $(,)?} => {
        impl Level {$(
            #[doc = concat!("The ", $name, " logging level.")]
            pub const $const: Self = Self::new($name, $error, |s| ::owo_colors::OwoColorize::$color(s).to_string());
        )*}
    };
}

levels! {
    DEBUG("debug", false, bright_purple),
    INFO("info", false, bright_blue),
    WARN("warn", false, bright_yellow),
    ERROR("error", true, bright_red),
}

/// Outputs a debug log. Debug logs are discarded in release builds.
///
/// ```ignore
/// debug!("loaded {count} guilds")?;
/// ```
#[macro_export]
macro_rules! debug {
    ($($args:tt)+) => {
        if ::std::cfg!(debug_assertions) {
            $crate::queue($crate::Level::DEBUG, ::std::format_args!($($args)+))
        } else {
            ::std::result::Result::<(), $crate::SendError<$crate::Message>>::Ok(())
        }
    };
}

/// Outputs an info log.
///
/// ```ignore
/// info!("opened ticket {id}")?;
/// ```
#[macro_export]
macro_rules! info {
    ($($args:tt)+) => {
        $crate::queue($crate::Level::INFO, ::std::format_args!($($args)+))
    };
}

/// Outputs a warn log.
///
/// ```ignore
/// warn!("unable to resolve guild {key}")?;
/// ```
#[macro_export]
macro_rules! warn {
    ($($args:tt)+) => {
        $crate::queue($crate::Level::WARN, ::std::format_args!($($args)+))
    };
}

/// Outputs an error log.
///
/// ```ignore
/// error!("failed to write {path}")?;
/// ```
#[macro_export]
macro_rules! error {
    ($($args:tt)+) => {
        $crate::queue($crate::Level::ERROR, ::std::format_args!($($args)+))
    };
}
