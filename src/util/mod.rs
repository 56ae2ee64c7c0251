use std::path::PathBuf;

use clap::Parser;
use twilight_model::id::marker::ApplicationMarker;
use twilight_model::id::Id;

/// Provides getters for the bot's environment secrets.
pub mod env;
/// Provides hexadecimal conversions for ticket numbering.
pub mod hex;
/// Provides the bot's invite link generator.
pub mod invite;

/// The default directory that guild data is stored within.
pub const DATA_DIRECTORY: &str = "./data/guilds";
/// The default directory that log files are written into.
pub const LOG_DIRECTORY: &str = "./logs";
/// The default directory that error log files are written into.
pub const ERROR_LOG_DIRECTORY: &str = "./logs/errors";

/// Wraps an [`anyhow::Result<T, E>`], providing a defaulted `T` generic type.
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;

/// The bot's command-line arguments.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Eq, Parser)]
#[command(author, about, version)]
pub struct Arguments {
    /// Disables logger printing.
    #[arg(short = 'q', long = "quiet")]
    pub log_no_print: bool,
    /// Disables log file writing.
    #[arg(short = 'e', long = "ephemeral")]
    pub log_no_write: bool,
    /// Disables error log file writing.
    #[arg(short = 'E', long = "ephemeral-errors")]
    pub log_no_error: bool,
    /// Disables colored logger output.
    #[arg(long = "no-color")]
    pub log_no_color: bool,

    /// The directory to store log files within.
    #[arg(long = "log-directory")]
    pub log_write_dir: Option<PathBuf>,
    /// The directory to store error log files within.
    #[arg(long = "error-log-directory")]
    pub log_error_dir: Option<PathBuf>,
    /// The directory that contains the bot's guild data.
    #[arg(short = 'd', long = "data-directory")]
    pub data_file_dir: Option<PathBuf>,

    /// Prints the bot's invite link for the given application and exits.
    #[arg(long = "invite", value_name = "APPLICATION_ID")]
    pub invite: Option<Id<ApplicationMarker>>,
}

impl Arguments {
    /// Returns the configured guild data directory.
    #[must_use]
    pub fn data_directory(&self) -> PathBuf {
        self.data_file_dir.clone().unwrap_or_else(|| PathBuf::from(DATA_DIRECTORY))
    }

    /// Returns the logger configuration described by these arguments.
    #[must_use]
    pub fn logger_config(&self) -> ticketeer_logger::Config {
        ticketeer_logger::Config {
            print: !self.log_no_print,
            write: !self.log_no_write,
            write_errors: !self.log_no_error,
            color: !self.log_no_color,
            directory: Some(self.log_write_dir.clone().unwrap_or_else(|| LOG_DIRECTORY.into())),
            error_directory: Some(
                self.log_error_dir.clone().unwrap_or_else(|| ERROR_LOG_DIRECTORY.into()),
            ),
            ..ticketeer_logger::Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Arguments;

    #[test]
    fn defaults_write_everything() {
        let arguments = Arguments::parse_from(["ticketeer"]);
        let config = arguments.logger_config();

        assert!(config.print && config.write && config.write_errors);
        assert_eq!(arguments.data_directory(), std::path::PathBuf::from(super::DATA_DIRECTORY));
        assert_eq!(arguments.invite, None);
    }

    #[test]
    fn flags_disable_outputs() {
        let arguments = Arguments::parse_from(["ticketeer", "-q", "-e", "-d", "/tmp/guilds"]);
        let config = arguments.logger_config();

        assert!(!config.print);
        assert!(!config.write);
        assert!(config.write_errors);
        assert_eq!(arguments.data_directory(), std::path::PathBuf::from("/tmp/guilds"));
    }

    #[test]
    fn invite_takes_an_application_id() {
        let arguments = Arguments::parse_from(["ticketeer", "--invite", "123456789012345678"]);

        assert_eq!(arguments.invite.map(|id| id.get()), Some(123_456_789_012_345_678));
    }
}
