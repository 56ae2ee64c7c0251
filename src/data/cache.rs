use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use ticketeer_logger::{debug, error, info, warn};
use twilight_model::id::marker::GuildMarker;
use twilight_model::id::Id;

use super::{Author, Batch, Closed, Edit, Error, Guild, LoadError, Post, Roster, WriteError};

/// Matches a guild key, capturing the guild's identifier and name.
static KEY_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Returns the guild key pattern.
#[allow(clippy::unwrap_used)]
fn key_pattern() -> &'static Regex {
    KEY_PATTERN.get_or_init(|| Regex::new(r"^\[(\d{17,20})\] (.+)$").unwrap())
}

/// Returns the key of the guild with the given identifier and name.
///
/// Path separators within the name are replaced so that the key is always a single directory.
#[must_use]
pub fn get_key(id: Id<GuildMarker>, name: &str) -> String {
    format!("[{id}] {}", name.replace(['/', '\\'], "_"))
}

/// Returns whether the given text is a guild key.
#[must_use]
pub fn is_key(candidate: &str) -> bool {
    key_pattern().is_match(candidate)
}

/// Logs a failed guild operation.
fn logged<T>(key: &str, result: Result<T, Error>) -> Result<T, Error> {
    if let Err(error) = &result {
        warn!("{key}: {error}").ok();
    }

    result
}

/// The registry of every served guild, keyed by guild key.
#[derive(Debug)]
pub struct TicketCache {
    /// The directory that every guild is stored within.
    root: Box<str>,
    /// The cached guilds.
    guilds: HashMap<Box<str>, Guild>,
}

impl TicketCache {
    /// Creates a new, empty cache stored within the given directory.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_string_lossy().into(), guilds: HashMap::new() }
    }

    /// Returns whether no guilds are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }

    /// Returns the guild with the given key.
    #[must_use]
    pub fn get_guild(&self, key: &str) -> Option<&Guild> {
        self.guilds.get(key)
    }

    /// Returns the guild with the given key.
    pub fn get_guild_mut(&mut self, key: &str) -> Option<&mut Guild> {
        self.guilds.get_mut(key)
    }

    /// Resolves the guild with the given key.
    fn resolve(&mut self, key: &str) -> Result<&mut Guild, Error> {
        self.guilds.get_mut(key).ok_or_else(|| Error::GuildNotFound(key.into()))
    }

    /// Adds a new guild with default settings.
    ///
    /// Returns [`None`] if the guild is already cached, otherwise returns the writes that create
    /// the guild's directory.
    pub fn insert(&mut self, id: Id<GuildMarker>, name: &str) -> Option<Batch> {
        let key = self::get_key(id, name);

        if self.guilds.contains_key(key.as_str()) {
            return None;
        }

        let guild = Guild::new(format!("{}/{key}", self.root), id, name);
        let batch = guild.dump();

        self.guilds.insert(key.into_boxed_str(), guild);

        Some(batch)
    }

    /// Loads the guild stored within the given directory.
    ///
    /// # Errors
    ///
    /// This function will return an error if the directory name is not a guild key or if the guild
    /// could not be loaded.
    pub fn populate(&mut self, dir: &Path) -> Result<(), LoadError> {
        let key = dir.file_name().map(|name| name.to_string_lossy()).unwrap_or_default();

        if !self::is_key(&key) {
            return Err(LoadError::Key(key.into()));
        }

        let guild = Guild::load(&dir.to_string_lossy())?;

        debug!("loaded {} open ticket(s) for {key}", guild.tickets().len()).ok();

        self.guilds.insert(key.into(), guild);

        Ok(())
    }

    /// Loads every guild stored within the root directory, creating it if it does not exist.
    ///
    /// Guilds that cannot be loaded are logged and skipped. Returns the number of loaded guilds.
    ///
    /// # Errors
    ///
    /// This function will return an error if the root directory could not be created or read.
    pub fn populate_all(&mut self) -> std::io::Result<usize> {
        let root = PathBuf::from(&*self.root);

        std::fs::create_dir_all(&root)?;

        let mut loaded = 0;

        for entry in std::fs::read_dir(&root)? {
            let path = entry?.path();

            if !path.is_dir() {
                continue;
            }

            match self.populate(&path) {
                Ok(()) => loaded += 1,
                Err(LoadError::Key(name)) => {
                    debug!("skipping non-guild directory '{name}'").ok();
                }
                Err(error) => {
                    error!("unable to load guild: {error}").ok();
                }
            }
        }

        info!("loaded {loaded} guild(s) from '{}'", self.root).ok();

        Ok(loaded)
    }

    /// Opens a ticket within the given guild.
    ///
    /// # Errors
    ///
    /// This function will return an error if the guild is not cached.
    pub fn open_ticket(&mut self, key: &str, author: Author, timestamp: i64) -> Result<Batch, Error> {
        let result = self.resolve(key).map(|guild| guild.open_ticket(author, timestamp));

        self::logged(key, result)
    }

    /// Responds to a ticket within the given guild.
    ///
    /// # Errors
    ///
    /// This function will return an error if the guild is not cached or the ticket is not open.
    pub fn respond_ticket(&mut self, key: &str, post: &Post) -> Result<Batch, Error> {
        let result = self.resolve(key).and_then(|guild| guild.respond_ticket(post));

        self::logged(key, result)
    }

    /// Edits a ticket response within the given guild.
    ///
    /// # Errors
    ///
    /// This function will return an error if the guild is not cached, the message is not a ticket
    /// response, or its ticket is no longer open.
    pub fn edit_ticket_response(&mut self, key: &str, edit: &Edit) -> Result<Batch, Error> {
        let result = self.resolve(key).and_then(|guild| guild.edit_ticket_response(edit));

        self::logged(key, result)
    }

    /// Closes a ticket within the given guild.
    ///
    /// # Errors
    ///
    /// This function will return an error if the guild is not cached or the ticket is not open.
    pub fn close_ticket(&mut self, key: &str, post: &Post) -> Result<Closed, Error> {
        let result = self.resolve(key).and_then(|guild| guild.close_ticket(post));

        self::logged(key, result)
    }

    /// Sets the admin role of the given guild.
    ///
    /// # Errors
    ///
    /// This function will return an error if the guild is not cached or the change is rejected.
    pub fn set_admin(
        &mut self,
        key: &str,
        roster: &impl Roster,
        requester: &Author,
        role: &str,
    ) -> Result<Batch, Error> {
        let result = self.resolve(key).and_then(|guild| guild.set_admin(roster, requester, role));

        self::logged(key, result)
    }

    /// Sets the helper role of the given guild.
    ///
    /// # Errors
    ///
    /// This function will return an error if the guild is not cached or the change is rejected.
    pub fn set_helper(
        &mut self,
        key: &str,
        roster: &impl Roster,
        requester: &Author,
        role: &str,
    ) -> Result<Batch, Error> {
        let result = self.resolve(key).and_then(|guild| guild.set_helper(roster, requester, role));

        self::logged(key, result)
    }

    /// Sets the help text channel of the given guild.
    ///
    /// # Errors
    ///
    /// This function will return an error if the guild is not cached or the change is rejected.
    pub fn set_help_text_channel(
        &mut self,
        key: &str,
        roster: &impl Roster,
        requester: &Author,
        channel: &str,
    ) -> Result<Batch, Error> {
        let result = self
            .resolve(key)
            .and_then(|guild| guild.set_help_text_channel(roster, requester, channel));

        self::logged(key, result)
    }

    /// Sets the help voice channel of the given guild.
    ///
    /// # Errors
    ///
    /// This function will return an error if the guild is not cached or the change is rejected.
    pub fn set_help_voice_channel(
        &mut self,
        key: &str,
        roster: &impl Roster,
        requester: &Author,
        channel: &str,
    ) -> Result<Batch, Error> {
        let result = self
            .resolve(key)
            .and_then(|guild| guild.set_help_voice_channel(roster, requester, channel));

        self::logged(key, result)
    }

    /// Writes every cached guild and its open tickets.
    ///
    /// # Errors
    ///
    /// This function will return an error containing every failed write if any write failed.
    pub fn dump(&self) -> Result<Vec<Box<Path>>, Vec<WriteError>> {
        let mut batch = Batch::new();

        for guild in self.guilds.values() {
            batch.extend(guild.dump());
        }

        let result = batch.flush().into_result();

        match &result {
            Ok(written) => {
                for path in written {
                    debug!("wrote '{}'", path.display()).ok();
                }
            }
            Err(failures) => {
                for failure in failures {
                    error!("{failure}").ok();
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use twilight_model::id::Id;

    use super::TicketCache;
    use crate::data::testing::{author, post, FakeRoster};
    use crate::data::Error;

    const GUILD: u64 = 123_456_789_012_345_678;

    #[test]
    fn keys_are_recognized() {
        let key = super::get_key(Id::new(GUILD), "Rust / Help");

        assert_eq!(key, "[123456789012345678] Rust _ Help");
        assert!(super::is_key(&key));
        assert!(!super::is_key("[123] Too Short"));
        assert!(!super::is_key("[123456789012345678]"));
        assert!(!super::is_key("[123456789012345678] "));
        assert!(!super::is_key("guilds"));
    }

    #[test]
    fn insert_only_creates_new_guilds() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = TicketCache::new(dir.path());
        let batch = cache.insert(Id::new(GUILD), "Tester").unwrap();

        assert!(batch.flush().is_ok());
        assert!(cache.insert(Id::new(GUILD), "Tester").is_none());
        assert!(cache.get_guild_mut("[123456789012345678] Tester").is_some());
        assert!(dir.path().join("[123456789012345678] Tester/guildInfo.json").is_file());
        assert!(dir.path().join("[123456789012345678] Tester/tickets").is_dir());
    }

    #[test]
    fn unknown_guilds_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = TicketCache::new(dir.path());

        assert_eq!(
            cache.respond_ticket("[1] Ghost", &post(1, "!reply hi", 1)).unwrap_err(),
            Error::GuildNotFound("[1] Ghost".into())
        );
        assert!(cache.set_admin("[1] Ghost", &FakeRoster::default(), &author(1), "x").is_err());
    }

    #[test]
    fn populate_all_restores_dumped_guilds() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = TicketCache::new(dir.path());
        let key = super::get_key(Id::new(GUILD), "Tester");

        cache.insert(Id::new(GUILD), "Tester").unwrap().flush();
        cache.open_ticket(&key, author(1), 10).unwrap().flush();
        cache.open_ticket(&key, author(2), 20).unwrap().flush();
        cache.respond_ticket(&key, &post(3, "!reply 2 on it", 30)).unwrap().flush();

        assert_eq!(cache.dump().unwrap().len(), 4);

        std::fs::create_dir_all(dir.path().join("not a guild")).unwrap();
        std::fs::create_dir_all(dir.path().join("[223456789012345678] Broken")).unwrap();
        std::fs::write(dir.path().join("stray.json"), "{}").unwrap();

        let mut restored = TicketCache::new(dir.path());

        assert_eq!(restored.populate_all().unwrap(), 1);

        let guild = restored.get_guild(&key).unwrap();

        assert_eq!(guild.key(), key);
        assert_eq!(guild.ticket_count(), 2);
        assert_eq!(guild.tickets().len(), 2);
        assert_eq!(guild.message_ticket(30), Some("2"));
    }

    #[test]
    fn populate_all_creates_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data/guilds");
        let mut cache = TicketCache::new(&root);

        assert_eq!(cache.populate_all().unwrap(), 0);
        assert!(cache.is_empty());
        assert!(root.is_dir());
    }

    #[test]
    fn dump_reports_every_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");

        std::fs::write(&blocker, "not a directory").unwrap();

        let mut cache = TicketCache::new(&blocker);

        assert!(cache.insert(Id::new(GUILD), "Tester").is_some());

        let failures = cache.dump().unwrap_err();

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].operation, "Create guild");
    }
}
