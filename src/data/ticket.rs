use serde::{Deserialize, Serialize};
use ticketeer_macros::Storage;
use ticketeer_storage::{Json, Stored};

use super::message::{self, Record, Revision};
use super::{Author, Batch, Deferred, Error, LoadError, MESSAGE_ROOT, TICKET_ROOT};
use crate::util::hex::to_hex_string;

/// The close timestamp of a ticket that is still open.
pub const OPEN: i64 = -1;

/// A ticket's persisted information, stored at `<ticket>/info.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Storage)]
#[serde(rename_all = "kebab-case")]
#[format(Json)]
#[location("{}/info", Box<str>)]
pub struct Info {
    /// The ticket's hexadecimal identifier.
    pub id: Box<str>,
    /// The user that opened the ticket.
    pub author: Author,
    /// The ticket's creation time.
    pub open_timestamp: i64,
    /// The ticket's close time, or [`OPEN`].
    pub close_timestamp: i64,
    /// The number of responses recorded for the ticket.
    pub message_count: u64,
}

/// A single help request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    /// The ticket's information.
    info: Info,
    /// The ticket's directory.
    dir: Box<str>,
    /// The ticket's response directory.
    messages: Box<str>,
}

/// The result of closing a ticket.
#[must_use]
#[derive(Debug)]
pub struct Closed {
    /// The closed ticket's identifier.
    pub id: Box<str>,
    /// The user that originally opened the ticket, to be notified of its closure.
    pub author: Author,
    /// The ticket's final writes.
    pub batch: Batch,
}

impl Ticket {
    /// Creates an open ticket numbered `number` within the given guild directory.
    ///
    /// Nothing is written until the batch returned by [`Ticket::prepare`] is flushed.
    #[must_use]
    pub fn open(number: u64, author: Author, timestamp: i64, guild_dir: &str) -> Self {
        let id = to_hex_string(number).into_boxed_str();
        let dir = format!("{guild_dir}/{TICKET_ROOT}/{id}");
        let info =
            Info { id, author, open_timestamp: timestamp, close_timestamp: OPEN, message_count: 0 };

        Self::from_info(info, dir)
    }

    /// Loads a ticket from the given ticket directory.
    ///
    /// # Errors
    ///
    /// This function will return an error if the ticket's information could not be read.
    pub fn load(dir: &str) -> Result<Self, LoadError> {
        let key = Info::stored(dir.into());
        let info = key.read().map_err(|source| LoadError::Storage {
            path: key.path().to_string_lossy().into(),
            source,
        })?;

        Ok(Self::from_info(info, dir))
    }

    /// Binds the given information to a ticket directory.
    fn from_info(info: Info, dir: impl Into<Box<str>>) -> Self {
        let dir = dir.into();
        let messages = format!("{dir}/{MESSAGE_ROOT}").into_boxed_str();

        Self { info, dir, messages }
    }

    /// Returns this ticket's identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// Returns the user that opened this ticket.
    #[must_use]
    pub const fn author(&self) -> &Author {
        &self.info.author
    }

    /// Returns this ticket's persisted information.
    #[must_use]
    pub const fn info(&self) -> &Info {
        &self.info
    }

    /// Returns this ticket's directory.
    #[must_use]
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Returns whether this ticket has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.info.close_timestamp != OPEN
    }

    /// Prepares the creation of this ticket's directories.
    pub fn prepare(&self) -> Deferred {
        Deferred::create_dir("Create ticket", &*self.messages)
    }

    /// Records a response to this ticket.
    ///
    /// The response count changes immediately, while the response itself is only written once
    /// the returned operation is performed.
    pub fn respond(&mut self, author: Author, content: &str, timestamp: i64) -> Deferred {
        self.info.message_count += 1;

        message::create(&self.messages, Record::new(author, content, timestamp))
    }

    /// Records an edit to the response created at `created_on`.
    #[must_use]
    pub fn edit_response(&self, content: &str, created_on: i64, timestamp: i64) -> Deferred {
        let revision = Revision { content: content.into(), timestamp };

        message::append_edit(&self.messages, created_on, revision)
    }

    /// Closes this ticket, recording the given closing remarks.
    ///
    /// # Errors
    ///
    /// This function will return an error if the ticket is already closed.
    pub fn close(&mut self, author: Author, content: &str, timestamp: i64) -> Result<Closed, Error> {
        if self.is_closed() {
            return Err(Error::TicketClosed(self.info.id.clone()));
        }

        self.info.close_timestamp = timestamp;

        let response = self.respond(author, content, timestamp);
        let batch = Batch::from(self.dump()).with(response);

        Ok(Closed { id: self.info.id.clone(), author: self.info.author.clone(), batch })
    }

    /// Prepares a write of this ticket's information.
    #[must_use]
    pub fn dump(&self) -> Deferred {
        Deferred::write("Ticket dump", Info::stored(self.dir.clone()), self.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{Ticket, OPEN};
    use crate::data::testing::author;
    use crate::data::Error;

    fn opened(guild_dir: &str) -> Ticket {
        let ticket = Ticket::open(26, author(7), 1_000, guild_dir);

        ticket.prepare().run().unwrap();
        ticket.dump().run().unwrap();
        ticket
    }

    #[test]
    fn open_uses_hexadecimal_directories() {
        let dir = tempfile::tempdir().unwrap();
        let guild_dir = dir.path().to_string_lossy();
        let ticket = self::opened(&guild_dir);

        assert_eq!(ticket.id(), "1a");
        assert_eq!(ticket.info().close_timestamp, OPEN);
        assert!(dir.path().join("tickets/1a/messages").is_dir());
        assert!(dir.path().join("tickets/1a/info.json").is_file());
    }

    #[test]
    fn respond_counts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ticket = self::opened(&dir.path().to_string_lossy());
        let pending = ticket.respond(author(8), "have you tried restarting?", 2_000);

        assert_eq!(ticket.info().message_count, 1);
        assert!(!dir.path().join("tickets/1a/messages/2000.json").exists());

        pending.run().unwrap();

        assert!(dir.path().join("tickets/1a/messages/2000.json").is_file());
    }

    #[test]
    fn close_is_one_way() {
        let dir = tempfile::tempdir().unwrap();
        let mut ticket = self::opened(&dir.path().to_string_lossy());
        let closed = ticket.close(author(8), "resolved", 3_000).unwrap();

        assert_eq!(closed.author, author(7));
        assert_eq!(closed.batch.len(), 2);
        assert!(closed.batch.flush().is_ok());
        assert!(ticket.is_closed());

        let error = ticket.close(author(8), "again", 4_000).unwrap_err();

        assert_eq!(error, Error::TicketClosed("1a".into()));
        assert_eq!(ticket.info().close_timestamp, 3_000);
        assert_eq!(ticket.info().message_count, 1);
    }

    #[test]
    fn load_restores_persisted_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut ticket = self::opened(&dir.path().to_string_lossy());

        ticket.respond(author(8), "first", 2_000).run().unwrap();
        ticket.dump().run().unwrap();

        let loaded = Ticket::load(ticket.dir()).unwrap();

        assert_eq!(loaded, ticket);
        assert_eq!(loaded.info().message_count, 1);
    }

    #[test]
    fn load_fails_without_info() {
        let dir = tempfile::tempdir().unwrap();

        assert!(Ticket::load(&dir.path().to_string_lossy()).is_err());
    }
}
