use serde::{Deserialize, Serialize};
use ticketeer_macros::Storage;
use ticketeer_storage::{Json, Stored};

use super::{Author, Deferred};

/// A single revision of a response's content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// The revision's content.
    pub content: Box<str>,
    /// The revision's time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// A persisted ticket response.
///
/// Stored at `<messages>/<created-on>.json`; the first revision in `history` is the original
/// content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Storage)]
#[serde(rename_all = "kebab-case")]
#[format(Json)]
#[location("{}/{}", Box<str>, i64)]
pub struct Record {
    /// The response's author.
    pub author: Author,
    /// The response's creation time in milliseconds since the Unix epoch.
    pub created_on: i64,
    /// The response's content history.
    pub history: Vec<Revision>,
}

impl Record {
    /// Creates a new [`Record`] containing its original content.
    pub fn new(author: Author, content: impl Into<Box<str>>, created_on: i64) -> Self {
        let history = vec![Revision { content: content.into(), timestamp: created_on }];

        Self { author, created_on, history }
    }
}

/// Prepares a write of a new response record into the given messages directory.
pub fn create(messages_dir: &str, record: Record) -> Deferred {
    let key = Record::stored((messages_dir.into(), record.created_on));

    Deferred::write("Write message", key, record)
}

/// Prepares an edit of the response record created at the given time, appending the revision to
/// its history.
///
/// The prepared operation fails if no such record exists.
pub fn append_edit(messages_dir: &str, created_on: i64, revision: Revision) -> Deferred {
    let key = Record::stored((messages_dir.into(), created_on));

    Deferred::update("Edit message", key, move |record: &mut Record| record.history.push(revision))
}

#[cfg(test)]
mod tests {
    use ticketeer_storage::Stored;

    use super::{Record, Revision};
    use crate::data::testing::author;

    #[test]
    fn records_are_named_by_creation_time() {
        let dir = tempfile::tempdir().unwrap();
        let messages = dir.path().to_string_lossy();
        let written = super::create(&messages, Record::new(author(3), "help", 1_700)).run().unwrap();

        assert_eq!(&*written, dir.path().join("1700.json"));

        let raw = std::fs::read_to_string(&written).unwrap();

        assert!(raw.contains("\"created-on\":1700"));
        assert!(raw.contains("\"history\":[{\"content\":\"help\",\"timestamp\":1700}]"));
    }

    #[test]
    fn edits_append_to_history() {
        let dir = tempfile::tempdir().unwrap();
        let messages = dir.path().to_string_lossy();

        super::create(&messages, Record::new(author(3), "first", 10)).run().unwrap();
        super::append_edit(&messages, 10, Revision { content: "second".into(), timestamp: 20 })
            .run()
            .unwrap();

        let record = Record::stored((messages.into(), 10)).read().unwrap();

        assert_eq!(record.history.len(), 2);
        assert_eq!(&*record.history[0].content, "first");
        assert_eq!(&*record.history[1].content, "second");
        assert_eq!(record.history[1].timestamp, 20);
    }

    #[test]
    fn editing_a_missing_record_fails() {
        let dir = tempfile::tempdir().unwrap();
        let messages = dir.path().to_string_lossy();
        let revision = Revision { content: "ghost".into(), timestamp: 5 };
        let error = super::append_edit(&messages, 99, revision).run().unwrap_err();

        assert_eq!(error.operation, "Edit message");
        assert!(!dir.path().join("99.json").exists());
    }
}
