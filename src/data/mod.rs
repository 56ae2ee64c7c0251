use serde::{Deserialize, Serialize};
use twilight_model::id::marker::{ChannelMarker, RoleMarker, UserMarker};
use twilight_model::id::Id;

pub use self::cache::TicketCache;
pub use self::guild::Guild;
pub use self::ticket::{Closed, Ticket};
pub use self::write::{Batch, Deferred, Flushed, WriteError};

/// The in-memory guild registry.
pub mod cache;
/// Guild state and ticket lifecycle operations.
pub mod guild;
/// Ticket response records.
pub mod message;
/// Individual help tickets.
pub mod ticket;
/// Deferred file operations.
pub mod write;

/// The name of the directory that contains a guild's tickets.
pub const TICKET_ROOT: &str = "tickets";
/// The name of the directory that contains a ticket's responses.
pub const MESSAGE_ROOT: &str = "messages";

/// An error returned by a ticket or guild operation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The referenced guild is not cached.
    #[error("Guild not found: {0}")]
    GuildNotFound(Box<str>),
    /// The referenced ticket does not exist or is not open.
    #[error("Ticket not found")]
    TicketNotFound,
    /// The ticket has already been closed.
    #[error("Ticket {0} is already closed")]
    TicketClosed(Box<str>),
    /// The edited message was never recorded as a ticket response.
    #[error("Message not associated with any Ticket")]
    MessageNotFound,
    /// The requester does not hold the guild's admin role.
    #[error("{0} does not hold the admin role")]
    Denied(Box<str>),
    /// The named role does not exist within the guild.
    #[error("Role not found: {0}")]
    UnknownRole(Box<str>),
    /// The named channel does not exist within the guild.
    #[error("Channel not found: {0}")]
    UnknownChannel(Box<str>),
}

/// An error returned while loading persisted state.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The data could not be read or decoded.
    #[error("unable to read '{path}': {source}")]
    Storage {
        /// The file that failed to load.
        path: Box<str>,
        /// The underlying storage error.
        source: ticketeer_storage::Error<ticketeer_storage::Json>,
    },
    /// The guild's ticket counter is not canonical hexadecimal text.
    #[error("invalid ticket count '{0}'")]
    Counter(Box<str>),
    /// The directory name is not a guild key.
    #[error("'{0}' is not a guild key")]
    Key(Box<str>),
}

/// The identity of a message author.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// The author's user identifier.
    pub id: Id<UserMarker>,
    /// The author's display name.
    pub username: Box<str>,
}

impl Author {
    /// Creates a new [`Author`].
    pub fn new(id: Id<UserMarker>, username: impl Into<Box<str>>) -> Self {
        Self { id, username: username.into() }
    }
}

/// A chat message addressed to a guild's tickets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    /// The message's author.
    pub author: Author,
    /// The message's full content, including the command keyword.
    pub content: Box<str>,
    /// The message's creation time in milliseconds since the Unix epoch.
    pub created_on: i64,
}

/// An edit made to a previously posted chat message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edit {
    /// The message's new content.
    pub content: Box<str>,
    /// The original message's creation time in milliseconds since the Unix epoch.
    pub created_on: i64,
    /// The edit's time in milliseconds since the Unix epoch.
    pub edited_on: i64,
}

/// The kind of a guild channel.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ChannelKind {
    /// A text channel.
    Text,
    /// A voice channel.
    Voice,
}

/// A read-only view of a guild's roles, member roles, and channels.
///
/// This is implemented by the chat client so that guild configuration can be validated without
/// the data layer depending on a live connection.
pub trait Roster {
    /// Returns the identifier of the role with the given name.
    fn role(&self, name: &str) -> Option<Id<RoleMarker>>;

    /// Returns whether the given user holds the given role.
    fn has_role(&self, user_id: Id<UserMarker>, role_id: Id<RoleMarker>) -> bool;

    /// Returns the identifier of the channel with the given name and kind.
    fn channel(&self, name: &str, kind: ChannelKind) -> Option<Id<ChannelMarker>>;
}
