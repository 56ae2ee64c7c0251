use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use ticketeer_logger::warn;
use ticketeer_macros::Storage;
use ticketeer_storage::{Json, Stored};
use twilight_model::id::marker::{GuildMarker, UserMarker};
use twilight_model::id::Id;

use super::{
    Author, Batch, ChannelKind, Closed, Deferred, Edit, Error, LoadError, Post, Roster, Ticket,
    TICKET_ROOT,
};
use crate::util::hex::{string_to_hex, to_hex_string};

/// A guild's privileged role names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    /// The role allowed to configure the bot.
    pub admin: Box<str>,
    /// The role notified of new tickets.
    pub helper: Box<str>,
}

impl Default for Roles {
    fn default() -> Self {
        Self { admin: "Bot Commander".into(), helper: "Assistant".into() }
    }
}

/// A guild's help channel names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Channels {
    /// The text channel that receives ticket notifications.
    pub help_text: Box<str>,
    /// The voice channel used for live help.
    pub help_voice: Box<str>,
}

impl Default for Channels {
    fn default() -> Self {
        Self { help_text: "help-tickets".into(), help_voice: "Help Tickets".into() }
    }
}

/// A guild's persisted information, stored at `<guild>/guildInfo.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Storage)]
#[serde(rename_all = "kebab-case")]
#[format(Json)]
#[location("{}/guildInfo", Box<str>)]
pub struct Info {
    pub id: Id<GuildMarker>,
    pub name: Box<str>,
    pub roles: Roles,
    pub channels: Channels,
    /// The number of tickets ever opened, as hexadecimal text.
    pub ticket_count: Box<str>,
    /// The identifiers of every open ticket, oldest first.
    pub tickets: Vec<Box<str>>,
    /// Maps response creation times to ticket identifiers.
    pub messages: BTreeMap<i64, Box<str>>,
}

/// A served community and its queue of open tickets.
#[derive(Debug)]
pub struct Guild {
    id: Id<GuildMarker>,
    name: Box<str>,
    roles: Roles,
    channels: Channels,
    ticket_count: u64,
    /// Open tickets, oldest first.
    tickets: Vec<Ticket>,
    /// Maps ticket identifiers to their position within `tickets`.
    index: HashMap<Box<str>, usize>,
    messages: BTreeMap<i64, Box<str>>,
    dir: Box<str>,
}

impl Guild {
    /// Creates a new guild with default settings, stored within the given directory.
    ///
    /// Nothing is written until the batch returned by [`Guild::dump`] is flushed.
    #[must_use]
    pub fn new(dir: impl Into<Box<str>>, id: Id<GuildMarker>, name: impl Into<Box<str>>) -> Self {
        Self {
            id,
            name: name.into(),
            roles: Roles::default(),
            channels: Channels::default(),
            ticket_count: 0,
            tickets: vec![],
            index: HashMap::new(),
            messages: BTreeMap::new(),
            dir: dir.into(),
        }
    }

    /// Loads a guild and its open tickets from the given guild directory.
    ///
    /// Tickets that cannot be read, or that were closed before the guild was last saved, are
    /// skipped.
    ///
    /// # Errors
    ///
    /// This function will return an error if the guild's information could not be read.
    pub fn load(dir: &str) -> Result<Self, LoadError> {
        let key = Info::stored(dir.into());
        let info = key.read().map_err(|source| LoadError::Storage {
            path: key.path().to_string_lossy().into(),
            source,
        })?;
        let Some(ticket_count) = string_to_hex(&info.ticket_count) else {
            return Err(LoadError::Counter(info.ticket_count));
        };

        let mut guild = Self::new(dir, info.id, info.name);

        guild.roles = info.roles;
        guild.channels = info.channels;
        guild.ticket_count = ticket_count;
        guild.messages = info.messages;

        for id in info.tickets {
            if guild.index.contains_key(&id) {
                warn!("skipping duplicate ticket {id} in '{dir}'").ok();
                continue;
            }

            match Ticket::load(&format!("{dir}/{TICKET_ROOT}/{id}")) {
                Ok(ticket) if ticket.is_closed() => {}
                Ok(ticket) => {
                    guild.index.insert(id, guild.tickets.len());
                    guild.tickets.push(ticket);
                }
                Err(error) => {
                    warn!("skipping ticket {id} in '{dir}': {error}").ok();
                }
            }
        }

        Ok(guild)
    }

    /// Returns this guild's identifier.
    #[must_use]
    pub const fn id(&self) -> Id<GuildMarker> {
        self.id
    }

    /// Returns this guild's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns this guild's cache key.
    #[must_use]
    pub fn key(&self) -> String {
        super::cache::get_key(self.id, &self.name)
    }

    /// Returns this guild's directory.
    #[must_use]
    pub fn dir(&self) -> &str {
        &self.dir
    }

    #[must_use]
    pub const fn roles(&self) -> &Roles {
        &self.roles
    }

    #[must_use]
    pub const fn channels(&self) -> &Channels {
        &self.channels
    }

    /// Returns the number of tickets ever opened within this guild.
    #[must_use]
    pub const fn ticket_count(&self) -> u64 {
        self.ticket_count
    }

    /// Returns this guild's open tickets, oldest first.
    #[must_use]
    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    /// Returns the identifier of the ticket that the response created at `created_on` belongs to.
    #[must_use]
    pub fn message_ticket(&self, created_on: i64) -> Option<&str> {
        self.messages.get(&created_on).map(|id| &**id)
    }

    /// Resolves the open ticket that the given message content refers to.
    ///
    /// The ticket number is the second whitespace-separated word of the content. If it is missing
    /// or is not a valid ticket number, the oldest open ticket is returned.
    #[must_use]
    pub fn get_ticket(&self, content: &str) -> Option<&Ticket> {
        self.position(content).map(|index| &self.tickets[index])
    }

    /// Resolves the queue position of the open ticket that the given content refers to.
    fn position(&self, content: &str) -> Option<usize> {
        if self.tickets.is_empty() {
            return None;
        }

        match content.split_whitespace().nth(1).filter(|word| string_to_hex(word).is_some()) {
            Some(id) => self.index.get(id).copied(),
            None => Some(0),
        }
    }

    /// Rebuilds the ticket index from the ticket queue.
    fn reindex(&mut self) {
        self.index = self.tickets.iter().enumerate().map(|(i, t)| (t.id().into(), i)).collect();
    }

    /// Returns whether the given user holds this guild's admin role.
    pub fn is_admin(&self, roster: &impl Roster, user_id: Id<UserMarker>) -> bool {
        roster.role(&self.roles.admin).is_some_and(|role_id| roster.has_role(user_id, role_id))
    }

    /// Ensures that the given user is an admin.
    fn authorize(&self, roster: &impl Roster, requester: &Author) -> Result<(), Error> {
        if self.is_admin(roster, requester.id) {
            Ok(())
        } else {
            Err(Error::Denied(requester.username.clone()))
        }
    }

    /// Sets this guild's admin role.
    ///
    /// # Errors
    ///
    /// This function will return an error if the requester is not an admin or the role does not
    /// exist.
    pub fn set_admin(
        &mut self,
        roster: &impl Roster,
        requester: &Author,
        role: &str,
    ) -> Result<Batch, Error> {
        self.authorize(roster, requester)?;

        if roster.role(role).is_none() {
            return Err(Error::UnknownRole(role.into()));
        }

        self.roles.admin = role.into();

        Ok(self.dump_info().into())
    }

    /// Sets this guild's helper role.
    ///
    /// # Errors
    ///
    /// This function will return an error if the requester is not an admin or the role does not
    /// exist.
    pub fn set_helper(
        &mut self,
        roster: &impl Roster,
        requester: &Author,
        role: &str,
    ) -> Result<Batch, Error> {
        self.authorize(roster, requester)?;

        if roster.role(role).is_none() {
            return Err(Error::UnknownRole(role.into()));
        }

        self.roles.helper = role.into();

        Ok(self.dump_info().into())
    }

    /// Sets this guild's help text channel.
    ///
    /// # Errors
    ///
    /// This function will return an error if the requester is not an admin or the text channel
    /// does not exist.
    pub fn set_help_text_channel(
        &mut self,
        roster: &impl Roster,
        requester: &Author,
        channel: &str,
    ) -> Result<Batch, Error> {
        self.authorize(roster, requester)?;

        if roster.channel(channel, ChannelKind::Text).is_none() {
            return Err(Error::UnknownChannel(channel.into()));
        }

        self.channels.help_text = channel.into();

        Ok(self.dump_info().into())
    }

    /// Sets this guild's help voice channel.
    ///
    /// # Errors
    ///
    /// This function will return an error if the requester is not an admin or the voice channel
    /// does not exist.
    pub fn set_help_voice_channel(
        &mut self,
        roster: &impl Roster,
        requester: &Author,
        channel: &str,
    ) -> Result<Batch, Error> {
        self.authorize(roster, requester)?;

        if roster.channel(channel, ChannelKind::Voice).is_none() {
            return Err(Error::UnknownChannel(channel.into()));
        }

        self.channels.help_voice = channel.into();

        Ok(self.dump_info().into())
    }

    /// Opens a new ticket on behalf of the given author and appends it to the queue.
    pub fn open_ticket(&mut self, author: Author, timestamp: i64) -> Batch {
        self.ticket_count += 1;

        while self.index.contains_key(to_hex_string(self.ticket_count).as_str()) {
            self.ticket_count += 1;
        }

        let ticket = Ticket::open(self.ticket_count, author, timestamp, &self.dir);
        let batch = Batch::from(ticket.prepare()).with(ticket.dump());

        self.index.insert(ticket.id().into(), self.tickets.len());
        self.tickets.push(ticket);

        batch.with(self.dump_info())
    }

    /// Records the given message as a response to the ticket it refers to.
    ///
    /// # Errors
    ///
    /// This function will return an error if the message does not refer to an open ticket.
    pub fn respond_ticket(&mut self, post: &Post) -> Result<Batch, Error> {
        let index = self.position(&post.content).ok_or(Error::TicketNotFound)?;
        let ticket = &mut self.tickets[index];

        self.messages.insert(post.created_on, ticket.id().into());

        let response = ticket.respond(post.author.clone(), &post.content, post.created_on);

        Ok(Batch::from(response).with(self.dump_info()))
    }

    /// Records an edit to a previous ticket response.
    ///
    /// # Errors
    ///
    /// This function will return an error if the original message was never recorded as a
    /// response or if its ticket is no longer open.
    pub fn edit_ticket_response(&self, edit: &Edit) -> Result<Batch, Error> {
        let id = self.messages.get(&edit.created_on).ok_or(Error::MessageNotFound)?;
        let index = *self.index.get(id).ok_or(Error::TicketNotFound)?;
        let ticket = &self.tickets[index];

        Ok(ticket.edit_response(&edit.content, edit.created_on, edit.edited_on).into())
    }

    /// Removes the ticket that the given message refers to from the queue and closes it.
    ///
    /// # Errors
    ///
    /// This function will return an error if the message does not refer to an open ticket.
    pub fn close_ticket(&mut self, post: &Post) -> Result<Closed, Error> {
        let index = self.position(&post.content).ok_or(Error::TicketNotFound)?;
        let mut ticket = self.tickets.remove(index);

        self.reindex();

        let mut closed = ticket.close(post.author.clone(), &post.content, post.created_on)?;

        closed.batch.push(self.dump_info());

        Ok(closed)
    }

    /// Prepares a write of this guild's information.
    fn dump_info(&self) -> Deferred {
        let info = Info {
            id: self.id,
            name: self.name.clone(),
            roles: self.roles.clone(),
            channels: self.channels.clone(),
            ticket_count: to_hex_string(self.ticket_count).into_boxed_str(),
            tickets: self.tickets.iter().map(|t| t.id().into()).collect(),
            messages: self.messages.clone(),
        };

        Deferred::write("Guild dump", Info::stored(self.dir.clone()), info)
    }

    /// Prepares a write of this guild's information and of every open ticket.
    pub fn dump(&self) -> Batch {
        let root = format!("{}/{TICKET_ROOT}", self.dir);
        let mut batch = Batch::from(Deferred::create_dir("Create guild", root));

        batch.push(self.dump_info());
        batch.extend(self.tickets.iter().map(Ticket::dump).collect());
        batch
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use twilight_model::id::Id;

    use super::Guild;
    use crate::data::testing::{author, post, FakeRoster};
    use crate::data::{Edit, Error};
    use crate::util::hex::string_to_hex;

    fn guild(dir: &Path) -> Guild {
        let guild = Guild::new(dir.to_string_lossy(), Id::new(123_456_789_012_345_678), "Tester");

        assert!(guild.dump().flush().is_ok());
        guild
    }

    fn open(guild: &mut Guild, author_id: u64, timestamp: i64) -> String {
        assert!(guild.open_ticket(author(author_id), timestamp).flush().is_ok());
        guild.tickets().last().unwrap().id().to_string()
    }

    fn assert_consistent(guild: &Guild) {
        assert_eq!(guild.index.len(), guild.tickets.len());

        for (position, ticket) in guild.tickets.iter().enumerate() {
            assert_eq!(guild.index.get(ticket.id()), Some(&position));
        }
    }

    #[test]
    fn ticket_ids_strictly_increase() {
        let dir = tempfile::tempdir().unwrap();
        let mut guild = self::guild(dir.path());
        let ids = (0..20).map(|n| self::open(&mut guild, n + 1, n as i64)).collect::<Vec<_>>();
        let numbers = ids.iter().map(|id| string_to_hex(id).unwrap()).collect::<Vec<_>>();

        assert!(numbers.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(ids[15], "10");
    }

    #[test]
    fn queue_and_index_stay_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let mut guild = self::guild(dir.path());

        for n in 1..=5 {
            self::open(&mut guild, n, n as i64);
        }

        guild.close_ticket(&post(9, "!close 2 done", 100)).unwrap().batch.flush();
        self::assert_consistent(&guild);
        guild.close_ticket(&post(9, "!close", 101)).unwrap().batch.flush();
        self::assert_consistent(&guild);
        self::open(&mut guild, 6, 102);
        guild.close_ticket(&post(9, "!close 5", 103)).unwrap().batch.flush();
        self::assert_consistent(&guild);

        let ids = guild.tickets().iter().map(|t| t.id()).collect::<Vec<_>>();

        assert_eq!(ids, ["3", "4", "6"]);
    }

    #[test]
    fn closed_tickets_are_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let mut guild = self::guild(dir.path());
        let id = self::open(&mut guild, 1, 1);

        let closed = guild.close_ticket(&post(2, &format!("!close {id} fixed"), 5)).unwrap();

        assert_eq!(closed.author, author(1));
        assert!(closed.batch.flush().is_ok());
        assert!(guild.get_ticket(&format!("!reply {id}")).is_none());
        assert!(guild.get_ticket("!reply").is_none());
        assert_eq!(guild.close_ticket(&post(2, "!close", 6)).unwrap_err(), Error::TicketNotFound);

        let info = std::fs::read_to_string(dir.path().join("tickets/1/info.json")).unwrap();

        assert!(info.contains("\"close-timestamp\":5"));
    }

    #[test]
    fn unrecognized_numbers_default_to_the_oldest_ticket() {
        let dir = tempfile::tempdir().unwrap();
        let mut guild = self::guild(dir.path());

        for n in 1..=3 {
            self::open(&mut guild, n, n as i64);
        }

        assert_eq!(guild.get_ticket("!reply").unwrap().id(), "1");
        assert_eq!(guild.get_ticket("!reply please help").unwrap().id(), "1");
        assert_eq!(guild.get_ticket("!reply 03 leading zero").unwrap().id(), "1");
        assert_eq!(guild.get_ticket("!reply 3 explicit").unwrap().id(), "3");
        assert!(guild.get_ticket("!reply ff missing").is_none());
    }

    #[test]
    fn dump_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut guild = self::guild(dir.path());

        self::open(&mut guild, 1, 10);
        self::open(&mut guild, 2, 20);
        assert!(guild.respond_ticket(&post(3, "!reply 1 hello", 30)).unwrap().flush().is_ok());
        assert!(guild.respond_ticket(&post(3, "!reply 2 hi", 40)).unwrap().flush().is_ok());
        assert!(guild.dump().flush().is_ok());

        let loaded = Guild::load(guild.dir()).unwrap();

        assert_eq!(loaded.id(), guild.id());
        assert_eq!(loaded.name(), guild.name());
        assert_eq!(loaded.roles(), guild.roles());
        assert_eq!(loaded.channels(), guild.channels());
        assert_eq!(loaded.ticket_count(), 2);
        assert_eq!(loaded.tickets(), guild.tickets());
        assert_eq!(loaded.message_ticket(40), Some("2"));
        assert!(loaded.tickets().iter().all(|t| t.info().message_count == 1));
        self::assert_consistent(&loaded);
    }

    #[test]
    fn load_skips_tickets_closed_before_the_guild_was_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut guild = self::guild(dir.path());

        self::open(&mut guild, 1, 10);
        self::open(&mut guild, 2, 20);

        let info = dir.path().join("guildInfo.json");
        let stale = std::fs::read(&info).unwrap();

        assert!(guild.close_ticket(&post(3, "!close 1", 30)).unwrap().batch.flush().is_ok());

        // The ticket was closed, but the guild still lists it.
        std::fs::write(&info, stale).unwrap();

        let loaded = Guild::load(guild.dir()).unwrap();
        let ids = loaded.tickets().iter().map(|t| t.id()).collect::<Vec<_>>();

        assert_eq!(ids, ["2"]);
    }

    #[test]
    fn respond_without_tickets_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut guild = self::guild(dir.path());
        let error = guild.respond_ticket(&post(1, "!reply hello", 5)).unwrap_err();

        assert_eq!(error, Error::TicketNotFound);
        assert_eq!(guild.message_ticket(5), None);
        assert_eq!(std::fs::read_dir(dir.path().join("tickets")).unwrap().count(), 0);
    }

    #[test]
    fn edits_require_a_recorded_response() {
        let dir = tempfile::tempdir().unwrap();
        let mut guild = self::guild(dir.path());

        self::open(&mut guild, 1, 10);

        let before = std::fs::read_to_string(dir.path().join("guildInfo.json")).unwrap();
        let edit = Edit { content: "changed".into(), created_on: 77, edited_on: 78 };

        assert_eq!(guild.edit_ticket_response(&edit).unwrap_err(), Error::MessageNotFound);
        assert_eq!(std::fs::read_to_string(dir.path().join("guildInfo.json")).unwrap(), before);
        assert_eq!(std::fs::read_dir(dir.path().join("tickets/1/messages")).unwrap().count(), 0);

        guild.respond_ticket(&post(2, "!reply typo", 77)).unwrap().flush();

        assert!(guild.edit_ticket_response(&edit).unwrap().flush().is_ok());

        let record = std::fs::read_to_string(dir.path().join("tickets/1/messages/77.json")).unwrap();

        assert!(record.contains("\"content\":\"changed\",\"timestamp\":78"));
    }

    #[test]
    fn setters_require_admin_and_existing_targets() {
        let dir = tempfile::tempdir().unwrap();
        let mut guild = self::guild(dir.path());
        let roster = FakeRoster::with_admin();

        assert!(guild.is_admin(&roster, Id::new(1)));
        assert!(!guild.is_admin(&roster, Id::new(2)));
        assert_eq!(
            guild.set_helper(&roster, &author(2), "Staff").unwrap_err(),
            Error::Denied("user2".into())
        );
        assert_eq!(
            guild.set_helper(&roster, &author(1), "Nobody").unwrap_err(),
            Error::UnknownRole("Nobody".into())
        );
        assert_eq!(
            guild.set_help_text_channel(&roster, &author(1), "Support Room").unwrap_err(),
            Error::UnknownChannel("Support Room".into())
        );
        assert_eq!(&*guild.roles().helper, "Assistant");

        assert!(guild.set_helper(&roster, &author(1), "Staff").unwrap().flush().is_ok());
        assert!(guild.set_help_text_channel(&roster, &author(1), "support").unwrap().flush().is_ok());
        assert!(guild.set_help_voice_channel(&roster, &author(1), "Support Room").is_ok());
        assert!(guild.set_admin(&roster, &author(1), "Staff").is_ok());

        assert_eq!(&*guild.roles().helper, "Staff");
        assert_eq!(&*guild.channels().help_text, "support");
        assert_eq!(&*guild.channels().help_voice, "Support Room");
        // User 1 no longer holds the admin role.
        assert!(!guild.is_admin(&roster, Id::new(1)));

        let loaded = Guild::load(guild.dir()).unwrap();

        assert_eq!(&*loaded.roles().helper, "Staff");
        assert_eq!(&*loaded.channels().help_text, "support");
    }
}
