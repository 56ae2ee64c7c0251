use twilight_cache_inmemory::InMemoryCache;
use twilight_model::channel::ChannelType;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, RoleMarker, UserMarker};
use twilight_model::id::Id;

use crate::data::{ChannelKind, Roster};

/// A guild's roles, members, and channels as seen by the gateway cache.
#[derive(Clone, Copy, Debug)]
pub struct CachedRoster<'c> {
    /// The gateway cache.
    cache: &'c InMemoryCache,
    /// The guild being viewed.
    guild_id: Id<GuildMarker>,
}

impl<'c> CachedRoster<'c> {
    /// Creates a new [`CachedRoster`].
    #[must_use]
    pub const fn new(cache: &'c InMemoryCache, guild_id: Id<GuildMarker>) -> Self {
        Self { cache, guild_id }
    }
}

impl Roster for CachedRoster<'_> {
    fn role(&self, name: &str) -> Option<Id<RoleMarker>> {
        let roles = self.cache.guild_roles(self.guild_id)?;

        roles.iter().copied().find(|id| self.cache.role(*id).is_some_and(|r| r.resource().name == name))
    }

    fn has_role(&self, user_id: Id<UserMarker>, role_id: Id<RoleMarker>) -> bool {
        self.cache.member(self.guild_id, user_id).is_some_and(|m| m.roles().contains(&role_id))
    }

    fn channel(&self, name: &str, kind: ChannelKind) -> Option<Id<ChannelMarker>> {
        let kind = match kind {
            ChannelKind::Text => ChannelType::GuildText,
            ChannelKind::Voice => ChannelType::GuildVoice,
        };
        let channels = self.cache.guild_channels(self.guild_id)?;

        channels.iter().copied().find(|id| {
            self.cache.channel(*id).is_some_and(|c| c.kind == kind && c.name.as_deref() == Some(name))
        })
    }
}
