use std::sync::Arc;

use futures_util::StreamExt;
use ticketeer_logger::{error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use twilight_cache_inmemory::InMemoryCache;
use twilight_gateway::error::ReceiveMessageError;
use twilight_gateway::stream::{create_recommended, ShardEventStream};
use twilight_gateway::{Config, ConfigBuilder, Event, Intents, Shard};
use twilight_http::Client;
use twilight_model::gateway::payload::incoming::{GuildCreate, Ready};
use twilight_model::gateway::payload::outgoing::update_presence::UpdatePresencePayload;
use twilight_model::gateway::presence::{ActivityType, MinimalActivity, Status};
use twilight_model::id::marker::GuildMarker;
use twilight_model::id::Id;

use self::roster::CachedRoster;
use crate::data::cache::get_key;
use crate::data::TicketCache;
use crate::util::invite::{invite, PERMISSIONS};
use crate::util::Result;

/// Parses and executes chat commands.
pub mod command;
/// Provides the gateway cache's view of a guild.
pub mod roster;

/// The bot's gateway intents.
pub const INTENTS: Intents = Intents::GUILDS
    .union(Intents::GUILD_MEMBERS)
    .union(Intents::GUILD_MESSAGES)
    .union(Intents::MESSAGE_CONTENT);

/// The state shared by every event task.
#[derive(Debug)]
pub struct Context {
    /// The HTTP API client.
    pub http: Client,
    /// The gateway cache.
    pub cache: InMemoryCache,
    /// The ticket registry.
    pub tickets: Mutex<TicketCache>,
}

impl Context {
    /// Returns the ticket registry key of the given guild, if it is cached.
    #[must_use]
    pub fn guild_key(&self, guild_id: Id<GuildMarker>) -> Option<String> {
        self.cache.guild(guild_id).map(|guild| get_key(guild_id, guild.name()))
    }

    /// Returns a view of the given guild's roles, members, and channels.
    #[must_use]
    pub const fn roster(&self, guild_id: Id<GuildMarker>) -> CachedRoster<'_> {
        CachedRoster::new(&self.cache, guild_id)
    }
}

/// Implements a bot client.
#[derive(Debug)]
pub struct BotClient {
    /// The state shared by every event task.
    context: Arc<Context>,
    /// The bot client's gateway shards.
    shards: Box<[Shard]>,
}

impl BotClient {
    /// Returns a new [`BotClient`] that manages the given tickets.
    ///
    /// # Errors
    ///
    /// This function will return an error if the client could not create gateway shards.
    pub async fn new(tickets: TicketCache) -> Result<Self> {
        let token = crate::util::env::token()?;
        let http = Client::new(token.to_string());
        let shards = Self::shards(&http, token.into_string()).await?;
        let cache = InMemoryCache::new();
        let context = Arc::new(Context { http, cache, tickets: Mutex::new(tickets) });

        Ok(Self { context, shards })
    }

    /// Returns the state shared by every event task.
    #[must_use]
    pub fn context(&self) -> Arc<Context> {
        Arc::clone(&self.context)
    }

    /// Returns the bot's gateway configuration.
    ///
    /// # Errors
    ///
    /// This function will return an error if the bot's presence is invalid.
    fn config(token: String) -> Result<Config> {
        let name = "for !open".to_string();
        let activity = MinimalActivity { kind: ActivityType::Watching, name, url: None }.into();
        let presence = UpdatePresencePayload::new(vec![activity], false, None, Status::Online)?;

        Ok(ConfigBuilder::new(token, INTENTS).presence(presence).build())
    }

    /// Creates the bot's gateway shards.
    ///
    /// # Errors
    ///
    /// This function will return an error if the shards could not be created.
    async fn shards(http: &Client, token: String) -> Result<Box<[Shard]>> {
        let config = Self::config(token)?;

        Ok(create_recommended(http, config, |_, b| b.build()).await?.collect())
    }

    /// Starts the bot process, running until the gateway fails fatally.
    ///
    /// Every spawned event task is awaited before returning.
    ///
    /// # Errors
    ///
    /// This function will return an error if the gateway connection failed fatally.
    pub async fn start(mut self) -> Result {
        let mut stream = ShardEventStream::new(self.shards.iter_mut());
        let mut tasks = JoinSet::new();
        let mut result = Ok(());

        while let Some((_, event)) = stream.next().await {
            result = Self::on_event(&self.context, &mut tasks, event);

            if result.is_err() {
                break;
            };
        }

        drop(stream);

        while tasks.join_next().await.is_some() {}

        result
    }

    /// Spawns a task that handles an incoming event.
    ///
    /// # Errors
    ///
    /// This function will return an error if the event was a fatal error.
    fn on_event(
        context: &Arc<Context>,
        tasks: &mut JoinSet<Result>,
        event: Result<Event, ReceiveMessageError>,
    ) -> Result {
        let event = match event {
            Ok(event) => event,
            Err(fatal) if fatal.is_fatal() => {
                error!("fatal error receiving event: {fatal}")?;
                return Err(fatal.into());
            }
            Err(error) => return Ok(warn!("error receiving event: {error}")?),
        };

        context.cache.update(&event);
        tasks.spawn(handle_event(Arc::clone(context), event));

        Ok(())
    }
}

/// Handles an incoming event in a new task.
///
/// # Errors
///
/// This function will return an error if the logger could not be reached.
async fn handle_event(context: Arc<Context>, event: Event) -> Result {
    let result = match event {
        Event::Ready(event) => handle_ready(&event),
        Event::GuildCreate(event) => handle_guild_create(&context, &event).await,
        Event::MessageCreate(event) if !event.author.bot => {
            command::handle_message(&context, &event).await
        }
        Event::MessageUpdate(event) => command::handle_edit(&context, &event).await,
        _ => Ok(()),
    };

    match result {
        Ok(()) => Ok(()),
        Err(error) => Ok(warn!("error handling event: {error}")?),
    }
}

/// Handles a ready event.
///
/// # Errors
///
/// This function will return an error if the logger could not be reached.
fn handle_ready(event: &Ready) -> Result {
    info!("connected to the discord api as {}", event.user.name)?;
    info!("invite link: {}", invite(event.application.id, PERMISSIONS))?;

    Ok(())
}

/// Handles a guild becoming available, registering it if it is new.
///
/// # Errors
///
/// This function will return an error if the logger could not be reached.
async fn handle_guild_create(context: &Context, event: &GuildCreate) -> Result {
    let batch = context.tickets.lock().await.insert(event.id, &event.name);

    if let Some(batch) = batch {
        info!("registered new guild {}", get_key(event.id, &event.name))?;
        batch.commit("Create guild").await;
    }

    Ok(())
}
