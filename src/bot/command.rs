use ticketeer_logger::{info, warn};
use twilight_model::channel::Message;
use twilight_model::gateway::payload::incoming::MessageUpdate;
use twilight_model::id::marker::ChannelMarker;
use twilight_model::id::Id;
use twilight_util::snowflake::Snowflake;

use super::Context;
use crate::data::{Author, Batch, ChannelKind, Edit, Error, Post, Roster};
use crate::util::Result;

/// A chat command addressed to the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'m> {
    /// Opens a ticket with the given description.
    Open(&'m str),
    /// Responds to a ticket.
    Reply,
    /// Closes a ticket.
    Close,
    /// Sets the admin role.
    SetAdmin(&'m str),
    /// Sets the helper role.
    SetHelper(&'m str),
    /// Sets the help text channel.
    SetHelpTextChannel(&'m str),
    /// Sets the help voice channel.
    SetHelpVoiceChannel(&'m str),
    /// A known command missing its argument, holding its usage.
    Usage(&'static str),
    /// An unknown command.
    Unrecognized(&'m str),
}

impl<'m> Command<'m> {
    /// Parses a message's content.
    ///
    /// Returns [`None`] if the content does not start with a `!` or `~` command.
    #[must_use]
    pub fn parse(content: &'m str) -> Option<Self> {
        let content = content.trim_start();
        let (name, argument) = content
            .split_once(char::is_whitespace)
            .map_or((content, ""), |(name, argument)| (name, argument.trim()));

        let mut chars = name.chars();
        let prefixed = matches!(chars.next(), Some('!' | '~'));

        if !prefixed || !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        let setter = |make: fn(&'m str) -> Self, usage: &'static str| {
            if argument.is_empty() { Self::Usage(usage) } else { make(argument) }
        };

        Some(match name {
            "!open" => Self::Open(argument),
            "!reply" => Self::Reply,
            "!close" => Self::Close,
            "~setAdmin" => setter(Self::SetAdmin, "~setAdmin <role name>"),
            "~setHelper" => setter(Self::SetHelper, "~setHelper <role name>"),
            "~setHelpTextChannel" => {
                setter(Self::SetHelpTextChannel, "~setHelpTextChannel <channel name>")
            }
            "~setHelpVoiceChannel" => {
                setter(Self::SetHelpVoiceChannel, "~setHelpVoiceChannel <channel name>")
            }
            _ => Self::Unrecognized(name),
        })
    }
}

/// Handles a newly posted message.
///
/// # Errors
///
/// This function will return an error if a reply or notification could not be sent.
pub async fn handle_message(ctx: &Context, message: &Message) -> Result {
    let Some(command) = Command::parse(&message.content) else {
        return Ok(());
    };
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };
    let Some(key) = ctx.guild_key(guild_id) else {
        warn!("received a command from uncached guild {guild_id}")?;

        return Ok(());
    };

    let author = Author::new(message.author.id, message.author.name.as_str());
    let created_on = message.id.timestamp();
    let post = Post { author, content: message.content.as_str().into(), created_on };
    let roster = ctx.roster(guild_id);

    info!("{key}: {} used {command:?}", post.author.username)?;

    match command {
        Command::Open(text) => self::open(ctx, &key, message, &post, text).await,
        Command::Reply => {
            let result = ctx.tickets.lock().await.respond_ticket(&key, &post);

            self::finish(ctx, message, result, "Reply to ticket", None).await
        }
        Command::Close => self::close(ctx, &key, message, &post).await,
        Command::SetAdmin(role) => {
            let result = ctx.tickets.lock().await.set_admin(&key, &roster, &post.author, role);
            let confirm = format!("The admin role is now **{role}**");

            self::finish(ctx, message, result, "Set admin role", Some(confirm)).await
        }
        Command::SetHelper(role) => {
            let result = ctx.tickets.lock().await.set_helper(&key, &roster, &post.author, role);
            let confirm = format!("The helper role is now **{role}**");

            self::finish(ctx, message, result, "Set helper role", Some(confirm)).await
        }
        Command::SetHelpTextChannel(channel) => {
            let result =
                ctx.tickets.lock().await.set_help_text_channel(&key, &roster, &post.author, channel);
            let confirm = format!("The help text channel is now **{channel}**");

            self::finish(ctx, message, result, "Set help text channel", Some(confirm)).await
        }
        Command::SetHelpVoiceChannel(channel) => {
            let result =
                ctx.tickets.lock().await.set_help_voice_channel(&key, &roster, &post.author, channel);
            let confirm = format!("The help voice channel is now **{channel}**");

            self::finish(ctx, message, result, "Set help voice channel", Some(confirm)).await
        }
        Command::Usage(usage) => {
            self::reply(ctx, message.channel_id, &format!("Usage: `{usage}`")).await
        }
        Command::Unrecognized(name) => {
            self::reply(ctx, message.channel_id, &format!("Unrecognized command: `{name}`")).await
        }
    }
}

/// Handles an edit to a previously posted message.
///
/// Only edits to recorded ticket responses are persisted.
///
/// # Errors
///
/// This function will return an error if the logger could not be reached.
pub async fn handle_edit(ctx: &Context, update: &MessageUpdate) -> Result {
    let (Some(guild_id), Some(content), Some(edited)) =
        (update.guild_id, update.content.as_deref(), update.edited_timestamp)
    else {
        return Ok(());
    };

    if update.author.as_ref().is_some_and(|author| author.bot) {
        return Ok(());
    }

    let Some(key) = ctx.guild_key(guild_id) else {
        return Ok(());
    };

    let edit = Edit {
        content: content.into(),
        created_on: update.id.timestamp(),
        edited_on: edited.as_micros() / 1000,
    };
    let mut tickets = ctx.tickets.lock().await;

    if tickets.get_guild(&key).and_then(|guild| guild.message_ticket(edit.created_on)).is_none() {
        return Ok(());
    }

    let result = tickets.edit_ticket_response(&key, &edit);

    drop(tickets);

    if let Ok(batch) = result {
        batch.commit("Edit ticket response").await;
    }

    Ok(())
}

/// Opens a ticket and notifies the guild's helpers.
///
/// # Errors
///
/// This function will return an error if the helpers could not be notified.
async fn open(ctx: &Context, key: &str, message: &Message, post: &Post, text: &str) -> Result {
    let mut tickets = ctx.tickets.lock().await;
    let Ok(batch) = tickets.open_ticket(key, post.author.clone(), post.created_on) else {
        return Ok(());
    };
    let notice = tickets.get_guild(key).and_then(|guild| {
        let ticket = guild.tickets().last()?;
        let helper = guild.roles().helper.clone();

        Some((Box::<str>::from(ticket.id()), helper, guild.channels().help_text.clone()))
    });

    drop(tickets);
    batch.commit("Open ticket").await;

    let Some((id, helper, channel)) = notice else {
        return Ok(());
    };
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };

    let roster = ctx.roster(guild_id);
    let Some(role_id) = roster.role(&helper) else {
        warn!("{key}: unable to notify missing helper role '{helper}' of ticket {id}")?;

        return self::reply(ctx, message.channel_id, &format!("Opened ticket **{id}**")).await;
    };
    let channel_id = roster.channel(&channel, ChannelKind::Text).unwrap_or(message.channel_id);
    let mut notice = format!("<@&{role_id}> {} opened ticket **{id}**", post.author.username);

    if !text.is_empty() {
        notice.push_str(": ");
        notice.push_str(text);
    }

    self::reply(ctx, channel_id, &notice).await
}

/// Closes a ticket and notifies its author.
///
/// # Errors
///
/// This function will return an error if the ticket's author could not be notified.
async fn close(ctx: &Context, key: &str, message: &Message, post: &Post) -> Result {
    let result = ctx.tickets.lock().await.close_ticket(key, post);

    match result {
        Ok(closed) => {
            closed.batch.commit("Close ticket").await;

            let notice = format!(
                "<@{}> your ticket **{}** was closed by {}",
                closed.author.id, closed.id, post.author.username
            );

            self::reply(ctx, message.channel_id, &notice).await
        }
        Err(Error::TicketNotFound) => self::reply(ctx, message.channel_id, "Ticket not found").await,
        Err(_) => Ok(()),
    }
}

/// Commits the writes of a successful command, replying with the given confirmation.
///
/// Missing tickets are reported to the user; every other failure has already been logged.
///
/// # Errors
///
/// This function will return an error if a reply could not be sent.
async fn finish(
    ctx: &Context,
    message: &Message,
    result: Result<Batch, Error>,
    label: &str,
    confirm: Option<String>,
) -> Result {
    match result {
        Ok(batch) => {
            batch.commit(label).await;

            match confirm {
                Some(confirm) => self::reply(ctx, message.channel_id, &confirm).await,
                None => Ok(()),
            }
        }
        Err(Error::TicketNotFound) => self::reply(ctx, message.channel_id, "Ticket not found").await,
        Err(_) => Ok(()),
    }
}

/// Sends a message into the given channel.
///
/// # Errors
///
/// This function will return an error if the message could not be sent.
async fn reply(ctx: &Context, channel_id: Id<ChannelMarker>, content: &str) -> Result {
    ctx.http.create_message(channel_id).content(content)?.await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Command;

    #[test]
    fn ticket_commands_are_parsed() {
        assert_eq!(Command::parse("!open my build fails"), Some(Command::Open("my build fails")));
        assert_eq!(Command::parse("!open"), Some(Command::Open("")));
        assert_eq!(Command::parse("  !reply 1a try this"), Some(Command::Reply));
        assert_eq!(Command::parse("!close\tthanks"), Some(Command::Close));
    }

    #[test]
    fn setters_keep_their_whole_argument() {
        assert_eq!(Command::parse("~setHelper Help Desk "), Some(Command::SetHelper("Help Desk")));
        assert_eq!(
            Command::parse("~setAdmin Bot Commander"),
            Some(Command::SetAdmin("Bot Commander"))
        );
        assert_eq!(
            Command::parse("~setHelpVoiceChannel Help Tickets"),
            Some(Command::SetHelpVoiceChannel("Help Tickets"))
        );
    }

    #[test]
    fn setters_without_arguments_get_usage() {
        assert_eq!(
            Command::parse("~setHelpTextChannel   "),
            Some(Command::Usage("~setHelpTextChannel <channel name>"))
        );
        assert_eq!(Command::parse("~setAdmin"), Some(Command::Usage("~setAdmin <role name>")));
    }

    #[test]
    fn other_messages_are_ignored_or_unrecognized() {
        assert_eq!(Command::parse("hello there"), None);
        assert_eq!(Command::parse("~~struck~~"), None);
        assert_eq!(Command::parse("!"), None);
        assert_eq!(Command::parse("!!!"), None);
        assert_eq!(Command::parse("!help me"), Some(Command::Unrecognized("!help")));
        assert_eq!(Command::parse("~SETADMIN x"), Some(Command::Unrecognized("~SETADMIN")));
    }
}
