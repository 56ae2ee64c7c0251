//! A Discord bot that manages per-guild help tickets.
#![deny(clippy::expect_used, clippy::panic, clippy::unwrap_used, unsafe_code)]
#![warn(clippy::cargo, clippy::nursery, clippy::pedantic, clippy::todo)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use ticketeer_logger::{error, info, warn};

use crate::bot::BotClient;
use crate::data::TicketCache;
use crate::util::invite::{invite, PERMISSIONS};
use crate::util::{Arguments, Result};

/// Provides the gateway client and chat commands.
pub mod bot;
/// Provides guild, ticket, and response persistence.
pub mod data;
/// Provides configuration and shared helpers.
pub mod util;

/// The exit code used after shutting down from an interrupt.
const EXIT_INTERRUPTED: i32 = 2;
/// The exit code used after shutting down from a gateway failure.
const EXIT_GATEWAY: i32 = 99;
/// The exit code used if guild data could not be saved during shutdown.
const EXIT_UNSAVED: i32 = -1;

#[tokio::main]
async fn main() -> Result {
    #[cfg(feature = "dotenv")]
    dotenvy::dotenv().ok();

    let arguments = Arguments::parse();

    if let Some(application_id) = arguments.invite {
        println!("{}", invite(application_id, PERMISSIONS));

        return Ok(());
    }

    let logger = ticketeer_logger::install(arguments.logger_config())?;
    let mut tickets = TicketCache::new(arguments.data_directory());

    tickets.populate_all()?;

    let client = BotClient::new(tickets).await?;
    let context = client.context();

    info!("starting client")?;

    let code = tokio::select! {
        result = client.start() => {
            match result {
                Ok(()) => warn!("the gateway closed unexpectedly")?,
                Err(error) => error!("the gateway failed: {error}")?,
            }

            EXIT_GATEWAY
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("received an interrupt, shutting down")?;

            EXIT_INTERRUPTED
        }
    };

    let code = match context.tickets.lock().await.dump() {
        Ok(written) => {
            info!("saved {} file(s)", written.len())?;

            code
        }
        Err(failures) => {
            error!("unable to save {} file(s) during shutdown", failures.len())?;

            EXIT_UNSAVED
        }
    };

    logger.join()?;

    std::process::exit(code)
}
