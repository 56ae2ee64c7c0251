//! Provides procedural macro definitions for the Ticketeer Discord bot.
#![deny(clippy::expect_used, unsafe_code, clippy::unwrap_used)]
#![warn(clippy::nursery, clippy::todo, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use proc_macro::TokenStream;

mod storage;

/// Derives the [`Stored`](<ticketeer_storage::Stored>) trait for the deriving type.
///
/// The `location` attribute is a format string followed by the types of its arguments. The
/// format's file extension is appended to the formatted path, so it must be omitted.
///
/// # Examples
///
/// ```ignore
/// #[derive(Storage, Serialize, Deserialize)]
/// #[format(Json)]
/// #[location("{}/messages/{}", Box<str>, i64)]
/// struct Record {
///     content: String,
/// }
///
/// // Resolves to `<dir>/messages/<timestamp>.json`.
/// let key = Record::stored((dir, timestamp));
/// ```
#[inline]
#[proc_macro_derive(Storage, attributes(format, location))]
pub fn storage(input: TokenStream) -> TokenStream {
    crate::storage::procedure(input)
}
