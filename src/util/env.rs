use super::Result;

/// Returns the bot's client token.
///
/// This is configurable through the `CLIENT_TOKEN` environment variable.
///
/// # Errors
///
/// This function will return an error if the secret has not been set.
pub fn token() -> Result<Box<str>> {
    Ok(std::env::var("CLIENT_TOKEN")?.into_boxed_str())
}
