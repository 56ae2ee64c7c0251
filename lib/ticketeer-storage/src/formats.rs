use serde::{Deserialize, Serialize};

use crate::Format;

/// The [JSON](https://www.json.org/json-en.html) data format.
///
/// Values are written compactly so that files remain readable by any JSON consumer that shares the
/// bot's data directory.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Json;

impl Format for Json {
    type EncodingError = serde_json::Error;
    type DecodingError = serde_json::Error;

    fn extension(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, Self::EncodingError> {
        serde_json::to_vec(value)
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T, Self::DecodingError> {
        serde_json::from_slice(bytes)
    }
}
