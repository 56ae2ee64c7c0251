//! Provides a typed file storage interface for the Ticketeer Discord bot.
#![deny(clippy::expect_used, unsafe_code, clippy::unwrap_used)]
#![warn(clippy::nursery, clippy::todo, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::fmt::{Debug, Display};
use std::marker::PhantomData;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[cfg(feature = "formats")] pub use crate::formats::*;
#[cfg(feature = "formats")] mod formats;

/// A possible error.
#[derive(Debug, thiserror::Error)]
pub enum Error<F: Format> {
    /// An IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A [`Format`] encoding error.
    #[error("{0}")]
    Encoding(F::EncodingError),
    /// A [`Format`] decoding error.
    #[error("{0}")]
    Decoding(F::DecodingError),
}

impl<F: Format> Error<F> {
    /// Returns whether this error was caused by a missing file.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(error) if error.kind() == std::io::ErrorKind::NotFound)
    }
}

/// A data storage [`Format`] used within the storage system.
///
/// Implementors should be zero-sized and provide a [`Default`] implementation, as keys are
/// usually built through [`Key::new_default`].
pub trait Format: Debug {
    /// The type returned in the event of an error during encoding.
    type EncodingError: Debug + Display;
    /// The type returned in the event of an error during decoding.
    type DecodingError: Debug + Display;

    /// Returns the file extension for this [`Format`].
    fn extension(&self) -> &'static str;

    /// Encodes a given value of type `T` into a byte array.
    ///
    /// # Errors
    ///
    /// This function will return an error if the value could not be encoded.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, Self::EncodingError>;

    /// Decodes a given byte slice into a value of type `T`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the bytes could not be decoded.
    fn decode<T: for<'de> Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T, Self::DecodingError>;
}

/// Describes a typed resource entry within the filesystem.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Key<T, F>
where
    T: Serialize + for<'de> Deserialize<'de>,
    F: Format,
{
    /// The value's filepath.
    path: Box<Path>,
    /// The value's format.
    format: F,
    /// Type marker.
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> Key<T, F>
where
    T: Serialize + for<'de> Deserialize<'de>,
    F: Format,
{
    /// Creates a new [`Key<T, F>`].
    pub fn new(path: impl AsRef<Path>, format: F) -> Self {
        Self { path: Box::from(path.as_ref()), format, _marker: PhantomData }
    }

    /// Creates a new [`Key<T, F>`] with a defaulted format.
    pub fn new_default(path: impl AsRef<Path>) -> Self
    where
        F: Default,
    {
        Self::new(path, F::default())
    }

    /// Returns the filepath of this [`Key<T, F>`].
    #[must_use]
    pub const fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether this [`Key<T, F>`] exists within the storage system.
    ///
    /// # Errors
    ///
    /// This function will return an error if the path could not be verified.
    pub fn exists(&self) -> Result<bool, Error<F>> {
        self.path.try_exists().map_err(Into::into)
    }

    /// Reads and decodes this [`Key<T, F>`]'s associated resource.
    ///
    /// # Errors
    ///
    /// This function will return an error if the data could not be read or decoded.
    pub fn read(&self) -> Result<T, Error<F>> {
        let bytes = std::fs::read(&(*self.path))?;

        self.format.decode(&bytes).map_err(Error::Decoding)
    }

    /// Encodes and writes the given value into this [`Key<T, F>`]'s associated resource, creating
    /// any missing parent directories.
    ///
    /// # Errors
    ///
    /// This function will return an error if the value could not be encoded or written.
    pub fn write(&self, value: &T) -> Result<(), Error<F>> {
        let bytes = self.format.encode(value).map_err(Error::Encoding)?;

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        std::fs::write(&(*self.path), bytes)?;

        Ok(())
    }

    /// Reads the associated resource, applies the given function to it, and writes it back.
    ///
    /// Nothing is written if the resource does not already exist.
    ///
    /// # Errors
    ///
    /// This function will return an error if the value could not be read, decoded, encoded, or
    /// written.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<(), Error<F>> {
        let mut value = self.read()?;

        f(&mut value);

        self.write(&value)
    }
}

impl<T, F, S> From<S> for Key<T, F>
where
    T: Serialize + for<'de> Deserialize<'de>,
    F: Format + Default,
    S: AsRef<Path>,
{
    fn from(value: S) -> Self {
        Self::new_default(value.as_ref())
    }
}

/// Provides a data storage key builder for the implementing type.
///
/// This is usually derived through `ticketeer_macros::Storage`.
pub trait Stored: Serialize + for<'de> Deserialize<'de> {
    /// The arguments provided when creating a new [`Key<T, F>`].
    type Arguments;
    /// The expected [`Format`] of this type.
    type Format: Format;

    /// Creates a new [`Key<T, F>`] with the provided arguments.
    fn stored(arguments: Self::Arguments) -> Key<Self, Self::Format>;
}
