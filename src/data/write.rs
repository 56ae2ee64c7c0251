use std::fmt::Debug;
use std::path::Path;

use serde::{Deserialize, Serialize};
use ticketeer_logger::{error, info};
use ticketeer_storage::{Format, Key};

/// A failed file operation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed for '{}': {message}", .path.display())]
pub struct WriteError {
    /// The name of the operation that failed.
    pub operation: &'static str,
    /// The file or directory that the operation targeted.
    pub path: Box<Path>,
    /// The failure's description.
    pub message: Box<str>,
}

/// The function executed by a [`Deferred`] operation.
type Task = Box<dyn FnOnce(&Path) -> Result<(), Box<str>> + Send>;

/// A file operation that has been prepared but not yet performed.
///
/// Values are captured when the operation is created, so mutating the source afterwards does not
/// change what is written.
pub struct Deferred {
    /// The name of the operation.
    operation: &'static str,
    /// The file or directory that the operation targets.
    path: Box<Path>,
    /// The operation itself.
    task: Task,
}

impl Deferred {
    /// Creates a new [`Deferred`] operation.
    pub fn new<F>(operation: &'static str, path: impl AsRef<Path>, task: F) -> Self
    where
        F: FnOnce(&Path) -> Result<(), Box<str>> + Send + 'static,
    {
        Self { operation, path: Box::from(path.as_ref()), task: Box::new(task) }
    }

    /// Creates an operation that writes the given value into the given key.
    pub fn write<T, F>(operation: &'static str, key: Key<T, F>, value: T) -> Self
    where
        T: Serialize + for<'de> Deserialize<'de> + Send + 'static,
        F: Format + Send + 'static,
    {
        let path = key.path().to_path_buf();

        Self::new(operation, path, move |_| key.write(&value).map_err(|e| e.to_string().into()))
    }

    /// Creates an operation that updates the value stored at the given key.
    ///
    /// The operation fails if nothing is stored at the key.
    pub fn update<T, F, U>(operation: &'static str, key: Key<T, F>, update: U) -> Self
    where
        T: Serialize + for<'de> Deserialize<'de> + 'static,
        F: Format + Send + 'static,
        U: FnOnce(&mut T) + Send + 'static,
    {
        let path = key.path().to_path_buf();

        Self::new(operation, path, move |_| key.update(update).map_err(|e| e.to_string().into()))
    }

    /// Creates an operation that creates the given directory and all of its parents.
    pub fn create_dir(operation: &'static str, path: impl AsRef<Path>) -> Self {
        Self::new(operation, path, |path| std::fs::create_dir_all(path).map_err(|e| e.to_string().into()))
    }

    /// Returns the name of this operation.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Returns the file or directory that this operation targets.
    #[must_use]
    pub const fn path(&self) -> &Path {
        &self.path
    }

    /// Performs this operation, returning the targeted path on success.
    ///
    /// # Errors
    ///
    /// This function will return an error if the operation failed.
    pub fn run(self) -> Result<Box<Path>, WriteError> {
        let Self { operation, path, task } = self;

        match task(&path) {
            Ok(()) => Ok(path),
            Err(message) => Err(WriteError { operation, path, message }),
        }
    }
}

impl Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("operation", &self.operation)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// An ordered list of deferred operations that are flushed together.
#[must_use = "a batch does nothing unless it is flushed"]
#[derive(Debug, Default)]
pub struct Batch {
    /// The batch's operations, in execution order.
    inner: Vec<Deferred>,
}

impl Batch {
    /// Creates a new, empty [`Batch`].
    pub const fn new() -> Self {
        Self { inner: Vec::new() }
    }

    /// Returns the number of operations in this [`Batch`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns whether this [`Batch`] is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over the operations in this [`Batch`].
    pub fn iter(&self) -> impl Iterator<Item = &Deferred> {
        self.inner.iter()
    }

    /// Appends an operation to this [`Batch`].
    pub fn push(&mut self, deferred: Deferred) {
        self.inner.push(deferred);
    }

    /// Appends an operation to this [`Batch`] and returns it.
    pub fn with(mut self, deferred: Deferred) -> Self {
        self.push(deferred);
        self
    }

    /// Appends every operation of the given batch to this [`Batch`].
    pub fn extend(&mut self, batch: Self) {
        self.inner.extend(batch.inner);
    }

    /// Performs every operation in order.
    ///
    /// A failed operation does not prevent later operations from running.
    pub fn flush(self) -> Flushed {
        let mut flushed = Flushed::default();

        for deferred in self.inner {
            match deferred.run() {
                Ok(path) => flushed.written.push(path),
                Err(error) => flushed.failures.push(error),
            }
        }

        flushed
    }

    /// Performs every operation on the blocking thread pool, logging the outcome under the given
    /// label.
    pub async fn commit(self, label: &str) -> Flushed {
        let count = self.len();
        let flushed = match tokio::task::spawn_blocking(move || self.flush()).await {
            Ok(flushed) => flushed,
            Err(join_error) => {
                error!("{label}: the flush task failed - {join_error}").ok();

                return Flushed::default();
            }
        };

        if flushed.is_ok() {
            info!("{label}: wrote {count} file(s)").ok();
        } else {
            flushed.log(label);
        }

        flushed
    }
}

impl FromIterator<Deferred> for Batch {
    fn from_iter<I: IntoIterator<Item = Deferred>>(iter: I) -> Self {
        Self { inner: iter.into_iter().collect() }
    }
}

impl From<Deferred> for Batch {
    fn from(value: Deferred) -> Self {
        Self { inner: vec![value] }
    }
}

/// The aggregate outcome of a flushed [`Batch`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Flushed {
    /// The paths of every successful operation.
    pub written: Vec<Box<Path>>,
    /// Every failed operation.
    pub failures: Vec<WriteError>,
}

impl Flushed {
    /// Returns whether every operation succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Logs every failure of this outcome under the given label.
    pub fn log(&self, label: &str) {
        for failure in &self.failures {
            error!("{label}: {failure}").ok();
        }
    }

    /// Converts this outcome into a result.
    ///
    /// # Errors
    ///
    /// This function will return an error containing every failure if any operation failed.
    pub fn into_result(self) -> Result<Vec<Box<Path>>, Vec<WriteError>> {
        if self.failures.is_empty() { Ok(self.written) } else { Err(self.failures) }
    }
}

#[cfg(test)]
mod tests {
    use ticketeer_storage::{Json, Key};

    use super::{Batch, Deferred};

    #[test]
    fn write_captures_value_at_creation() {
        let dir = tempfile::tempdir().unwrap();
        let key = Key::<Vec<u32>, Json>::new_default(dir.path().join("values.json"));
        let mut values = vec![1, 2];
        let deferred = Deferred::write("write values", key.clone(), values.clone());

        values.push(3);

        assert!(!key.exists().unwrap());
        assert_eq!(&*deferred.run().unwrap(), key.path());
        assert_eq!(key.read().unwrap(), vec![1, 2]);
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Key::<Vec<u32>, Json>::new_default(dir.path().join("missing.json"));
        let present = Key::<Vec<u32>, Json>::new_default(dir.path().join("nested/present.json"));

        let batch = Batch::new()
            .with(Deferred::update("update missing", missing, |v| v.push(1)))
            .with(Deferred::write("write present", present.clone(), vec![7]));

        let flushed = batch.flush();

        assert!(!flushed.is_ok());
        assert_eq!(flushed.written.len(), 1);
        assert_eq!(flushed.failures[0].operation, "update missing");
        assert_eq!(present.read().unwrap(), vec![7]);
    }

    #[test]
    fn create_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b");
        let batch: Batch =
            [Deferred::create_dir("create", &path), Deferred::create_dir("create", &path)]
                .into_iter()
                .collect();

        assert_eq!(batch.flush().into_result().unwrap().len(), 2);
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn commit_runs_off_the_executor() {
        let dir = tempfile::tempdir().unwrap();
        let key = Key::<String, Json>::new_default(dir.path().join("value.json"));
        let flushed = Batch::from(Deferred::write("write", key.clone(), "text".to_string()))
            .commit("test")
            .await;

        assert!(flushed.is_ok());
        assert_eq!(key.read().unwrap(), "text");
    }
}
