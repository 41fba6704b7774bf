//! An in-memory [`Sink`] that captures records for inspection.

use std::{
    io,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use super::Sink;
use crate::{Field, Level, LoggerError};

/// A record captured by a [`MemorySink`].
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// The level the record was written at.
    pub level: Level,

    /// The rendered message.
    pub message: String,

    /// Fields bound to the sink through [`Sink::with_fields`], in binding order.
    pub bound: Vec<Field>,

    /// Fields passed with the write itself, in call order.
    pub fields: Vec<Field>,
}

impl Record {
    /// All fields of the record in output order: bound fields first, then call fields.
    pub fn all_fields(&self) -> impl Iterator<Item = &Field> {
        self.bound.iter().chain(&self.fields)
    }

    /// The keys of [`Record::all_fields`].
    pub fn keys(&self) -> Vec<&str> {
        self.all_fields().map(|field| field.key.as_ref()).collect()
    }
}

#[derive(Debug, Default)]
struct Shared {
    records: Mutex<Vec<Record>>,
    syncs: AtomicUsize,
    sync_failure: Option<io::ErrorKind>,
}

/// A [`Sink`] that keeps every record in memory.
///
/// Clones and sinks derived through [`Sink::with_fields`] share the same record buffer.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    shared: Arc<Shared>,
    bound: Vec<Field>,
}

impl MemorySink {
    /// Creates an empty [`MemorySink`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a [`MemorySink`] whose [`Sink::sync`] always fails with an I/O error of `kind`.
    pub fn with_failing_sync(kind: io::ErrorKind) -> Self {
        Self {
            shared: Arc::new(Shared {
                sync_failure: Some(kind),
                ..Shared::default()
            }),
            bound: Vec::new(),
        }
    }

    /// A snapshot of the records written so far.
    pub fn records(&self) -> Vec<Record> {
        self.shared
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns the records written so far.
    pub fn take(&self) -> Vec<Record> {
        std::mem::take(
            &mut *self
                .shared
                .records
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// The number of times [`Sink::sync`] has been called.
    pub fn sync_count(&self) -> usize {
        self.shared.syncs.load(Ordering::SeqCst)
    }
}

impl Sink for MemorySink {
    fn write(&self, level: Level, message: &str, fields: &[Field]) {
        let record = Record {
            level,
            message: message.to_owned(),
            bound: self.bound.clone(),
            fields: fields.to_vec(),
        };
        self.shared
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    fn with_fields(&self, fields: &[Field]) -> Arc<dyn Sink> {
        let mut bound = self.bound.clone();
        bound.extend_from_slice(fields);
        Arc::new(Self {
            shared: Arc::clone(&self.shared),
            bound,
        })
    }

    fn sync(&self) -> Result<(), LoggerError> {
        self.shared.syncs.fetch_add(1, Ordering::SeqCst);
        match self.shared.sync_failure {
            Some(kind) => Err(io::Error::new(kind, "memory sink sync failure").into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn derived_sinks_share_records_and_accumulate_bound_fields() {
        let sink = MemorySink::new();
        let child = sink
            .with_fields(&[Field::new("service", "billing")])
            .with_fields(&[Field::new("region", "eu")]);

        child.write(Level::Info, "charged", &[Field::new("amount", 42)]);

        let records = sink.take();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records.first().map(Record::keys),
            Some(vec!["service", "region", "amount"])
        );
        assert!(sink.records().is_empty());
    }

    #[test]
    fn failing_sync_reports_io_error() {
        let sink = MemorySink::with_failing_sync(io::ErrorKind::BrokenPipe);
        let result = sink.sync();

        assert!(
            matches!(result, Err(LoggerError::Io(ref e)) if e.kind() == io::ErrorKind::BrokenPipe)
        );
        assert_eq!(sink.sync_count(), 1);
    }
}
