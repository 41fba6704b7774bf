//! The structured-logging engine a [`Logger`][crate::Logger] writes to, and the sinks bundled
//! with this crate.

use std::{fmt, sync::Arc};

use crate::{Field, Level, LoggerError};

mod json;
mod memory;
mod tee;
mod tracing_sink;

pub use self::{
    json::{JsonSink, JsonSinkConfig},
    memory::{MemorySink, Record},
    tee::TeeSink,
    tracing_sink::TracingSink,
};

/// A structured-logging engine that encodes and outputs log records.
///
/// A sink is shared by every [`Logger`][crate::Logger] derived from it and may be written to
/// from many threads at once, so implementations synchronize internally.
pub trait Sink: Send + Sync + fmt::Debug {
    /// Writes one record.
    ///
    /// `fields` are written in the given order, duplicates included. Write failures are the
    /// sink's own concern and are not reported to the caller.
    fn write(&self, level: Level, message: &str, fields: &[Field]);

    /// Returns a sink that writes `fields` ahead of the call fields of every record.
    fn with_fields(&self, fields: &[Field]) -> Arc<dyn Sink>;

    /// Flushes any buffered records.
    ///
    /// # Errors
    ///
    /// Returns the failure reported by the underlying output.
    fn sync(&self) -> Result<(), LoggerError>;
}

/// A [`Sink`] that discards every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopSink;

impl Sink for NopSink {
    fn write(&self, _level: Level, _message: &str, _fields: &[Field]) {}

    fn with_fields(&self, _fields: &[Field]) -> Arc<dyn Sink> {
        Arc::new(Self)
    }

    fn sync(&self) -> Result<(), LoggerError> {
        Ok(())
    }
}
