//! Provides [`TracingSink`], a [`Sink`] that forwards records to the [`tracing`] ecosystem.

use std::{fmt, sync::Arc};

use super::Sink;
use crate::{Field, Level, LoggerError};

/// A [`Sink`] that emits every record as a [`tracing`] event.
///
/// `tracing` events have a fixed set of field names, so the record's fields are rendered into
/// a single `fields` value as space-separated `key=value` pairs (values as JSON), keeping
/// their order and duplicates. [`Level::DPanic`], [`Level::Panic`] and [`Level::Fatal`] are
/// emitted as `ERROR` events with the original level in a `severity` field.
///
/// Filtering and output are left to the installed `tracing` subscriber.
#[derive(Clone, Debug, Default)]
pub struct TracingSink {
    bound: Vec<Field>,
}

impl TracingSink {
    /// Creates a new [`TracingSink`].
    pub fn new() -> Self {
        Self::default()
    }
}

struct DisplayFields<'a> {
    bound: &'a [Field],
    fields: &'a [Field],
}

impl fmt::Display for DisplayFields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, field) in self.bound.iter().chain(self.fields).enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", field.key, field.value)?;
        }
        Ok(())
    }
}

impl Sink for TracingSink {
    fn write(&self, level: Level, message: &str, fields: &[Field]) {
        let fields = DisplayFields {
            bound: &self.bound,
            fields,
        };

        match level {
            Level::Debug => tracing::debug!(fields = %fields, "{message}"),
            Level::Info => tracing::info!(fields = %fields, "{message}"),
            Level::Warn => tracing::warn!(fields = %fields, "{message}"),
            Level::Error => tracing::error!(fields = %fields, "{message}"),
            Level::DPanic | Level::Panic | Level::Fatal => {
                tracing::error!(severity = %level, fields = %fields, "{message}")
            }
        }
    }

    fn with_fields(&self, fields: &[Field]) -> Arc<dyn Sink> {
        let mut bound = self.bound.clone();
        bound.extend_from_slice(fields);
        Arc::new(Self { bound })
    }

    fn sync(&self) -> Result<(), LoggerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex, PoisonError},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn forwards_records_as_tracing_events() {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let sink = TracingSink::new().with_fields(&[Field::new("service", "billing")]);
            sink.write(Level::Warn, "slow charge", &[Field::new("request_id", "abc")]);
            sink.write(Level::Panic, "ledger corrupted", &[]);
        });

        let output = String::from_utf8_lossy(
            &buffer.0.lock().unwrap_or_else(PoisonError::into_inner),
        )
        .into_owned();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines.first().is_some_and(|line| line.contains("WARN")
            && line.contains("slow charge")
            && line.contains(r#"fields=service="billing" request_id="abc""#)));
        assert!(lines
            .get(1)
            .is_some_and(|line| line.contains("ERROR") && line.contains("severity=panic")));
    }
}
