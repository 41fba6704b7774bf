//! A [`Sink`] that duplicates records to several sinks.

use std::sync::Arc;

use super::Sink;
use crate::{Field, Level, LoggerError};

/// A [`Sink`] that writes every record to each of its sinks, in order.
#[derive(Clone, Debug, Default)]
pub struct TeeSink {
    sinks: Vec<Arc<dyn Sink>>,
}

impl TeeSink {
    /// Creates a [`TeeSink`] over the given sinks.
    pub fn new(sinks: impl IntoIterator<Item = Arc<dyn Sink>>) -> Self {
        Self {
            sinks: sinks.into_iter().collect(),
        }
    }

    /// The number of sinks records are duplicated to.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether records are discarded because there are no sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Sink for TeeSink {
    fn write(&self, level: Level, message: &str, fields: &[Field]) {
        for sink in &self.sinks {
            sink.write(level, message, fields);
        }
    }

    fn with_fields(&self, fields: &[Field]) -> Arc<dyn Sink> {
        Arc::new(Self::new(
            self.sinks.iter().map(|sink| sink.with_fields(fields)),
        ))
    }

    /// Syncs every sink, even after a failure, and returns the first failure.
    fn sync(&self) -> Result<(), LoggerError> {
        self.sinks
            .iter()
            .map(|sink| sink.sync())
            .fold(Ok(()), |first, result| first.and(result))
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::sink::{MemorySink, Record};

    #[test]
    fn writes_to_every_sink() {
        let left = MemorySink::new();
        let right = MemorySink::new();
        let tee = TeeSink::new([
            Arc::new(left.clone()) as Arc<dyn Sink>,
            Arc::new(right.clone()) as Arc<dyn Sink>,
        ]);

        tee.with_fields(&[Field::new("service", "billing")])
            .write(Level::Warn, "slow", &[]);

        for sink in [&left, &right] {
            let records = sink.records();
            assert_eq!(records.len(), 1);
            assert_eq!(records.first().map(Record::keys), Some(vec!["service"]));
        }
    }

    #[test]
    fn sync_visits_every_sink_and_returns_first_failure() {
        let failing = MemorySink::with_failing_sync(io::ErrorKind::WriteZero);
        let healthy = MemorySink::new();
        let tee = TeeSink::new([
            Arc::new(failing.clone()) as Arc<dyn Sink>,
            Arc::new(healthy.clone()) as Arc<dyn Sink>,
        ]);

        let result = tee.sync();

        assert!(
            matches!(result, Err(LoggerError::Io(ref e)) if e.kind() == io::ErrorKind::WriteZero)
        );
        assert_eq!(failing.sync_count(), 1);
        assert_eq!(healthy.sync_count(), 1);
    }
}
