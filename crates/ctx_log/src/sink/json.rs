//! Provides [`JsonSink`], a [`Sink`] that formats records into one JSON object per line.

use std::{fmt, io::Write, sync::Arc};

use serde::ser::{SerializeMap, Serializer};
use serde_json::ser::Formatter;
use time::format_description::well_known::Iso8601;
use tracing_subscriber::fmt::MakeWriter;

use super::Sink;
use crate::{Field, Level, LoggerError};

pub(crate) mod keys {
    use std::sync::LazyLock;

    use rustc_hash::FxHashSet;

    pub(crate) const MESSAGE: &str = "message";
    pub(crate) const LEVEL: &str = "level";
    pub(crate) const TIME: &str = "time";
    pub(crate) const HOSTNAME: &str = "hostname";
    pub(crate) const PID: &str = "pid";

    pub(crate) static IMPLICIT_KEYS: LazyLock<FxHashSet<&'static str>> =
        LazyLock::new(|| [MESSAGE, LEVEL, TIME, HOSTNAME, PID].into_iter().collect());
}

/// Configuration for creating a [`JsonSink`].
#[derive(Clone, Debug)]
pub struct JsonSinkConfig {
    /// Key-value pairs that are statically defined at initialization and included at the
    /// top level of every record, right after the implicit keys.
    pub static_top_level_fields: Vec<Field>,

    /// Records below this level are dropped.
    pub level: Level,
}

impl Default for JsonSinkConfig {
    fn default() -> Self {
        Self {
            static_top_level_fields: Vec::new(),
            level: Level::Debug,
        }
    }
}

struct Inner<W, F> {
    dst_writer: W,
    formatter: F,
    pid: u32,
    hostname: String,
    static_top_level_fields: Vec<Field>,
    level: Level,
}

/// A [`Sink`] that serializes each record into a single line of JSON.
///
/// Every object starts with the implicit keys (`message`, `level`, `time`, `hostname`, `pid`),
/// followed by the static top-level fields, the fields bound through [`Sink::with_fields`],
/// and finally the fields passed with the write. Keys are written in that order without
/// deduplication. A bound or call field that uses one of the implicit keys is skipped.
///
/// It requires a [`MakeWriter`] to determine the output destination and a
/// [`serde_json::ser::Formatter`] to control the JSON output style
/// (e.g., compact or pretty-printed).
pub struct JsonSink<W, F> {
    inner: Arc<Inner<W, F>>,
    bound: Arc<[Field]>,
}

impl<W, F> JsonSink<W, F>
where
    W: for<'a> MakeWriter<'a> + 'static,
    F: Formatter + Clone,
{
    /// Creates a new [`JsonSink`] with the specified configuration, writer and formatter.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Configuration`] if a static top-level field uses a reserved key.
    pub fn new(config: JsonSinkConfig, dst_writer: W, formatter: F) -> Result<Self, LoggerError> {
        let pid = std::process::id();
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();

        for field in &config.static_top_level_fields {
            if keys::IMPLICIT_KEYS.contains(field.key.as_ref()) {
                return Err(LoggerError::Configuration(format!(
                    "A reserved key `{}` was included in `static_top_level_fields` of the JSON sink",
                    field.key
                )));
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                dst_writer,
                formatter,
                pid,
                hostname,
                static_top_level_fields: config.static_top_level_fields,
                level: config.level,
            }),
            bound: Arc::from(Vec::new()),
        })
    }

    /// Serializes implicit fields.
    fn serialize_implicit_fields(
        &self,
        map_serializer: &mut impl SerializeMap<Error = serde_json::Error>,
        level: Level,
        message: &str,
    ) -> Result<(), LoggerError> {
        map_serializer.serialize_entry(keys::MESSAGE, message)?;
        map_serializer.serialize_entry(keys::LEVEL, &level)?;

        if let Ok(time) = time::UtcDateTime::now().format(&Iso8601::DEFAULT) {
            map_serializer.serialize_entry(keys::TIME, &time)?;
        }

        map_serializer.serialize_entry(keys::HOSTNAME, &self.inner.hostname)?;
        map_serializer.serialize_entry(keys::PID, &self.inner.pid)?;

        Ok(())
    }

    /// Serializes one record into a buffer, without the trailing newline.
    fn serialize(
        &self,
        level: Level,
        message: &str,
        fields: &[Field],
    ) -> Result<Vec<u8>, LoggerError> {
        let mut buffer = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buffer, self.inner.formatter.clone());
        let mut map_serializer = serializer.serialize_map(None)?;

        self.serialize_implicit_fields(&mut map_serializer, level, message)?;

        for field in &self.inner.static_top_level_fields {
            map_serializer.serialize_entry(&field.key, &field.value)?;
        }

        for field in self.bound.iter().chain(fields) {
            if keys::IMPLICIT_KEYS.contains(field.key.as_ref()) {
                tracing::warn!(
                    "Attempting to log a reserved key `{}` (value: `{:?}`). Skipping.",
                    field.key,
                    field.value
                );
            } else {
                map_serializer.serialize_entry(&field.key, &field.value)?;
            }
        }

        map_serializer.end()?;
        Ok(buffer)
    }

    /// Flush memory buffer into an output stream with a trailing newline.
    ///
    /// Should be done by a single `write_all` call to avoid fragmentation of log because of
    /// multithreading.
    fn flush(&self, mut buffer: Vec<u8>) -> Result<(), std::io::Error> {
        buffer.write_all(b"\n")?;
        self.inner.dst_writer.make_writer().write_all(&buffer)
    }
}

impl<W, F> Clone for JsonSink<W, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            bound: Arc::clone(&self.bound),
        }
    }
}

impl<W, F> fmt::Debug for JsonSink<W, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSink")
            .field("level", &self.inner.level)
            .field("hostname", &self.inner.hostname)
            .field("pid", &self.inner.pid)
            .field(
                "static_top_level_fields",
                &self.inner.static_top_level_fields,
            )
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

impl<W, F> Sink for JsonSink<W, F>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    F: Formatter + Clone + Send + Sync + 'static,
{
    fn write(&self, level: Level, message: &str, fields: &[Field]) {
        if level < self.inner.level {
            return;
        }

        if let Ok(serialized) = self.serialize(level, message, fields) {
            let _ = self.flush(serialized);
        }
    }

    fn with_fields(&self, fields: &[Field]) -> Arc<dyn Sink> {
        Arc::new(Self {
            inner: Arc::clone(&self.inner),
            bound: self.bound.iter().chain(fields).cloned().collect(),
        })
    }

    fn sync(&self) -> Result<(), LoggerError> {
        Ok(self.inner.dst_writer.make_writer().flush()?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use std::{
        io,
        sync::{Arc, Mutex, PoisonError},
    };

    use pretty_assertions::assert_eq;
    use serde_json::{Value, ser::CompactFormatter};

    use super::*;

    #[derive(Clone, Debug, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            String::from_utf8(bytes.clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
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

    impl<'a> MakeWriter<'a> for SharedBuffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn sink(config: JsonSinkConfig) -> (JsonSink<SharedBuffer, CompactFormatter>, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let sink = JsonSink::new(config, buffer.clone(), CompactFormatter).unwrap();
        (sink, buffer)
    }

    #[test]
    fn writes_one_object_per_line_in_field_order() {
        let (sink, buffer) = sink(JsonSinkConfig {
            static_top_level_fields: vec![Field::new("service", "billing")],
            level: Level::Debug,
        });

        sink.with_fields(&[Field::new("region", "eu")]).write(
            Level::Info,
            "charged",
            &[Field::new("request_id", "abc"), Field::new("amount", 42)],
        );
        sink.write(Level::Error, "declined", &[]);

        let contents = buffer.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["message"], "charged");
        assert_eq!(first["level"], "info");
        assert_eq!(first["service"], "billing");
        assert_eq!(first["region"], "eu");
        assert_eq!(first["amount"], 42);
        assert_eq!(first["pid"], std::process::id());
        assert!(first["time"].is_string());

        let positions: Vec<usize> = ["\"service\"", "\"region\"", "\"request_id\"", "\"amount\""]
            .iter()
            .map(|key| lines[0].find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["level"], "error");
        assert_eq!(second.get("region"), None);
    }

    #[test]
    fn duplicate_keys_are_written_in_order() {
        let (sink, buffer) = sink(JsonSinkConfig::default());

        sink.write(
            Level::Info,
            "dup",
            &[
                Field::new("request_id", "abc"),
                Field::new("request_id", "override"),
            ],
        );

        assert!(buffer
            .contents()
            .contains(r#""request_id":"abc","request_id":"override""#));
    }

    #[test]
    fn reserved_call_keys_are_skipped() {
        let (sink, buffer) = sink(JsonSinkConfig::default());

        sink.write(
            Level::Warn,
            "reserved",
            &[Field::new("level", "bogus"), Field::new("user", "alice")],
        );

        let record: Value = serde_json::from_str(buffer.contents().trim_end()).unwrap();
        assert_eq!(record["level"], "warn");
        assert_eq!(record["user"], "alice");
    }

    #[test]
    fn records_below_the_configured_level_are_dropped() {
        let (sink, buffer) = sink(JsonSinkConfig {
            static_top_level_fields: Vec::new(),
            level: Level::Warn,
        });

        sink.write(Level::Info, "quiet", &[]);
        sink.write(Level::DPanic, "loud", &[]);

        let contents = buffer.contents();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains(r#""level":"dpanic""#));
    }

    #[test]
    fn reserved_static_keys_are_rejected() {
        let result = JsonSink::new(
            JsonSinkConfig {
                static_top_level_fields: vec![Field::new("pid", 1)],
                level: Level::Debug,
            },
            SharedBuffer::default(),
            CompactFormatter,
        );

        assert!(matches!(result, Err(LoggerError::Configuration(_))));
    }
}
