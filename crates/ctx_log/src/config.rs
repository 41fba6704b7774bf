//! Builds an output [`Sink`] from a [`SinkConfig`].

use std::{num::NonZeroUsize, sync::Arc};

use serde_json::ser::{CompactFormatter, PrettyFormatter};
use tracing_appender::{non_blocking::WorkerGuard, rolling::Rotation};

use crate::{
    Field, Level, LoggerError,
    sink::{JsonSink, JsonSinkConfig, Sink, TeeSink},
};

/// Configuration for the sink a process logs to.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Key-value pairs that are statically defined at initialization and included
    /// at the top level of every record.
    pub static_top_level_fields: Vec<Field>,

    /// Configuration for file output. If `None`, file output is disabled.
    pub file_config: Option<FileSinkConfig>,

    /// Configuration for console output. If `None`, console output is disabled.
    pub console_config: Option<ConsoleSinkConfig>,
}

/// Configuration for file output.
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Directory where log files will be stored.
    pub directory: String,

    /// Prefix for log file names.
    pub file_name_prefix: String,

    /// Rotation strategy for log files.
    pub file_rotation: Rotation,

    /// Maximum number of log files to keep. If `None`, all files are kept.
    pub max_log_files: Option<NonZeroUsize>,

    /// Minimum level for records written to files.
    pub level: Level,
}

/// Configuration for console output.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSinkConfig {
    /// Minimum level for records written to the console.
    pub level: Level,

    /// Output format for console records.
    pub log_format: ConsoleLogFormat,
}

/// Defines the output format for console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLogFormat {
    /// Compact, single-line JSON format.
    CompactJson,

    /// Pretty-printed, multi-line JSON format.
    PrettyJson,
}

/// The sink built by [`build_sink`] and the worker guards keeping its outputs alive.
#[derive(Debug)]
pub struct SinkComponents {
    /// The sink to construct [`Logger`][crate::Logger]s from.
    pub sink: Arc<dyn Sink>,

    /// Worker guards for the file and console outputs.
    /// Records are written as long as these guards are in scope.
    pub guards: Vec<WorkerGuard>,
}

/// Constructs the sink described by `config`.
///
/// Each enabled output is a [`JsonSink`] writing through a non-blocking worker; when both are
/// enabled they are combined with a [`TeeSink`].
///
/// # Errors
///
/// Returns [`LoggerError`] if no output is enabled, if a static field uses a reserved key, or if
/// the rolling file appender cannot be created.
pub fn build_sink(config: SinkConfig) -> Result<SinkComponents, LoggerError> {
    let mut guards = Vec::new();
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

    // File output
    if let Some(file_config) = config.file_config {
        let mut file_appender_builder = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(file_config.file_rotation)
            .filename_prefix(file_config.file_name_prefix);

        if let Some(max_log_files) = file_config.max_log_files {
            file_appender_builder = file_appender_builder.max_log_files(usize::from(max_log_files));
        }

        let file_appender = file_appender_builder.build(&file_config.directory)?;
        let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);

        let sink = JsonSink::new(
            JsonSinkConfig {
                static_top_level_fields: config.static_top_level_fields.clone(),
                level: file_config.level,
            },
            non_blocking_appender,
            CompactFormatter,
        )?;
        sinks.push(Arc::new(sink));
    }

    // Console output
    if let Some(console_config) = config.console_config {
        let (non_blocking_stdout, guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(guard);

        let json_config = JsonSinkConfig {
            static_top_level_fields: config.static_top_level_fields,
            level: console_config.level,
        };

        let sink: Arc<dyn Sink> = match console_config.log_format {
            ConsoleLogFormat::CompactJson => Arc::new(JsonSink::new(
                json_config,
                non_blocking_stdout,
                CompactFormatter,
            )?),
            ConsoleLogFormat::PrettyJson => Arc::new(JsonSink::new(
                json_config,
                non_blocking_stdout,
                PrettyFormatter::new(),
            )?),
        };
        sinks.push(sink);
    }

    let sink: Arc<dyn Sink> = match sinks.pop() {
        None => {
            return Err(LoggerError::Configuration(
                "At least one of file or console output must be configured".to_string(),
            ))
        }
        Some(only) if sinks.is_empty() => only,
        Some(last) => {
            sinks.push(last);
            Arc::new(TeeSink::new(sinks))
        }
    };

    Ok(SinkComponents { sink, guards })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use serde_json::Value;

    use super::*;
    use crate::{Logger, RequestContext};

    fn file_config(directory: &std::path::Path) -> FileSinkConfig {
        FileSinkConfig {
            directory: directory.to_string_lossy().into_owned(),
            file_name_prefix: "ctx_log.log".to_string(),
            file_rotation: Rotation::NEVER,
            max_log_files: None,
            level: Level::Info,
        }
    }

    #[test]
    fn no_output_is_a_configuration_error() {
        let result = build_sink(SinkConfig {
            static_top_level_fields: Vec::new(),
            file_config: None,
            console_config: None,
        });

        assert!(matches!(result, Err(LoggerError::Configuration(_))));
    }

    #[test]
    fn reserved_static_field_is_rejected() {
        let directory = tempfile::tempdir().unwrap();
        let result = build_sink(SinkConfig {
            static_top_level_fields: vec![Field::new("hostname", "spoofed")],
            file_config: Some(file_config(directory.path())),
            console_config: None,
        });

        assert!(matches!(result, Err(LoggerError::Configuration(_))));
    }

    #[test]
    fn console_config_can_be_shared_between_builds() {
        let directory = tempfile::tempdir().unwrap();
        let console = ConsoleSinkConfig {
            level: Level::Warn,
            log_format: ConsoleLogFormat::CompactJson,
        };

        let combined = build_sink(SinkConfig {
            static_top_level_fields: Vec::new(),
            file_config: Some(file_config(directory.path())),
            console_config: Some(console),
        })
        .unwrap();
        let console_only = build_sink(SinkConfig {
            static_top_level_fields: Vec::new(),
            file_config: None,
            console_config: Some(console),
        })
        .unwrap();

        assert_eq!(combined.guards.len(), 2);
        assert_eq!(console_only.guards.len(), 1);
        assert_eq!(console.level, Level::Warn);
    }

    #[test]
    fn file_output_receives_enriched_records() {
        let directory = tempfile::tempdir().unwrap();
        let components = build_sink(SinkConfig {
            static_top_level_fields: vec![Field::new("service", "billing")],
            file_config: Some(file_config(directory.path())),
            console_config: None,
        })
        .unwrap();

        let logger = Logger::from_shared(Arc::clone(&components.sink)).with_fields(["request_id"]);
        let ctx = RequestContext::new().with_field("request_id", "abc");
        logger.debug(&ctx, &[&"filtered out"]);
        logger.info_kv(&ctx, "charged", [("amount", 42)]);
        logger.sync().unwrap();

        // Dropping the guards flushes the non-blocking worker.
        drop(logger);
        drop(components);

        let contents =
            std::fs::read_to_string(directory.path().join("ctx_log.log")).expect("log file");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);

        let record: Value = serde_json::from_str(lines.first().copied().unwrap_or_default())
            .expect("valid JSON record");
        assert_eq!(record.get("message"), Some(&Value::from("charged")));
        assert_eq!(record.get("service"), Some(&Value::from("billing")));
        assert_eq!(record.get("request_id"), Some(&Value::from("abc")));
        assert_eq!(record.get("amount"), Some(&Value::from(42)));
    }
}
