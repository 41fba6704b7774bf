//! `ctx_log` lets one long-lived [`Logger`] be shared by a whole process while every call is
//! enriched with request-scoped values, such as a request ID or a tenant ID, carried in the
//! caller's context.
//!
//! It offers:
//! - A [`Logger`] holding an ordered registry of field names. On each call it reads those
//!   names from the supplied context and writes the values it finds ahead of the call-site
//!   fields, at the requested [`Level`].
//! - A [`RequestContext`], an immutable request-scoped carrier of field values and of typed
//!   values such as a child [`Logger`] (see [`Logger::attach_to`]).
//! - A [`Sink`] trait for the underlying structured-logging engine, with a [`JsonSink`] for
//!   line-delimited JSON, a [`TracingSink`] forwarding to [`tracing`], and [`MemorySink`],
//!   [`TeeSink`] and [`NopSink`].
//! - A [`build_sink`] function constructing file and console outputs from a [`SinkConfig`].
//!
//! # Example
//!
//! ```
//! use ctx_log::{Field, Level, Logger, MemorySink, RequestContext};
//!
//! // Created once at startup and shared by every request handler.
//! let sink = MemorySink::new();
//! let logger = Logger::new(sink.clone()).with_fields(["request_id", "tenant"]);
//!
//! // Populated by middleware for each request.
//! let ctx = RequestContext::new().with_field("request_id", "req-42");
//!
//! logger.info_kv(&ctx, "charge accepted", [("amount", 1250)]);
//! logger.warn_fmt(&ctx, format_args!("retrying in {}ms", 200));
//!
//! let records = sink.records();
//! assert_eq!(records[0].level, Level::Info);
//! // `tenant` is not in the context, so it is left out.
//! assert_eq!(
//!     records[0].fields,
//!     vec![Field::new("request_id", "req-42"), Field::new("amount", 1250)]
//! );
//! assert_eq!(records[1].message, "retrying in 200ms");
//! ```

mod config;
mod context;
mod error;
mod field;
mod level;
mod logger;
pub mod sink;

pub use tracing_appender::{non_blocking::WorkerGuard, rolling::Rotation};

pub use self::{
    config::{
        ConsoleLogFormat, ConsoleSinkConfig, FileSinkConfig, SinkComponents, SinkConfig, build_sink,
    },
    context::{ContextKey, FieldSource, RequestContext},
    error::LoggerError,
    field::{Field, FieldName},
    level::Level,
    logger::Logger,
    sink::{
        JsonSink, JsonSinkConfig, MemorySink, NopSink, Record, Sink, TeeSink, TracingSink,
    },
};
