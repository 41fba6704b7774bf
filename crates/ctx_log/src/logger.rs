//! Provides [`Logger`], a shareable logger that enriches every call with fields read from the
//! caller's context.

use std::{
    fmt::{self, Write as _},
    sync::Arc,
};

use crate::{
    Level, LoggerError,
    context::{ContextKey, FieldSource, RequestContext},
    field::{Field, FieldName},
    sink::Sink,
};

/// Generates the three call styles for one level.
macro_rules! leveled_methods {
    (terminal $level:expr, $name:literal, $plain:ident, $formatted:ident, $keyed:ident $(, #[$meta:meta])*) => {
        #[doc = concat!("Logs `args` at ", $name, " level, rendered with `Display` and joined by single spaces.")]
        $(#[$meta])*
        pub fn $plain<C: FieldSource + ?Sized>(&self, ctx: &C, args: &[&dyn fmt::Display]) -> ! {
            let message = join_args(args);
            self.write($level, ctx, &message, std::iter::empty::<Field>());
            self.terminate($level, &message)
        }

        #[doc = concat!("Logs a message built with [`format_args!`] at ", $name, " level.")]
        $(#[$meta])*
        pub fn $formatted<C: FieldSource + ?Sized>(&self, ctx: &C, args: fmt::Arguments<'_>) -> ! {
            let message = render(args);
            self.write($level, ctx, &message, std::iter::empty::<Field>());
            self.terminate($level, &message)
        }

        #[doc = concat!("Logs `message` with the call-site `fields` at ", $name, " level.")]
        $(#[$meta])*
        pub fn $keyed<C, I>(&self, ctx: &C, message: &str, fields: I) -> !
        where
            C: FieldSource + ?Sized,
            I: IntoIterator,
            I::Item: Into<Field>,
        {
            self.write($level, ctx, message, fields);
            self.terminate($level, message)
        }
    };
    ($level:expr, $name:literal, $plain:ident, $formatted:ident, $keyed:ident $(, #[$meta:meta])*) => {
        #[doc = concat!("Logs `args` at ", $name, " level, rendered with `Display` and joined by single spaces.")]
        $(#[$meta])*
        pub fn $plain<C: FieldSource + ?Sized>(&self, ctx: &C, args: &[&dyn fmt::Display]) {
            self.log($level, ctx, &join_args(args), std::iter::empty::<Field>());
        }

        #[doc = concat!("Logs a message built with [`format_args!`] at ", $name, " level.")]
        $(#[$meta])*
        pub fn $formatted<C: FieldSource + ?Sized>(&self, ctx: &C, args: fmt::Arguments<'_>) {
            self.log($level, ctx, &render(args), std::iter::empty::<Field>());
        }

        #[doc = concat!("Logs `message` with the call-site `fields` at ", $name, " level.")]
        $(#[$meta])*
        pub fn $keyed<C, I>(&self, ctx: &C, message: &str, fields: I)
        where
            C: FieldSource + ?Sized,
            I: IntoIterator,
            I::Item: Into<Field>,
        {
            self.log($level, ctx, message, fields);
        }
    };
}

/// A logger that is created once, shared by every request handler, and enriches each call
/// with request-scoped fields.
///
/// A [`Logger`] holds a shared [`Sink`] and an ordered list of registered field names. On every
/// call it looks each registered name up in the supplied context, and writes the fields it
/// found (in registration order) followed by the call-site fields. Names missing from the
/// context are skipped. Nothing is deduplicated: a key present in both places is written
/// twice, context value first.
///
/// Each level offers three call styles:
/// - `info(ctx, &[&a, &b])` joins its operands into the message.
/// - `info_fmt(ctx, format_args!(..))` renders a template.
/// - `info_kv(ctx, message, fields)` writes call-site key/value fields.
///
/// In all three the context fields are passed to the sink as key/value fields.
///
/// Records are handed to the sink at their own level unless a level map installed with
/// [`Logger::with_level_map`] routes them elsewhere.
///
/// A [`Logger`] is immutable: every `with_*`/`bind*` operation returns a new value, and clones
/// are cheap, so it can be shared freely between threads.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Sink>,
    fields: Arc<[FieldName]>,
    level_map: [Option<Level>; 7],
    development: bool,
    exit_hook: fn(i32) -> !,
}

impl Logger {
    /// Creates a [`Logger`] writing to `sink`, with no registered fields.
    pub fn new(sink: impl Sink + 'static) -> Self {
        Self::from_shared(Arc::new(sink))
    }

    /// Creates a [`Logger`] writing to a sink that may also be used elsewhere.
    pub fn from_shared(sink: Arc<dyn Sink>) -> Self {
        Self {
            sink,
            fields: Arc::from(Vec::new()),
            level_map: Level::ALL.map(Some),
            development: false,
            exit_hook: std::process::exit,
        }
    }

    /// Enables or disables development mode, in which [`Level::DPanic`] calls panic after
    /// writing.
    #[must_use]
    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    /// Replaces the function invoked with exit status `1` after a [`Level::Fatal`] record has
    /// been written and the sink synced. Defaults to [`std::process::exit`].
    #[must_use]
    pub fn with_exit_hook(mut self, exit_hook: fn(i32) -> !) -> Self {
        self.exit_hook = exit_hook;
        self
    }

    /// Replaces the level each record is handed to the sink at.
    ///
    /// `map` is evaluated once per [`Level`]. A record logged at `level` is written at
    /// `map(level)`, or dropped when that is `None`. Escalation still follows the level the
    /// caller asked for: a dropped [`Level::Panic`] record panics all the same. The map is kept
    /// by every logger derived from this one.
    #[must_use]
    pub fn with_level_map(mut self, map: impl Fn(Level) -> Option<Level>) -> Self {
        self.level_map = Level::ALL.map(map);
        self
    }

    /// Returns a new [`Logger`] that additionally probes the context for `names`.
    ///
    /// The names are appended after the already registered ones; duplicates are kept. The
    /// receiver is left unchanged.
    #[must_use]
    pub fn with_fields<I>(&self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldName>,
    {
        let mut names = names.into_iter().map(Into::into).peekable();
        if names.peek().is_none() {
            return self.clone();
        }

        Self {
            fields: self.fields.iter().cloned().chain(names).collect(),
            ..self.clone()
        }
    }

    /// The registered field names, in probe order.
    pub fn fields(&self) -> &[FieldName] {
        &self.fields
    }

    /// Returns a new [`Logger`] whose sink writes `fields` with every record.
    ///
    /// The registered field names are kept.
    #[must_use]
    pub fn bind<I>(&self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Field>,
    {
        let fields: Vec<Field> = fields.into_iter().map(Into::into).collect();
        Self {
            sink: self.sink.with_fields(&fields),
            ..self.clone()
        }
    }

    /// Returns a child [`Logger`] with the fields extracted from `ctx` bound to its sink and no
    /// registered field names.
    ///
    /// Logging through the child with any context writes the same fields as logging through
    /// `self` with `ctx`. The child is meant to be carried in a context with
    /// [`Logger::attach_to`].
    #[must_use]
    pub fn for_context<C: FieldSource + ?Sized>(&self, ctx: &C) -> Self {
        Self {
            fields: Arc::from(Vec::new()),
            ..self.bind(self.extract(ctx))
        }
    }

    /// Returns a new context carrying this [`Logger`] under `key`.
    #[must_use]
    pub fn attach_to(&self, ctx: &RequestContext, key: &ContextKey<Self>) -> RequestContext {
        ctx.with_value(key, self.clone())
    }

    /// Returns the [`Logger`] attached to `ctx` under `key`, or `self` if there is none.
    pub fn resolve_from_context<'a>(
        &'a self,
        ctx: &'a RequestContext,
        key: &ContextKey<Self>,
    ) -> &'a Self {
        ctx.value(key).unwrap_or(self)
    }

    /// Returns the registered fields present in `ctx`, in registration order.
    pub fn extract<C: FieldSource + ?Sized>(&self, ctx: &C) -> Vec<Field> {
        self.fields
            .iter()
            .filter_map(|name| {
                ctx.field(name).map(|value| Field {
                    key: name.clone(),
                    value: value.clone(),
                })
            })
            .collect()
    }

    /// Logs `message` with the call-site `fields` at a level chosen at runtime.
    ///
    /// # Panics
    ///
    /// Panics after writing when `level` is [`Level::Panic`], or [`Level::DPanic`] in
    /// development mode. For [`Level::Fatal`] the exit hook is invoked instead.
    pub fn log<C, I>(&self, level: Level, ctx: &C, message: &str, fields: I)
    where
        C: FieldSource + ?Sized,
        I: IntoIterator,
        I::Item: Into<Field>,
    {
        self.write(level, ctx, message, fields);
        match level {
            Level::DPanic if self.development => self.terminate(level, message),
            Level::Panic | Level::Fatal => self.terminate(level, message),
            _ => (),
        }
    }

    leveled_methods!(Level::Debug, "debug", debug, debug_fmt, debug_kv);
    leveled_methods!(Level::Info, "info", info, info_fmt, info_kv);
    leveled_methods!(Level::Warn, "warn", warn, warn_fmt, warn_kv);
    leveled_methods!(Level::Error, "error", error, error_fmt, error_kv);
    leveled_methods!(
        Level::DPanic,
        "dpanic",
        dpanic,
        dpanic_fmt,
        dpanic_kv,
        #[doc = ""],
        #[doc = "# Panics"],
        #[doc = ""],
        #[doc = "Panics after writing if the logger is in development mode."]
    );
    leveled_methods!(
        terminal Level::Panic,
        "panic",
        panic,
        panic_fmt,
        panic_kv,
        #[doc = ""],
        #[doc = "# Panics"],
        #[doc = ""],
        #[doc = "Always panics with the message after writing."]
    );
    leveled_methods!(
        terminal Level::Fatal,
        "fatal",
        fatal,
        fatal_fmt,
        fatal_kv,
        #[doc = ""],
        #[doc = "After writing, the sink is synced and the process exits with status `1`."]
    );

    /// Flushes the sink. Call once during orderly shutdown.
    ///
    /// # Errors
    ///
    /// Returns the sink's failure unchanged.
    pub fn sync(&self) -> Result<(), LoggerError> {
        self.sink.sync()
    }

    fn write<C, I>(&self, level: Level, ctx: &C, message: &str, fields: I)
    where
        C: FieldSource + ?Sized,
        I: IntoIterator,
        I::Item: Into<Field>,
    {
        let Some(routed) = self.level_map.get(level.index()).copied().flatten() else {
            return;
        };
        let mut merged = self.extract(ctx);
        merged.extend(fields.into_iter().map(Into::into));
        self.sink.write(routed, message, &merged);
    }

    #[allow(clippy::panic)]
    fn terminate(&self, level: Level, message: &str) -> ! {
        if level == Level::Fatal {
            let _ = self.sink.sync();
            (self.exit_hook)(1)
        }
        panic!("{message}")
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("sink", &self.sink)
            .field("fields", &self.fields)
            .field("level_map", &self.level_map)
            .field("development", &self.development)
            .finish_non_exhaustive()
    }
}

fn join_args(args: &[&dyn fmt::Display]) -> String {
    let mut message = String::new();
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            message.push(' ');
        }
        let _ = write!(message, "{arg}");
    }
    message
}

fn render(args: fmt::Arguments<'_>) -> String {
    args.as_str()
        .map_or_else(|| args.to_string(), ToOwned::to_owned)
}
