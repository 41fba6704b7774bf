//! Request-scoped values read by a [`Logger`][crate::Logger] on every call.
//!
//! A [`RequestContext`] is an immutable chain of bindings. Deriving a context with an extra
//! binding never modifies the context it was derived from, so one context may be shared
//! between threads and handed down a call chain while inner scopes layer their own values
//! on top of it.

use std::{
    any::Any,
    collections::{BTreeMap, HashMap},
    fmt,
    hash::BuildHasher,
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use serde_json::Value;

use crate::field::{Field, FieldName};

/// A read-only lookup of field values by name.
///
/// This is the only capability a [`Logger`][crate::Logger] needs from a context. Lookups must
/// be pure reads, since one context may be read concurrently by several threads.
pub trait FieldSource {
    /// Returns the value bound to `name`, or `None` if the source does not carry it.
    fn field(&self, name: &str) -> Option<&Value>;
}

impl<T: FieldSource + ?Sized> FieldSource for &T {
    fn field(&self, name: &str) -> Option<&Value> {
        (**self).field(name)
    }
}

impl<T: FieldSource + ?Sized> FieldSource for Arc<T> {
    fn field(&self, name: &str) -> Option<&Value> {
        (**self).field(name)
    }
}

impl<S: BuildHasher> FieldSource for HashMap<String, Value, S> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl FieldSource for BTreeMap<String, Value> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl FieldSource for serde_json::Map<String, Value> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(0);

/// A key under which a value of type `T` can be stored in a [`RequestContext`].
///
/// Every key minted with [`ContextKey::new`] is distinct from every other key, even when both
/// share a name. Create keys once (e.g. in a `static` [`LazyLock`][std::sync::LazyLock]) and
/// share them between the code that stores and the code that reads the value.
pub struct ContextKey<T> {
    id: u64,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    /// Mints a new, process-unique key. The name is only used for debugging output.
    pub fn new(name: &'static str) -> Self {
        Self {
            id: NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed),
            name,
            _marker: PhantomData,
        }
    }

    /// The name given to this key.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextKey")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

enum Entry {
    Field {
        name: FieldName,
        value: Value,
    },
    Value {
        key_id: u64,
        key_name: &'static str,
        value: Arc<dyn Any + Send + Sync>,
    },
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { name, value } => f
                .debug_struct("Field")
                .field("name", name)
                .field("value", value)
                .finish(),
            Self::Value { key_name, .. } => f
                .debug_struct("Value")
                .field("key", key_name)
                .finish_non_exhaustive(),
        }
    }
}

struct Binding {
    entry: Entry,
    parent: Option<Arc<Binding>>,
}

/// An immutable, cheaply clonable carrier of request-scoped values.
///
/// Lookups see the most recently added binding for a key first, so inner scopes shadow
/// outer ones. Lookups that find nothing return `None`; they never fail.
///
/// ```
/// use ctx_log::{FieldSource, RequestContext};
/// use serde_json::Value;
///
/// let outer = RequestContext::new().with_field("request_id", "abc");
/// let inner = outer.with_field("user", "alice");
///
/// assert_eq!(inner.field("request_id"), Some(&Value::from("abc")));
/// assert_eq!(inner.field("user"), Some(&Value::from("alice")));
/// assert_eq!(outer.field("user"), None);
/// ```
#[derive(Clone, Default)]
pub struct RequestContext {
    head: Option<Arc<Binding>>,
}

impl RequestContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new context with the field `name` bound to `value`.
    #[must_use]
    pub fn with_field(&self, name: impl Into<FieldName>, value: impl Into<Value>) -> Self {
        self.push(Entry::Field {
            name: name.into(),
            value: value.into(),
        })
    }

    /// Returns a new context with each of the given fields bound, in iteration order.
    #[must_use]
    pub fn with_fields<I>(&self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Field>,
    {
        fields.into_iter().fold(self.clone(), |ctx, field| {
            let Field { key, value } = field.into();
            ctx.with_field(key, value)
        })
    }

    /// Returns a new context carrying `value` under `key`.
    #[must_use]
    pub fn with_value<T>(&self, key: &ContextKey<T>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.push(Entry::Value {
            key_id: key.id,
            key_name: key.name,
            value: Arc::new(value),
        })
    }

    /// Returns the value stored under `key`, if any.
    pub fn value<T>(&self, key: &ContextKey<T>) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.entries().find_map(|entry| match entry {
            Entry::Value { key_id, value, .. } if *key_id == key.id => {
                (**value).downcast_ref::<T>()
            }
            _ => None,
        })
    }

    /// Whether the context carries no bindings at all.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    fn push(&self, entry: Entry) -> Self {
        Self {
            head: Some(Arc::new(Binding {
                entry,
                parent: self.head.clone(),
            })),
        }
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        std::iter::successors(self.head.as_deref(), |binding| binding.parent.as_deref())
            .map(|binding| &binding.entry)
    }
}

impl FieldSource for RequestContext {
    fn field(&self, name: &str) -> Option<&Value> {
        self.entries().find_map(|entry| match entry {
            Entry::Field {
                name: bound,
                value,
            } if bound == name => Some(value),
            _ => None,
        })
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}

impl Drop for RequestContext {
    // Unlinks uniquely owned bindings iteratively, so long chains cannot overflow the stack.
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(binding) = next {
            next = match Arc::try_unwrap(binding) {
                Ok(mut binding) => binding.parent.take(),
                Err(_) => None,
            };
        }
    }
}
