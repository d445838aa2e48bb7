use crate::format::FormatError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// A loggable runtime value.
///
/// Log entries are heterogeneous lists of values. Each variant has exactly
/// one rendering rule in [`format`](crate::format()); conversions from
/// common Rust types are provided through `From`, so most callers never
/// name a variant directly.
///
/// # Examples
///
/// ```
/// use logbook::{format, Value};
///
/// let value = Value::record([
///     ("user", Value::from("ada")),
///     ("tags", Value::from(vec!["a", "b"])),
/// ]);
/// assert_eq!(format(&value).unwrap(), "{user: ada, tags: [a, b]}");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Value {
    /// An absent value. Renders as `undefined`.
    Undefined,
    /// Renders as `null`.
    Null,
    Bool(bool),
    /// A double-precision number.
    Number(f64),
    /// A 64-bit (or wider) integer. Renders with an `n` suffix.
    BigInt(i128),
    String(String),
    /// An opaque symbolic identifier, rendered through its description.
    Symbol(String),
    /// A callable. Renders as `function`.
    Function,
    /// A positional sequence.
    Array(Vec<Value>),
    /// A plain key/value record, in insertion order.
    Record(Vec<(String, Value)>),
    /// An associative or set-like collection exposed as entry pairs.
    Entries(Vec<(Value, Value)>),
    /// An error-like value carrying its diagnostic trace, if any.
    Error(Option<String>),
    /// A value with its own canonical JSON projection.
    Projected(Projection),
    /// Anything without a better description. Renders as `{}`.
    Opaque,
}

impl Value {
    /// Build a record from key/value pairs, keeping their order.
    pub fn record<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build an entry-pair collection (map-like) from pairs.
    pub fn entries<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Entries(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a symbol with the given description.
    pub fn symbol(description: impl Into<String>) -> Self {
        Value::Symbol(description.into())
    }

    /// Capture an error's trace: its message followed by its `source()` chain.
    ///
    /// ```
    /// use logbook::{format, Value};
    ///
    /// let err = std::io::Error::other("disk on fire");
    /// assert_eq!(format(&Value::error(&err)).unwrap(), "Error: disk on fire");
    /// ```
    pub fn error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut trace = format!("Error: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = write!(trace, "\n    Caused by: {cause}");
            source = cause.source();
        }
        Value::Error(Some(trace))
    }

    /// Wrap a serializable value whose JSON form is its display form.
    ///
    /// Serialization is deferred to the moment the entry is written, and a
    /// serialization failure turns into the placeholder line for this value
    /// instead of failing the entry.
    pub fn json<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Value::Projected(Projection::new(move || {
            serde_json::to_string(&value).map_err(|e| FormatError::Projection(e.to_string()))
        }))
    }
}

type ProjectFn = dyn Fn() -> Result<String, FormatError> + Send + Sync;

/// A deferred canonical projection of a value into text.
#[derive(Clone)]
pub struct Projection(Arc<ProjectFn>);

impl Projection {
    /// Create a projection from a rendering closure.
    pub fn new<F>(project: F) -> Self
    where
        F: Fn() -> Result<String, FormatError> + Send + Sync + 'static,
    {
        Projection(Arc::new(project))
    }

    pub(crate) fn project(&self) -> Result<String, FormatError> {
        (self.0)()
    }
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Projection(..)")
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(f64::from(n))
            }
        })*
    };
}

macro_rules! bigint_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::BigInt(n as i128)
            }
        })*
    };
}

number_from!(i8, i16, i32, u8, u16, u32, f32, f64);
bigint_from!(i64, u64, isize, usize, i128);

impl From<u128> for Value {
    fn from(n: u128) -> Self {
        Value::BigInt(i128::try_from(n).unwrap_or(i128::MAX))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::String(c.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Undefined, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(items: &[T]) -> Self {
        Value::Array(items.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<Value>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(map: BTreeMap<K, V>) -> Self {
        Value::entries(map)
    }
}

impl<K: Into<Value>, V: Into<Value>, S> From<HashMap<K, V, S>> for Value {
    fn from(map: HashMap<K, V, S>) -> Self {
        Value::entries(map)
    }
}

// Sets follow the entry protocol: every member is both key and value.
impl<T: Into<Value> + Clone> From<BTreeSet<T>> for Value {
    fn from(set: BTreeSet<T>) -> Self {
        Value::entries(set.into_iter().map(|v| (v.clone(), v)))
    }
}

impl<T: Into<Value> + Clone, S> From<HashSet<T, S>> for Value {
    fn from(set: HashSet<T, S>) -> Self {
        Value::entries(set.into_iter().map(|v| (v.clone(), v)))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::json(json)
    }
}

impl From<Projection> for Value {
    fn from(projection: Projection) -> Self {
        Value::Projected(projection)
    }
}

/// Build a `Vec<Value>` entry from heterogeneous expressions.
///
/// ```
/// use logbook::{values, Value};
///
/// let entry: Vec<Value> = values!["boom", 42, true];
/// assert_eq!(entry.len(), 3);
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::Value::from($value)),+]
    };
}
