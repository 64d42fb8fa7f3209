use crate::handle::Handle;
use smallvec::SmallVec;
use std::fmt;

/// Values carried by returns and non-local transfers.
///
/// Uses SmallVec to avoid heap allocations for the common case of a handful
/// of return values.
pub type Values = SmallVec<[Value; 4]>;

/// Builds a [`Values`] list, converting each item with `Value::from`.
#[macro_export]
macro_rules! values {
    ($($value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut values = $crate::Values::new();
        $(values.push($crate::Value::from($value));)*
        values
    }};
}

/// Dynamic value passed through frames.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    Undef,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// A captured context handle
    Context(Handle),
}

impl Value {
    /// Name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undef => "undef",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Context(_) => "context",
        }
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Value::Undef)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Value::Context(h) => Some(*h),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undef => write!(f, "undef"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Context(h) => write!(f, "context({h})"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Handle> for Value {
    fn from(value: Handle) -> Self {
        Value::Context(value)
    }
}

/// Evaluation context a caller expects from a call or guarded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Want {
    /// The caller discards the result
    #[default]
    Void,
    /// The caller expects a single value
    Scalar,
    /// The caller expects a sequence of values
    List,
}

impl Want {
    /// Trims `values` down to what a caller with this expectation receives.
    ///
    /// Scalar context keeps the last value, or `undef` when there is none.
    pub fn deliver(self, mut values: Values) -> Values {
        match self {
            Want::Void => Values::new(),
            Want::Scalar => {
                let last = values.pop().unwrap_or_default();
                let mut scalar = Values::new();
                scalar.push(last);
                scalar
            }
            Want::List => values,
        }
    }
}

impl fmt::Display for Want {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Want::Void => write!(f, "void"),
            Want::Scalar => write!(f, "scalar"),
            Want::List => write!(f, "list"),
        }
    }
}
