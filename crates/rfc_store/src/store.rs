//! Parameter store trait definition.

use crate::error::StoreResult;

/// Declared type of a stored parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Free-form string.
    String,
    /// `true` / `false`.
    Boolean,
    /// Signed integer.
    Int,
    /// Unsigned integer.
    UnsignedInt,
}

impl ParamType {
    /// Infers a type from a raw value.
    pub fn infer(value: &str) -> Self {
        let v = unquote(value);
        if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false") {
            ParamType::Boolean
        } else if !v.is_empty() && v.parse::<u64>().is_ok() {
            ParamType::UnsignedInt
        } else if !v.is_empty() && v.parse::<i64>().is_ok() {
            ParamType::Int
        } else {
            ParamType::String
        }
    }
}

/// Where a successful read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// The value was explicitly stored.
    Stored,
    /// No stored value; the store answered with its default.
    Default,
}

/// A parameter value as returned by [`ConfigStore::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Raw value, possibly wrapped in double quotes.
    pub value: String,
    /// Declared type.
    pub param_type: ParamType,
    /// Stored or default.
    pub source: ReadSource,
}

impl Param {
    /// Creates a stored parameter, inferring its type.
    pub fn stored(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            param_type: ParamType::infer(&value),
            value,
            source: ReadSource::Stored,
        }
    }

    /// Creates a default-valued parameter, inferring its type.
    pub fn default_value(value: impl Into<String>) -> Self {
        Self {
            source: ReadSource::Default,
            ..Self::stored(value)
        }
    }

    /// Returns true if `candidate` denotes the same value under this
    /// parameter's type.
    ///
    /// Booleans compare case-insensitively and integers numerically;
    /// strings must match exactly.
    pub fn matches(&self, candidate: &str) -> bool {
        let current = self.unquoted();
        match self.param_type {
            ParamType::Boolean => current.eq_ignore_ascii_case(candidate),
            ParamType::UnsignedInt => candidate
                .parse::<u64>()
                .is_ok_and(|c| current.parse::<u64>().is_ok_and(|v| v == c)),
            ParamType::Int => candidate
                .parse::<i64>()
                .is_ok_and(|c| current.parse::<i64>().is_ok_and(|v| v == c)),
            ParamType::String => current == candidate,
        }
    }

    /// Returns the value with one pair of surrounding double quotes removed.
    pub fn unquoted(&self) -> &str {
        unquote(&self.value)
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// The persisted parameter namespace as seen by the sync agent.
///
/// Only the get/set contract is consumed; storage mechanics belong to
/// the implementor.
///
/// # Invariants
///
/// - `get` returning `Ok(None)` means the parameter does not exist and
///   has no default
/// - A read served from the defaults layer is a success
///   ([`ReadSource::Default`])
/// - `set` is attributed to an owner and is durable once it returns `Ok`
pub trait ConfigStore: Send + Sync {
    /// Reads a parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, name: &str) -> StoreResult<Option<Param>>;

    /// Writes a parameter on behalf of `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error describing why the store rejected the write.
    fn set(&self, owner: &str, name: &str, value: &str) -> StoreResult<()>;

    /// Reads a parameter's value with surrounding quotes stripped.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_value(&self, name: &str) -> StoreResult<Option<String>> {
        Ok(self.get(name)?.map(|p| p.unquoted().to_string()))
    }
}

impl<S: ConfigStore + ?Sized> ConfigStore for std::sync::Arc<S> {
    fn get(&self, name: &str) -> StoreResult<Option<Param>> {
        (**self).get(name)
    }

    fn set(&self, owner: &str, name: &str, value: &str) -> StoreResult<()> {
        (**self).set(owner, name, value)
    }
}
