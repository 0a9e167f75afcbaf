//! # Query keys and normalization.
//!
//! A query is addressed by a [`KeySpec`], which comes in the three shapes the
//! public API accepts:
//!
//! - [`KeySpec::Plain`] — a bare string id;
//! - [`KeySpec::Composite`] — a base id plus structured variables;
//! - [`KeySpec::Explicit`] — a full [`QuerySpec`] record carrying its own
//!   fetcher and config.
//!
//! Normalization produces a [`QueryKey`]: a deterministic canonical string
//! used for registry lookup, alongside the *original* base id and variables.
//! The canonical form serializes variables with object members sorted at
//! every nesting level, so two structurally equal variable sets always map to
//! the same registry entry. Array element order is preserved (it is part of
//! the identity).
//!
//! ## Rules
//! - The fetcher is always invoked with the original base id and variables,
//!   never with the canonical string.
//! - Missing `key`/`fetcher` in the explicit form fails at build time with a
//!   [`BuildError`], not inside the async query state.

use serde_json::Value;

use crate::config::QueryConfig;
use crate::error::BuildError;
use crate::fetch::FetchRef;

/// A query key specification, one of the three accepted shapes.
pub enum KeySpec {
    /// A bare string id. Canonicalizes to itself, with null variables.
    Plain(String),
    /// A base id plus structured variables.
    Composite(String, Value),
    /// A full record; may carry its own fetcher and config.
    Explicit(QuerySpec),
}

/// The explicit record form of a query specification.
///
/// All fields are optional at the type level; [`KeySpec::Explicit`] validates
/// at build time that `key` is present and that a fetcher is available either
/// here or as a call argument.
#[derive(Default)]
pub struct QuerySpec {
    /// Base query id.
    pub key: Option<String>,
    /// Structured variables (defaults to null).
    pub variables: Option<Value>,
    /// Fetch function to use for this query.
    pub fetcher: Option<FetchRef>,
    /// Per-query configuration overrides.
    pub config: Option<QueryConfig>,
}

impl QuerySpec {
    /// Creates an empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base query id.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the structured variables.
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Sets the fetch function.
    pub fn with_fetcher(mut self, fetcher: FetchRef) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Sets the per-query configuration.
    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = Some(config);
        self
    }
}

impl From<&str> for KeySpec {
    fn from(key: &str) -> Self {
        KeySpec::Plain(key.to_string())
    }
}

impl From<String> for KeySpec {
    fn from(key: String) -> Self {
        KeySpec::Plain(key)
    }
}

impl From<(String, Value)> for KeySpec {
    fn from((base, variables): (String, Value)) -> Self {
        KeySpec::Composite(base, variables)
    }
}

impl From<(&str, Value)> for KeySpec {
    fn from((base, variables): (&str, Value)) -> Self {
        KeySpec::Composite(base.to_string(), variables)
    }
}

impl From<QuerySpec> for KeySpec {
    fn from(spec: QuerySpec) -> Self {
        KeySpec::Explicit(spec)
    }
}

impl KeySpec {
    /// Validates the specification and splits it into its normalized key, the
    /// fetcher to use, and any embedded config.
    ///
    /// Call arguments take precedence over fields embedded in an explicit
    /// record. Errors are raised here, synchronously, at build time.
    pub(crate) fn into_parts(
        self,
        fetcher: Option<FetchRef>,
        config: Option<QueryConfig>,
    ) -> Result<(QueryKey, FetchRef, Option<QueryConfig>), BuildError> {
        match self {
            KeySpec::Plain(base) => {
                let fetcher = fetcher.ok_or(BuildError::MissingFetcher)?;
                Ok((QueryKey::normalize(base, Value::Null), fetcher, config))
            }
            KeySpec::Composite(base, variables) => {
                let fetcher = fetcher.ok_or(BuildError::MissingFetcher)?;
                Ok((QueryKey::normalize(base, variables), fetcher, config))
            }
            KeySpec::Explicit(spec) => {
                let base = spec.key.ok_or(BuildError::MissingKey)?;
                let fetcher = fetcher
                    .or(spec.fetcher)
                    .ok_or(BuildError::MissingFetcher)?;
                let config = config.or(spec.config);
                let variables = spec.variables.unwrap_or(Value::Null);
                Ok((QueryKey::normalize(base, variables), fetcher, config))
            }
        }
    }
}

/// Normalized identity of a query.
///
/// Holds the canonical registry string plus the original base id and
/// variables, which are what the fetcher receives.
#[derive(Clone, Debug)]
pub struct QueryKey {
    canonical: String,
    base: String,
    variables: Value,
}

impl QueryKey {
    /// Normalizes a base id and variables into a canonical key.
    ///
    /// A null variables value canonicalizes to the bare base id; anything
    /// else appends a stable serialization of the variables.
    pub fn normalize(base: String, variables: Value) -> Self {
        let canonical = if variables.is_null() {
            base.clone()
        } else {
            let mut out = base.clone();
            write_stable(&variables, &mut out);
            out
        };
        Self {
            canonical,
            base,
            variables,
        }
    }

    /// The canonical registry string.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// The original base id.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The original, non-serialized variables.
    pub fn variables(&self) -> &Value {
        &self.variables
    }
}

/// Serializes a JSON value with object members sorted at every level.
///
/// Array order is preserved; primitives use their standard JSON form.
fn write_stable(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_stable(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_stable(item, out);
            }
            out.push(']');
        }
        primitive => out.push_str(&primitive.to_string()),
    }
}
