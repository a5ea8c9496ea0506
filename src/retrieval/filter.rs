//! Typed search filters.
//!
//! Filters serialize to the operator-object syntax understood by the search
//! service: `{"@eq": {"file_name": "a.pdf"}}`, `{"@and": [...]}` and so on.

use serde::{Serialize, Serializer};
use serde_json::{Value, json};

/// A predicate restricting which records a search may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Column equals value.
    Eq {
        /// Column name.
        column: String,
        /// Expected value.
        value: String,
    },
    /// Column contains value.
    Contains {
        /// Column name.
        column: String,
        /// Contained value.
        value: String,
    },
    /// All sub-filters hold.
    And(Vec<Self>),
    /// Any sub-filter holds.
    Or(Vec<Self>),
    /// The sub-filter does not hold.
    Not(Box<Self>),
}

impl Filter {
    /// Equality on one column.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Containment on one column.
    #[must_use]
    pub fn contains(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Contains {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Conjunction with another filter, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Renders the filter in the wire syntax.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Eq { column, value } => json!({ "@eq": { column: value } }),
            Self::Contains { column, value } => json!({ "@contains": { column: value } }),
            Self::And(parts) => json!({ "@and": Self::all_to_json(parts) }),
            Self::Or(parts) => json!({ "@or": Self::all_to_json(parts) }),
            Self::Not(inner) => json!({ "@not": inner.to_json() }),
        }
    }

    fn all_to_json(parts: &[Self]) -> Vec<Value> {
        parts.iter().map(Self::to_json).collect()
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
