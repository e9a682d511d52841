//! Declared join relationships between datasets.

use serde::{Deserialize, Serialize};

/// SQL join type applied when an edge is traversed left-to-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// The join type when the edge is traversed in the opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            JoinType::Left => JoinType::Right,
            JoinType::Right => JoinType::Left,
            JoinType::Inner => JoinType::Inner,
            JoinType::Full => JoinType::Full,
        }
    }
}

/// Cardinality hint of a relationship between datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Reverse the cardinality (swap left/right sides).
    pub fn reverse(self) -> Self {
        match self {
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }

    /// True if traversing in the declared direction can multiply rows.
    pub fn causes_fanout(&self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::OneToOne => write!(f, "1:1"),
            Cardinality::OneToMany => write!(f, "1:N"),
            Cardinality::ManyToOne => write!(f, "N:1"),
            Cardinality::ManyToMany => write!(f, "N:N"),
        }
    }
}

/// A declared relationship between two datasets' keys.
///
/// Undirected in declaration: path resolution may traverse it either way,
/// reversing the join type and cardinality when walking right-to-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinEdge {
    pub left_dataset: String,
    pub left_key: String,
    pub right_dataset: String,
    pub right_key: String,
    pub join_type: JoinType,
    pub cardinality: Cardinality,
}

impl JoinEdge {
    pub fn new(
        left_dataset: impl Into<String>,
        left_key: impl Into<String>,
        right_dataset: impl Into<String>,
        right_key: impl Into<String>,
        join_type: JoinType,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            left_dataset: left_dataset.into(),
            left_key: left_key.into(),
            right_dataset: right_dataset.into(),
            right_key: right_key.into(),
            join_type,
            cardinality,
        }
    }

    /// True if this edge connects the given unordered dataset pair.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.left_dataset == a && self.right_dataset == b)
            || (self.left_dataset == b && self.right_dataset == a)
    }

    /// The key pair oriented from `from`, or `None` if `from` is not an
    /// endpoint of this edge.
    pub fn keys_from(&self, from: &str) -> Option<(&str, &str)> {
        if self.left_dataset == from {
            Some((&self.left_key, &self.right_key))
        } else if self.right_dataset == from {
            Some((&self.right_key, &self.left_key))
        } else {
            None
        }
    }
}
