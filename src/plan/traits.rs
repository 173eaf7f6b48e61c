use std::fmt;

use itertools::Itertools;

/// Which plan space a node belongs to. Conversion rules lower `Logical`
/// nodes into `Physical` ones; distributed transforms only see `Physical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    Logical,
    Physical,
}

/// How a node's output rows are spread across partitions.
///
/// A node may only claim a distribution it can prove from its children or
/// from an attached exchange; any change in distribution goes through an
/// explicit Exchange node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Distribution {
    /// All rows on a single site.
    Singleton,
    /// Hash partitioned on the given column ordinals.
    Hash(Vec<usize>),
    /// Not constrained yet.
    Any,
}

impl Distribution {
    pub fn is_singleton(&self) -> bool {
        matches!(self, Distribution::Singleton)
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Distribution::Singleton => write!(f, "singleton"),
            Distribution::Hash(keys) => write!(f, "hash[{}]", keys.iter().join(", ")),
            Distribution::Any => write!(f, "any"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn reverse(&self) -> Direction {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Ascending => write!(f, "asc"),
            Direction::Descending => write!(f, "desc"),
        }
    }
}

/// One sort key: output column ordinal plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollationField {
    pub ordinal: usize,
    pub direction: Direction,
}

impl CollationField {
    pub fn asc(ordinal: usize) -> Self {
        Self {
            ordinal,
            direction: Direction::Ascending,
        }
    }

    pub fn desc(ordinal: usize) -> Self {
        Self {
            ordinal,
            direction: Direction::Descending,
        }
    }
}

/// A provided or required ordering: ordered list of (column, direction).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Collation {
    pub fields: Vec<CollationField>,
}

impl Collation {
    pub fn new(fields: Vec<CollationField>) -> Self {
        Self { fields }
    }

    /// Ascending on the given ordinals, in ordinal order. This is the
    /// collation a serial aggregate requires of its input.
    pub fn ascending_on(ordinals: impl IntoIterator<Item = usize>) -> Self {
        let mut ords = ordinals.into_iter().collect::<Vec<_>>();
        ords.sort_unstable();
        Self::new(ords.into_iter().map(CollationField::asc).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when `self` provides at least the ordering `required` asks for
    /// (field-for-field prefix match, directions included).
    pub fn satisfies(&self, required: &Collation) -> bool {
        required.fields.len() <= self.fields.len()
            && self
                .fields
                .iter()
                .zip(required.fields.iter())
                .all(|(have, want)| have == want)
    }
}

impl fmt::Display for Collation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}]",
            self.fields
                .iter()
                .map(|c| format!("#{} {}", c.ordinal, c.direction))
                .join(", ")
        )
    }
}

/// The physical property bundle every node carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitSet {
    pub convention: Convention,
    pub distribution: Distribution,
    pub collation: Collation,
}

impl TraitSet {
    pub fn logical() -> Self {
        Self {
            convention: Convention::Logical,
            distribution: Distribution::Any,
            collation: Collation::default(),
        }
    }

}
