// SPDX-License-Identifier: Apache-2.0
//! Target references and their 32-bit storage encoding.
//!
//! A target names the destination of one outgoing edge. The public API is
//! the [`Target`] sum type; the packed 32-bit word form exists only at
//! storage boundaries (node records inside a bundle image).
//!
//! Word encoding, all values little-endian on disk:
//! - `0xFFFF_FFFF` marks an unknown target set.
//! - `0xFFFF_FFFE` marks an unused target slot.
//! - A value below `2^31` is a direct node index.
//! - A value with the top bit set is an index into the active auxiliary
//!   array (target-hash arena before compaction, extra-edge table after),
//!   stored in the low 31 bits.

/// Packed word marking an unknown target set.
pub const UNKNOWN_WORD: u32 = 0xFFFF_FFFF;

/// Packed word marking an unused target slot.
pub const ABSENT_WORD: u32 = 0xFFFF_FFFE;

/// Exclusive upper bound on node and auxiliary-array indices (`2^31`).
pub const INDEX_LIMIT: u32 = 1 << 31;

const INDIRECT_FLAG: u32 = 1 << 31;

/// Reference to one outgoing edge's destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The target set of the owning node is not yet known to the graph.
    Unknown,
    /// This target slot is unused.
    Absent,
    /// Index of a node within the same bundle.
    Direct(u32),
    /// Position within the bundle's active auxiliary array.
    Indirect(u32),
}

impl Target {
    /// Builds a direct node-index target.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in 31 bits.
    #[must_use]
    pub fn direct(index: u32) -> Self {
        assert!(index < INDEX_LIMIT, "direct target index out of range");
        Self::Direct(index)
    }

    /// Builds an indirect auxiliary-array target.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in 31 bits.
    #[must_use]
    pub fn indirect(index: u32) -> Self {
        assert!(index < INDEX_LIMIT, "indirect target index out of range");
        Self::Indirect(index)
    }

    /// Returns `true` for a direct node-index target.
    #[must_use]
    pub fn is_direct(self) -> bool {
        matches!(self, Self::Direct(_))
    }

    /// Returns `true` for an indirect auxiliary-array target.
    #[must_use]
    pub fn is_indirect(self) -> bool {
        matches!(self, Self::Indirect(_))
    }

    /// Returns `true` for the unknown marker.
    #[must_use]
    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns `true` for the unused-slot marker.
    #[must_use]
    pub fn is_absent(self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns the node index of a direct target.
    #[must_use]
    pub fn direct_index(self) -> Option<u32> {
        match self {
            Self::Direct(index) => Some(index),
            _ => None,
        }
    }

    /// Returns the auxiliary-array position of an indirect target.
    #[must_use]
    pub fn indirect_index(self) -> Option<u32> {
        match self {
            Self::Indirect(index) => Some(index),
            _ => None,
        }
    }

    /// Packs this target into its 32-bit storage word.
    #[must_use]
    pub fn to_word(self) -> u32 {
        match self {
            Self::Unknown => UNKNOWN_WORD,
            Self::Absent => ABSENT_WORD,
            Self::Direct(index) => index,
            Self::Indirect(index) => index | INDIRECT_FLAG,
        }
    }

    /// Unpacks a 32-bit storage word.
    ///
    /// Total: sentinels are matched first, then the top bit selects the
    /// indirect form, and everything else is a direct index.
    #[must_use]
    pub fn from_word(word: u32) -> Self {
        match word {
            UNKNOWN_WORD => Self::Unknown,
            ABSENT_WORD => Self::Absent,
            _ if word & INDIRECT_FLAG != 0 => Self::Indirect(word & !INDIRECT_FLAG),
            _ => Self::Direct(word),
        }
    }
}

/// The ordered `(first, last)` target pair carried by every node.
///
/// Legal combinations:
/// - both [`Target::Unknown`]: the node's target set is unknown;
/// - both [`Target::Absent`]: the node has no outgoing edges;
/// - `first` direct with `last` direct or absent: one or two inline edges;
/// - both indirect with `first <= last`: `last - first + 1` edges stored in
///   the active auxiliary array at positions `first..=last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Targets {
    /// First target slot.
    pub first: Target,
    /// Second target slot.
    pub last: Target,
}

impl Targets {
    /// Pair marking an unknown target set.
    pub const UNKNOWN: Self = Self {
        first: Target::Unknown,
        last: Target::Unknown,
    };

    /// Pair marking a node with no outgoing edges.
    pub const ABSENT: Self = Self {
        first: Target::Absent,
        last: Target::Absent,
    };

    /// Builds an indirect range over `first..=last`.
    ///
    /// # Panics
    ///
    /// Panics if `first > last` or either bound does not fit in 31 bits.
    #[must_use]
    pub fn indirect(first: u32, last: u32) -> Self {
        assert!(first <= last, "indirect target range is inverted");
        Self {
            first: Target::indirect(first),
            last: Target::indirect(last),
        }
    }

    /// Builds a single inline edge.
    #[must_use]
    pub fn one(index: u32) -> Self {
        Self {
            first: Target::direct(index),
            last: Target::Absent,
        }
    }

    /// Builds two inline edges.
    #[must_use]
    pub fn two(first: u32, second: u32) -> Self {
        Self {
            first: Target::direct(first),
            last: Target::direct(second),
        }
    }

    /// Returns `true` if the target set is unknown.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.first.is_unknown()
    }

    /// Returns `true` if the node has no outgoing edges.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.first.is_absent() && self.last.is_absent()
    }

    /// Returns `true` if the targets live in the active auxiliary array.
    #[must_use]
    pub fn is_indirect(&self) -> bool {
        self.first.is_indirect()
    }

    /// Returns the indirect range as `(first, last)` positions.
    #[must_use]
    pub fn indirect_range(&self) -> Option<(u32, u32)> {
        match (self.first, self.last) {
            (Target::Indirect(first), Target::Indirect(last)) => Some((first, last)),
            _ => None,
        }
    }

    /// Number of outgoing edges this pair encodes.
    #[must_use]
    pub fn count(&self) -> u32 {
        match (self.first, self.last) {
            (Target::Unknown, _) | (Target::Absent, _) => 0,
            (Target::Direct(_), Target::Absent) => 1,
            (Target::Direct(_), _) => 2,
            (Target::Indirect(first), Target::Indirect(last)) => last - first + 1,
            // An indirect first with a non-indirect last never leaves the
            // constructors; treat it as the closest legal reading.
            (Target::Indirect(_), _) => 1,
        }
    }
}
