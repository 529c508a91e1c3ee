//! # capmask-types: Core types for `capmask`
//!
//! This crate contains shared types used across the `capmask` engine:
//! - Catalog positions ([`SubjectIndex`], [`ActionBit`])
//! - Packed action sets ([`ActionMask`])
//! - Entity IDs ([`PermissionId`], [`RoleId`], [`RoleBindingId`], [`IdentityId`])
//! - Temporal types ([`Timestamp`])

use std::{
    fmt::{Debug, Display},
    ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Width of an [`ActionMask`] in bits.
///
/// The action catalog may never hold more actions than this.
pub const MASK_WIDTH: u32 = u64::BITS;

// ============================================================================
// Catalog Positions - All Copy
// ============================================================================

/// Stable index of a subject in the permission catalog.
///
/// Used as a sparse-map key inside token payloads, never as a bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectIndex(u32);

impl SubjectIndex {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the index as a `usize` for slice addressing.
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl Display for SubjectIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SubjectIndex {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<SubjectIndex> for u32 {
    fn from(index: SubjectIndex) -> Self {
        index.0
    }
}

/// Bit position of an action in the permission catalog.
///
/// Always `< MASK_WIDTH`; the catalog refuses to hand out anything larger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionBit(u8);

impl ActionBit {
    pub fn new(bit: u8) -> Self {
        debug_assert!(u32::from(bit) < MASK_WIDTH, "action bit out of range");
        Self(bit)
    }

    pub fn position(&self) -> u8 {
        self.0
    }
}

impl Display for ActionBit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ActionBit> for u8 {
    fn from(bit: ActionBit) -> Self {
        bit.0
    }
}

// ============================================================================
// ActionMask - Copy (8-byte packed action set)
// ============================================================================

/// A set of actions packed one bit per action.
///
/// Bit `n` is set when the action at catalog position `n` is granted.
/// Serializes as a plain unsigned integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ActionMask(u64);

impl ActionMask {
    /// The empty set.
    pub const EMPTY: ActionMask = ActionMask(0);

    pub fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Mask with only `bit` set.
    pub fn from_bit(bit: ActionBit) -> Self {
        Self(1u64 << bit.0)
    }

    /// Mask with the lowest `count` bits set.
    ///
    /// # Examples
    ///
    /// ```
    /// # use capmask_types::ActionMask;
    /// assert_eq!(ActionMask::low_bits(4).bits(), 0b1111);
    /// assert_eq!(ActionMask::low_bits(64).bits(), u64::MAX);
    /// ```
    pub fn low_bits(count: u32) -> Self {
        if count >= u64::BITS {
            Self(u64::MAX)
        } else {
            Self((1u64 << count) - 1)
        }
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains_bit(&self, bit: ActionBit) -> bool {
        self.0 & (1u64 << bit.0) != 0
    }

    /// Returns whether every bit of `self` is also set in `other`.
    pub fn is_subset_of(&self, other: ActionMask) -> bool {
        self.0 & !other.0 == 0
    }

    #[must_use]
    pub fn union(self, other: ActionMask) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub fn intersection(self, other: ActionMask) -> Self {
        Self(self.0 & other.0)
    }

    /// Number of actions in the set.
    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }
}

impl Display for ActionMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}

impl From<u64> for ActionMask {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ActionMask> for u64 {
    fn from(mask: ActionMask) -> Self {
        mask.0
    }
}

impl BitOr for ActionMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl BitOrAssign for ActionMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ActionMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.intersection(rhs)
    }
}

impl BitAndAssign for ActionMask {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for ActionMask {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

// ============================================================================
// Entity IDs - All Copy (cheap 8-byte values)
// ============================================================================

/// Unique identifier for a stored permission row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionId(u64);

/// Unique identifier for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleId(u64);

/// Unique identifier for a role binding (role ↔ permission association).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleBindingId(u64);

/// Unique identifier for an authenticated principal (user or service account).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityId(u64);

macro_rules! entity_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(PermissionId);
entity_id!(RoleId);
entity_id!(RoleBindingId);
entity_id!(IdentityId);

// ============================================================================
// Timestamp - Copy (8-byte value with monotonic guarantee)
// ============================================================================

/// Wall-clock timestamp with monotonic guarantee within the process.
///
/// Stored as nanoseconds since Unix epoch (1970-01-01 00:00:00 UTC).
/// The catalog resync sweep compares `updated_at` values against the start
/// of a pass, so successive stamps must never go backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The Unix epoch (1970-01-01 00:00:00 UTC).
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Creates a timestamp from nanoseconds since Unix epoch.
    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns the timestamp as nanoseconds since Unix epoch.
    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Returns the timestamp as seconds since Unix epoch (truncates nanoseconds).
    pub fn as_secs(&self) -> u64 {
        self.0 / 1_000_000_000
    }

    /// Creates a timestamp for the current time.
    ///
    /// A clock set before the Unix epoch reads as [`Timestamp::EPOCH`].
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        Self(nanos)
    }

    /// Creates a timestamp ensuring monotonicity: `max(now, last + 1ns)`.
    ///
    /// # Arguments
    ///
    /// * `last` - The previous timestamp, if any. Pass `None` for the first timestamp.
    pub fn now_monotonic(last: Option<Timestamp>) -> Self {
        let now = Self::now();
        match last {
            Some(prev) if now.0 <= prev.0 => Timestamp(prev.0.saturating_add(1)),
            _ => now,
        }
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secs = self.0 / 1_000_000_000;
        let nanos = self.0 % 1_000_000_000;
        write!(f, "{secs}.{nanos:09}")
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl From<u64> for Timestamp {
    fn from(nanos: u64) -> Self {
        Self(nanos)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(0, 0; "empty")]
    #[test_case(1, 0b1; "single")]
    #[test_case(4, 0b1111; "four actions")]
    #[test_case(63, u64::MAX >> 1; "one short of full")]
    #[test_case(64, u64::MAX; "full width")]
    fn low_bits_sets_exactly_count_bits(count: u32, expected: u64) {
        assert_eq!(ActionMask::low_bits(count).bits(), expected);
    }

    #[test]
    fn subset_relation() {
        let parent = ActionMask::new(0b0111);
        assert!(ActionMask::new(0b0101).is_subset_of(parent));
        assert!(ActionMask::EMPTY.is_subset_of(parent));
        assert!(!ActionMask::new(0b1000).is_subset_of(parent));
    }

    #[test]
    fn single_bit_mask() {
        let bit = ActionBit::new(3);
        let mask = ActionMask::from_bit(bit);
        assert_eq!(mask.bits(), 0b1000);
        assert!(mask.contains_bit(bit));
        assert!(!mask.contains_bit(ActionBit::new(2)));
        assert_eq!(mask.count(), 1);
    }

    #[test]
    fn masks_serialize_as_plain_integers() {
        let json = serde_json::to_string(&ActionMask::new(5)).unwrap();
        assert_eq!(json, "5");

        let index: SubjectIndex = serde_json::from_str("7").unwrap();
        assert_eq!(index, SubjectIndex::new(7));
    }

    #[test]
    fn timestamp_monotonic_never_regresses() {
        let future = Timestamp::from_nanos(u64::MAX - 10);
        let next = Timestamp::now_monotonic(Some(future));
        assert!(next > future);
    }

    proptest! {
        #[test]
        fn intersection_is_subset_of_both(a: u64, b: u64) {
            let (a, b) = (ActionMask::new(a), ActionMask::new(b));
            let both = a & b;
            prop_assert!(both.is_subset_of(a));
            prop_assert!(both.is_subset_of(b));
        }

        #[test]
        fn union_count_bounds(a: u64, b: u64) {
            let (a, b) = (ActionMask::new(a), ActionMask::new(b));
            let either = a | b;
            prop_assert!(either.count() >= a.count().max(b.count()));
            prop_assert!(either.count() <= a.count() + b.count());
        }
    }
}
