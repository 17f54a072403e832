//! Record value types and traversal scheduling units.

use crate::error::{TraverseError, TraverseResult};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a genealogy record. Equality is identity; the value
/// itself carries no other meaning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RecordId(pub u32);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RecordId {
    fn from(id: u32) -> Self {
        RecordId(id)
    }
}

bitflags! {
    /// Which neighbor lists of a record the traversal expands.
    ///
    /// Values combine by union, so a single item can walk toward both
    /// advisors and descendants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TraverseDirection: u8 {
        const ADVISORS    = 0b01;
        const DESCENDANTS = 0b10;
    }
}

/// A scheduling unit: one record id plus the directions to expand it
/// in once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraverseItem {
    pub id: RecordId,
    pub direction: TraverseDirection,
}

impl TraverseItem {
    /// Build a traverse item. An empty direction set would schedule a
    /// fetch that expands nothing, so it is rejected here.
    pub fn new(id: RecordId, direction: TraverseDirection) -> TraverseResult<Self> {
        if direction.is_empty() {
            return Err(TraverseError::EmptyDirection(id));
        }
        Ok(Self { id, direction })
    }
}

/// Extracted data for a single genealogy record.
///
/// The traversal engine only looks at `id` and the two neighbor
/// lists; everything else is carried through to the output graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub institution: Option<String>,
    pub year: Option<i32>,
    pub descendants: Vec<RecordId>,
    pub advisors: Vec<RecordId>,
}
