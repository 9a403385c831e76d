//! Identifier newtypes shared between the schema catalog and query engines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Engine-level identifier of a resolved column within a table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct ColumnId(pub u32);

/// Stable key of a row inside its table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct ObjKey(pub u64);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ObjKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ColumnId {
    fn from(value: u32) -> Self {
        ColumnId(value)
    }
}

impl From<ColumnId> for u32 {
    fn from(value: ColumnId) -> Self {
        value.0
    }
}

impl From<u64> for ObjKey {
    fn from(value: u64) -> Self {
        ObjKey(value)
    }
}

impl From<ObjKey> for u64 {
    fn from(value: ObjKey) -> Self {
        value.0
    }
}
