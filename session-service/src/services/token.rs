//! Version tokens: the opaque value a caller must echo back to mutate a record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 128-bit random token identifying one revision of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(Uuid);

impl VersionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for VersionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for VersionToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Source of fresh version tokens.
pub trait TokenAllocator: Send + Sync {
    fn allocate(&self) -> VersionToken;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokenAllocator;

impl TokenAllocator for RandomTokenAllocator {
    fn allocate(&self) -> VersionToken {
        VersionToken::new()
    }
}
