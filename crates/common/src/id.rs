//! Identifier types shared across crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AppError;

/// Identifier of an authenticated actor.
///
/// Parsed once at the request boundary; everything past the auth
/// middleware compares actors through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(i32);

impl ActorId {
    /// Wrap a raw user id.
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// The raw id as stored in the database.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for ActorId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ActorId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i32>()
            .ok()
            .filter(|id| *id > 0)
            .map(Self)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid actor id: {s}")))
    }
}
