//! Authenticated actors and admin territory.

use lgu_common::{ActorId, AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Platform role carried by the identity token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    #[default]
    Resident,
    Admin,
    MunicipalAdmin,
}

/// Identity verification tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationTier {
    #[default]
    Unverified,
    Verified,
    FullyVerified,
}

/// The caller of an operation, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    pub role: ActorRole,
    pub verification: VerificationTier,
    /// Home municipality.
    pub municipality_id: Option<i32>,
    pub barangay_id: Option<i32>,
    /// Territory assigned to a municipal admin.
    pub admin_municipality_id: Option<i32>,
}

impl Actor {
    /// A fully verified resident of `municipality_id`.
    #[must_use]
    pub const fn resident(id: i32, municipality_id: i32) -> Self {
        Self {
            id: ActorId::new(id),
            role: ActorRole::Resident,
            verification: VerificationTier::FullyVerified,
            municipality_id: Some(municipality_id),
            barangay_id: None,
            admin_municipality_id: None,
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, ActorRole::Admin | ActorRole::MunicipalAdmin)
    }

    /// Marketplace participation needs a fully verified identity.
    pub fn require_fully_verified(&self) -> AppResult<()> {
        if self.verification == VerificationTier::FullyVerified {
            Ok(())
        } else {
            Err(AppError::VerificationRequired(
                "Complete identity verification to use the marketplace".to_string(),
            ))
        }
    }

    /// Resolve the territory this actor may administer.
    pub fn admin_scope(&self) -> AppResult<AdminScope> {
        match self.role {
            ActorRole::Admin => Ok(AdminScope::Province),
            ActorRole::MunicipalAdmin => self
                .admin_municipality_id
                .map(AdminScope::Municipality)
                .ok_or_else(|| {
                    AppError::Forbidden("No municipality assigned to this admin".to_string())
                }),
            ActorRole::Resident => Err(AppError::Forbidden("Admin access required".to_string())),
        }
    }
}

/// Territory an admin may act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminScope {
    /// Every municipality.
    Province,
    /// A single municipality.
    Municipality(i32),
}

impl AdminScope {
    /// Whether records located in `municipality_id` fall inside the scope.
    #[must_use]
    pub const fn covers(self, municipality_id: i32) -> bool {
        match self {
            Self::Province => true,
            Self::Municipality(id) => id == municipality_id,
        }
    }

    /// Municipality filter for list queries.
    #[must_use]
    pub const fn municipality_filter(self) -> Option<i32> {
        match self {
            Self::Province => None,
            Self::Municipality(id) => Some(id),
        }
    }

    /// Fail with `Forbidden` when `municipality_id` is outside the scope.
    pub fn ensure_covers(self, municipality_id: i32) -> AppResult<()> {
        if self.covers(municipality_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Record is outside your municipality".to_string(),
            ))
        }
    }
}
