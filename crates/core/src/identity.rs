//! Identity + timestamps shared by every entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainResult, ValidationError};

/// Identity and audit timestamps of an entity.
///
/// Invariants:
/// - `id` is assigned once and never changes
/// - `updated_at >= created_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity<I> {
    id: I,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<I: Copy> Identity<I> {
    /// Fresh identity created at `now`.
    pub fn new(id: I, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild an identity loaded from storage.
    pub fn restore(
        id: I,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if updated_at < created_at {
            return Err(ValidationError::TimestampsOutOfOrder.into());
        }
        Ok(Self {
            id,
            created_at,
            updated_at,
        })
    }

    pub fn id(&self) -> I {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Record a mutation at `now`.
    ///
    /// A clock that reads earlier than `created_at` is clamped so the ordering
    /// invariant survives clock skew.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }
}
