//! Ownership/duplicate resolver.
//!
//! # Responsibility
//! - Decide, from the origin's status and age, whether a new matching CV is
//!   a blocked duplicate or whether the origin releases its owners.
//! - Apply and persist that decision.
//!
//! # Invariants
//! - The decision depends only on `origin.status`, `origin.created_at` and
//!   `now`.
//! - When the candidate is marked duplicate, the origin is never written.
//! - A candidate never becomes a duplicate of itself or of a deleted CV.

use crate::model::cv::{CvId, CvRecord, CvStatus};
use crate::repo::cv_repo::{CvRepository, RepoError};
use chrono::{DateTime, Months, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Message returned when an aged origin gives up its owners.
pub const ORIGIN_RELEASED_MESSAGE: &str = "origin released, candidate usable";
/// Message returned when the candidate is blocked as a duplicate.
pub const CANDIDATE_DUPLICATE_MESSAGE: &str = "candidate marked duplicate";

/// Aging SLA configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupPolicy {
    /// Calendar months an active origin may hold its owners before a newer
    /// matching submission releases them.
    pub release_after_months: u32,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            release_after_months: 6,
        }
    }
}

/// Outcome of one resolver decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Origin loses its owners; candidate stays usable.
    ReleaseOrigin,
    /// Candidate is blocked as a duplicate of the origin.
    MarkDuplicate,
}

/// Result surfaced to creation workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub is_duplicate: bool,
    pub duplicate_with_id: Option<CvId>,
    pub origin_released: bool,
    pub message: String,
}

/// Errors from resolving a candidate against an origin.
#[derive(Debug)]
pub enum DedupError {
    /// Origin and candidate are the same CV.
    SelfMatch(CvId),
    /// Origin is soft-deleted and cannot be referenced.
    OriginDeleted(CvId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for DedupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfMatch(id) => write!(f, "cv {id} cannot be resolved against itself"),
            Self::OriginDeleted(id) => write!(f, "origin cv is deleted: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DedupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DedupError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Instant before which an origin counts as aged.
///
/// Month arithmetic clamps to the end of shorter months.
pub fn release_cutoff(now: DateTime<Utc>, policy: &DedupPolicy) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(policy.release_after_months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// True when `origin` is active and older than the aging SLA.
pub fn is_release_eligible(origin: &CvRecord, now: DateTime<Utc>, policy: &DedupPolicy) -> bool {
    origin.status == CvStatus::Active && origin.created_at < release_cutoff(now, policy)
}

/// Pure decision for a candidate matching `origin` at `now`.
pub fn decide(origin: &CvRecord, now: DateTime<Utc>, policy: &DedupPolicy) -> Disposition {
    if is_release_eligible(origin, now, policy) {
        Disposition::ReleaseOrigin
    } else {
        Disposition::MarkDuplicate
    }
}

/// Applies the disposition to `origin`/`candidate` and persists the changes.
///
/// In-memory records are updated only after the corresponding write
/// succeeds. The origin is written last, so a store failure never leaves it
/// released while the candidate write is missing. Callers needing both
/// writes or neither run this inside a transaction, as
/// `CvIntakeService::submit_cv` does.
pub fn resolve<R: CvRepository + ?Sized>(
    repo: &R,
    origin: &mut CvRecord,
    candidate: &mut CvRecord,
    now: DateTime<Utc>,
    policy: &DedupPolicy,
) -> Result<ResolutionResult, DedupError> {
    if origin.id == candidate.id {
        return Err(DedupError::SelfMatch(origin.id));
    }
    if origin.is_deleted() {
        return Err(DedupError::OriginDeleted(origin.id));
    }

    let result = match decide(origin, now, policy) {
        Disposition::ReleaseOrigin => {
            let mut usable = candidate.clone();
            usable.mark_unique(now);
            repo.save_cv(&usable)?;
            *candidate = usable;

            // Origin goes last: a failed write above leaves its owners intact.
            let mut released = origin.clone();
            released.release_owners(now);
            repo.save_cv(&released)?;
            *origin = released;

            ResolutionResult {
                is_duplicate: false,
                duplicate_with_id: None,
                origin_released: true,
                message: ORIGIN_RELEASED_MESSAGE.to_string(),
            }
        }
        Disposition::MarkDuplicate => {
            let mut duplicate = candidate.clone();
            duplicate.mark_duplicate_of(origin.id, now);
            repo.save_cv(&duplicate)?;
            *candidate = duplicate;

            ResolutionResult {
                is_duplicate: true,
                duplicate_with_id: Some(origin.id),
                origin_released: false,
                message: CANDIDATE_DUPLICATE_MESSAGE.to_string(),
            }
        }
    };

    info!(
        "event=cv_resolve module=dedup status=ok candidate={} origin={} is_duplicate={} origin_released={}",
        candidate.id, origin.id, result.is_duplicate, result.origin_released
    );

    Ok(result)
}
