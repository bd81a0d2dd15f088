//! Dedup use-case service.
//!
//! # Responsibility
//! - Bind the matcher and resolver to one repository, clock and policy.
//! - Provide the "settle a freshly stored CV" sequence every creation
//!   workflow must run.
//!
//! # Invariants
//! - `now` always comes from the injected clock.
//! - Service layer remains storage-agnostic.

use crate::clock::Clock;
use crate::dedup::matcher;
use crate::dedup::resolver::{self, DedupError, DedupPolicy, ResolutionResult};
use crate::model::cv::{CandidateIdentity, CvId, CvRecord};
use crate::repo::cv_repo::{CvRepository, RepoResult};

/// Origin found for a settled CV together with the applied resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Origin record as it stands after resolution.
    pub origin: CvRecord,
    pub resolution: ResolutionResult,
}

/// Use-case service wrapper for matcher + resolver.
pub struct DedupService<R: CvRepository, C: Clock> {
    repo: R,
    clock: C,
    policy: DedupPolicy,
}

impl<R: CvRepository, C: Clock> DedupService<R, C> {
    /// Creates a service with the default 6-month aging policy.
    pub fn new(repo: R, clock: C) -> Self {
        Self::with_policy(repo, clock, DedupPolicy::default())
    }

    pub fn with_policy(repo: R, clock: C, policy: DedupPolicy) -> Self {
        Self {
            repo,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &DedupPolicy {
        &self.policy
    }

    /// Finds the earliest stored CV matching `identity`.
    pub fn find_origin(
        &self,
        identity: &CandidateIdentity,
        exclude_id: Option<CvId>,
    ) -> RepoResult<Option<CvRecord>> {
        matcher::find_origin(&self.repo, identity, exclude_id)
    }

    /// Resolves `candidate` against `origin` at the clock's current instant.
    pub fn resolve(
        &self,
        origin: &mut CvRecord,
        candidate: &mut CvRecord,
    ) -> Result<ResolutionResult, DedupError> {
        resolver::resolve(
            &self.repo,
            origin,
            candidate,
            self.clock.now_millis(),
            &self.policy,
        )
    }

    /// Runs matcher then resolver for a CV that has just been stored.
    ///
    /// Returns `None` when no origin exists (including when the CV carries
    /// fewer than two identity fields).
    pub fn settle(&self, candidate: &mut CvRecord) -> Result<Option<Settlement>, DedupError> {
        let Some(mut origin) = self.find_origin(&candidate.identity(), Some(candidate.id))? else {
            return Ok(None);
        };
        if origin.id == candidate.id {
            return Ok(None);
        }

        let resolution = self.resolve(&mut origin, candidate)?;
        Ok(Some(Settlement { origin, resolution }))
    }
}
