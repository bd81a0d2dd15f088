//! Origin matcher.
//!
//! # Responsibility
//! - Find the earliest-created stored CV that plausibly is the same person as
//!   a submitted candidate identity.
//!
//! # Invariants
//! - Identities with fewer than two non-blank fields never match anything;
//!   this is a normal outcome, not an error.
//! - Soft-deleted CVs and `exclude_id` are never returned.
//! - Among matches the smallest `(created_at, id)` wins, whatever order the
//!   store returned them in.
//! - Never mutates any record.

use crate::dedup::predicate::IdentityPredicate;
use crate::model::cv::{CandidateIdentity, CvId, CvRecord};
use crate::repo::cv_repo::{CvRepository, RepoResult};
use log::debug;

/// Returns the origin CV for `identity`, if any.
///
/// Store failures propagate unchanged.
pub fn find_origin<R: CvRepository + ?Sized>(
    repo: &R,
    identity: &CandidateIdentity,
    exclude_id: Option<CvId>,
) -> RepoResult<Option<CvRecord>> {
    let Some(predicate) = IdentityPredicate::from_identity(identity) else {
        debug!(
            "event=cv_match module=dedup status=skipped reason=insufficient_identity fields={}",
            identity.present_field_count()
        );
        return Ok(None);
    };

    let candidates = repo.query_candidates(&predicate, exclude_id)?;
    let candidate_count = candidates.len();
    let origin = candidates
        .into_iter()
        .filter(|cv| Some(cv.id) != exclude_id && predicate.matches(cv))
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    debug!(
        "event=cv_match module=dedup status=ok candidates={} origin={}",
        candidate_count,
        origin
            .as_ref()
            .map_or_else(|| "none".to_string(), |cv| cv.id.to_string())
    );

    Ok(origin)
}
