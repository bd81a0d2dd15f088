//! Core CV deduplication and ownership resolution for the recruitment back
//! office.
//!
//! Creation workflows (admin and collaborator) store a CV, then run the
//! matcher and resolver from this crate before the CV counts as settled.

pub mod clock;
pub mod db;
pub mod dedup;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dedup::matcher::find_origin;
pub use dedup::predicate::{IdentityPredicate, MatchPair};
pub use dedup::resolver::{
    decide, is_release_eligible, release_cutoff, resolve, DedupError, DedupPolicy, Disposition,
    ResolutionResult, CANDIDATE_DUPLICATE_MESSAGE, ORIGIN_RELEASED_MESSAGE,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::cv::{
    AdminId, CandidateIdentity, CollaboratorId, CvId, CvRecord, CvStatus, CvValidationError,
    DedupState,
};
pub use repo::cv_repo::{CvRepository, RepoError, RepoResult, SqliteCvRepository};
pub use service::dedup_service::{DedupService, Settlement};
pub use service::intake_service::{
    CvEdit, CvIntakeService, IntakeError, IntakeOutcome, IntakeResult, NewCvRequest, Submitter,
};
