//! CV intake workflow.
//!
//! # Responsibility
//! - Single creation entry point for admin and collaborator submissions.
//! - Store the CV, then settle it through dedup, atomically.
//! - Enforce the duplicate hard block for downstream job applications.
//!
//! # Invariants
//! - Create + match + resolve run inside one `BEGIN IMMEDIATE` transaction,
//!   so two submissions of the same person are serialized and the later one
//!   always sees the earlier one.
//! - A CV with `is_duplicate == true` is never cleared for an application.
//! - Explicit edits never touch ownership or duplicate fields.
//! - A CV referenced by live duplicates cannot be deleted.

use crate::clock::Clock;
use crate::dedup::resolver::{DedupError, DedupPolicy, ResolutionResult};
use crate::model::cv::{AdminId, CandidateIdentity, CollaboratorId, CvId, CvRecord, CvStatus};
use crate::repo::cv_repo::{CvRepository, RepoError, SqliteCvRepository};
use crate::service::dedup_service::DedupService;
use log::{error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type IntakeResult<T> = Result<T, IntakeError>;

/// Who is submitting a CV. The submitter becomes its initial owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitter {
    Admin(AdminId),
    Collaborator(CollaboratorId),
}

impl Submitter {
    fn kind(self) -> &'static str {
        match self {
            Self::Admin(_) => "admin",
            Self::Collaborator(_) => "collaborator",
        }
    }

    fn assign_owner(self, cv: &mut CvRecord) {
        match self {
            Self::Admin(id) => cv.admin_owner_id = Some(id),
            Self::Collaborator(id) => cv.collaborator_owner_id = Some(id),
        }
    }
}

/// Request model for a new CV submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCvRequest {
    pub identity: CandidateIdentity,
    pub status: CvStatus,
    /// Explicit code for imports; generated when `None`.
    pub code: Option<String>,
}

impl NewCvRequest {
    pub fn new(identity: CandidateIdentity) -> Self {
        Self {
            identity,
            status: CvStatus::Draft,
            code: None,
        }
    }
}

/// Explicit edit of an existing CV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvEdit {
    pub identity: CandidateIdentity,
    pub status: CvStatus,
}

/// What a submission produced, for user-facing reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeOutcome {
    /// The stored CV after settlement.
    pub cv: CvRecord,
    /// Matched origin after settlement, if any.
    pub origin: Option<CvRecord>,
    pub resolution: Option<ResolutionResult>,
}

impl IntakeOutcome {
    /// True when the new CV may not be used for job applications.
    pub fn is_blocked(&self) -> bool {
        self.resolution
            .as_ref()
            .is_some_and(|resolution| resolution.is_duplicate)
    }

    pub fn origin_released(&self) -> bool {
        self.resolution
            .as_ref()
            .is_some_and(|resolution| resolution.origin_released)
    }

    pub fn message(&self) -> Option<&str> {
        self.resolution
            .as_ref()
            .map(|resolution| resolution.message.as_str())
    }
}

/// Errors from intake use-cases.
#[derive(Debug)]
pub enum IntakeError {
    /// Target CV does not exist or is soft-deleted.
    NotFound(CvId),
    /// CV is a duplicate and cannot back a job application.
    DuplicateBlocked { cv_id: CvId, origin_id: CvId },
    /// CV is the origin of live duplicates and cannot be deleted.
    ReferencedByDuplicates { cv_id: CvId, duplicates: usize },
    /// Dedup rule violation (self match, deleted origin).
    Dedup(DedupError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for IntakeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "cv not found: {id}"),
            Self::DuplicateBlocked { cv_id, origin_id } => write!(
                f,
                "cv {cv_id} is a duplicate of {origin_id} and cannot be used for applications"
            ),
            Self::ReferencedByDuplicates { cv_id, duplicates } => write!(
                f,
                "cv {cv_id} is the origin of {duplicates} duplicate(s) and cannot be deleted"
            ),
            Self::Dedup(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IntakeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Dedup(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for IntakeError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<DedupError> for IntakeError {
    fn from(value: DedupError) -> Self {
        match value {
            DedupError::Repo(err) => err.into(),
            other => Self::Dedup(other),
        }
    }
}

impl From<rusqlite::Error> for IntakeError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// SQLite-backed intake workflow shared by admin and collaborator callers.
pub struct CvIntakeService<'conn, C: Clock> {
    conn: &'conn mut Connection,
    clock: C,
    policy: DedupPolicy,
}

impl<'conn, C: Clock> CvIntakeService<'conn, C> {
    /// Creates a service with the default 6-month aging policy.
    pub fn new(conn: &'conn mut Connection, clock: C) -> Self {
        Self::with_policy(conn, clock, DedupPolicy::default())
    }

    pub fn with_policy(conn: &'conn mut Connection, clock: C, policy: DedupPolicy) -> Self {
        Self {
            conn,
            clock,
            policy,
        }
    }

    /// Stores a new CV and settles it against existing CVs.
    ///
    /// # Contract
    /// - The submitter becomes the CV's initial owner.
    /// - On any error nothing is persisted.
    /// - The returned resolution must be surfaced to the caller unchanged.
    pub fn submit_cv(
        &mut self,
        request: NewCvRequest,
        submitter: Submitter,
    ) -> IntakeResult<IntakeOutcome> {
        let started_at = Instant::now();
        let result = self.submit_cv_in_tx(request, submitter);

        match &result {
            Ok(outcome) => info!(
                "event=cv_submit module=intake status=ok submitter={} cv={} code={} blocked={} origin_released={} duration_ms={}",
                submitter.kind(),
                outcome.cv.id,
                outcome.cv.code,
                outcome.is_blocked(),
                outcome.origin_released(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=cv_submit module=intake status=error submitter={} error_code={} duration_ms={} error={}",
                submitter.kind(),
                error_code(err),
                started_at.elapsed().as_millis(),
                err
            ),
        }

        result
    }

    fn submit_cv_in_tx(
        &mut self,
        request: NewCvRequest,
        submitter: Submitter,
    ) -> IntakeResult<IntakeOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Clock is read under the write lock: created_at order matches commit order.
        let now = self.clock.now_millis();

        let outcome = {
            let repo = SqliteCvRepository::try_new(&tx)?;
            let code = match request.code {
                Some(code) => code,
                None => repo.next_cv_code()?,
            };

            let mut cv = CvRecord::new(code, &request.identity, now);
            cv.status = request.status;
            submitter.assign_owner(&mut cv);
            repo.create_cv(&cv)?;

            let dedup = DedupService::with_policy(&repo, &self.clock, self.policy);
            match dedup.settle(&mut cv)? {
                Some(settlement) => IntakeOutcome {
                    cv,
                    origin: Some(settlement.origin),
                    resolution: Some(settlement.resolution),
                },
                None => IntakeOutcome {
                    cv,
                    origin: None,
                    resolution: None,
                },
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    /// Gets one non-deleted CV by id.
    pub fn get_cv(&self, id: CvId) -> IntakeResult<CvRecord> {
        let repo = SqliteCvRepository::try_new(&*self.conn)?;
        repo.get_cv(id, false)?.ok_or(IntakeError::NotFound(id))
    }

    /// Applies an explicit edit of identity fields and status.
    ///
    /// Does not re-run dedup; ownership and duplicate fields are preserved.
    pub fn update_cv(&self, id: CvId, edit: &CvEdit) -> IntakeResult<CvRecord> {
        let repo = SqliteCvRepository::try_new(&*self.conn)?;
        let mut cv = repo.get_cv(id, false)?.ok_or(IntakeError::NotFound(id))?;

        let identity = edit.identity.normalized();
        cv.name = identity.name;
        cv.email = identity.email;
        cv.phone = identity.phone;
        cv.status = edit.status;
        cv.updated_at = cv.updated_at.max(self.clock.now_millis());
        repo.save_cv(&cv)?;

        Ok(cv)
    }

    /// Soft-deletes a CV; it stops taking part in matching.
    ///
    /// # Errors
    /// - `NotFound` when no CV has this id.
    /// - `ReferencedByDuplicates` while non-deleted duplicates point at it.
    pub fn delete_cv(&mut self, id: CvId) -> IntakeResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        {
            let repo = SqliteCvRepository::try_new(&tx)?;
            let duplicates = repo.list_duplicates_of(id)?;
            if !duplicates.is_empty() {
                warn!(
                    "event=cv_delete module=intake status=blocked cv={} duplicates={}",
                    id,
                    duplicates.len()
                );
                return Err(IntakeError::ReferencedByDuplicates {
                    cv_id: id,
                    duplicates: duplicates.len(),
                });
            }
            repo.soft_delete_cv(id, self.clock.now_millis())?;
        }

        tx.commit()?;
        info!("event=cv_delete module=intake status=ok cv={}", id);
        Ok(())
    }

    /// Returns the CV when it may back a new job application.
    ///
    /// # Errors
    /// - `NotFound` for missing or soft-deleted CVs.
    /// - `DuplicateBlocked` for CVs flagged as duplicates.
    pub fn ensure_application_allowed(&self, id: CvId) -> IntakeResult<CvRecord> {
        let cv = self.get_cv(id)?;
        if let Some(origin_id) = cv.duplicate_with_id.filter(|_| cv.is_duplicate) {
            warn!(
                "event=cv_application_check module=intake status=blocked cv={} origin={}",
                cv.id, origin_id
            );
            return Err(IntakeError::DuplicateBlocked {
                cv_id: cv.id,
                origin_id,
            });
        }
        Ok(cv)
    }
}

fn error_code(err: &IntakeError) -> &'static str {
    match err {
        IntakeError::NotFound(_) => "cv_not_found",
        IntakeError::DuplicateBlocked { .. } => "cv_duplicate_blocked",
        IntakeError::ReferencedByDuplicates { .. } => "cv_delete_referenced",
        IntakeError::Dedup(_) => "cv_dedup_rejected",
        IntakeError::Repo(RepoError::Db(db)) if db.is_busy() => "db_busy",
        IntakeError::Repo(RepoError::DuplicateCode(_)) => "cv_code_conflict",
        IntakeError::Repo(_) => "db_error",
    }
}
