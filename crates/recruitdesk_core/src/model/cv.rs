//! CV domain model.
//!
//! # Responsibility
//! - Define the canonical candidate résumé record used by dedup and intake.
//! - Provide lifecycle helpers for soft-delete, duplicate and ownership state.
//!
//! # Invariants
//! - `id` is stable and never reused for another CV.
//! - `is_duplicate == true` iff `duplicate_with_id` is set.
//! - `duplicate_with_id` never points at the record itself.
//! - Identity fields are stored trimmed; blank values are stored as `None`.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a CV record.
pub type CvId = Uuid;
/// Reference to the collaborator (external recruiter) owning a CV.
pub type CollaboratorId = Uuid;
/// Reference to the back-office admin owning a CV.
pub type AdminId = Uuid;

static CV_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]{0,31}$").expect("valid cv code regex"));

/// Publication state of a CV.
///
/// Persisted as integers `0..=2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvStatus {
    Draft,
    Active,
    Archived,
}

impl CvStatus {
    /// Integer representation used by storage.
    pub fn as_db(self) -> i64 {
        match self {
            Self::Draft => 0,
            Self::Active => 1,
            Self::Archived => 2,
        }
    }

    /// Parses the storage representation.
    pub fn from_db(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Draft),
            1 => Some(Self::Active),
            2 => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Partial identity of a submitted candidate. Not persisted on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl CandidateIdentity {
    pub fn new(
        name: Option<impl Into<String>>,
        email: Option<impl Into<String>>,
        phone: Option<impl Into<String>>,
    ) -> Self {
        Self {
            name: name.map(Into::into),
            email: email.map(Into::into),
            phone: phone.map(Into::into),
        }
    }

    pub fn trimmed_name(&self) -> Option<&str> {
        trimmed(self.name.as_deref())
    }

    pub fn trimmed_email(&self) -> Option<&str> {
        trimmed(self.email.as_deref())
    }

    pub fn trimmed_phone(&self) -> Option<&str> {
        trimmed(self.phone.as_deref())
    }

    /// Number of non-blank fields among name, email and phone.
    pub fn present_field_count(&self) -> usize {
        [self.trimmed_name(), self.trimmed_email(), self.trimmed_phone()]
            .iter()
            .filter(|field| field.is_some())
            .count()
    }

    /// Returns a copy with every field trimmed and blanks collapsed to `None`.
    pub fn normalized(&self) -> Self {
        Self {
            name: self.trimmed_name().map(str::to_string),
            email: self.trimmed_email().map(str::to_string),
            phone: self.trimmed_phone().map(str::to_string),
        }
    }
}

/// Position of a CV in the duplicate dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupState {
    /// Unique and claimed by at least one owner.
    UniqueOwned,
    /// Unique and released; any owner may claim it.
    UniqueUnowned,
    /// Blocked duplicate of the referenced origin record.
    Duplicate(CvId),
}

/// Validation failures for `CvRecord`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CvValidationError {
    NilId,
    InvalidCode(String),
    DuplicateWithoutOrigin,
    OriginWithoutDuplicateFlag(CvId),
    SelfReference(CvId),
    UpdatedBeforeCreated {
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
}

impl Display for CvValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "cv id must not be nil"),
            Self::InvalidCode(code) => write!(f, "invalid cv code `{code}`"),
            Self::DuplicateWithoutOrigin => {
                write!(f, "is_duplicate is set but duplicate_with_id is missing")
            }
            Self::OriginWithoutDuplicateFlag(origin) => write!(
                f,
                "duplicate_with_id ({origin}) is set but is_duplicate is false"
            ),
            Self::SelfReference(id) => write!(f, "cv {id} cannot be a duplicate of itself"),
            Self::UpdatedBeforeCreated {
                created_at,
                updated_at,
            } => write!(
                f,
                "updated_at ({updated_at}) must be >= created_at ({created_at})"
            ),
        }
    }
}

impl Error for CvValidationError {}

/// Persisted candidate résumé record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCvRecord")]
pub struct CvRecord {
    pub id: CvId,
    /// Human-readable unique code, e.g. `CV000042`.
    pub code: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: CvStatus,
    pub collaborator_owner_id: Option<CollaboratorId>,
    pub admin_owner_id: Option<AdminId>,
    pub is_duplicate: bool,
    pub duplicate_with_id: Option<CvId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete tombstone. Deleted CVs never take part in matching.
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawCvRecord {
    id: CvId,
    code: String,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    status: CvStatus,
    collaborator_owner_id: Option<CollaboratorId>,
    admin_owner_id: Option<AdminId>,
    is_duplicate: bool,
    duplicate_with_id: Option<CvId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<RawCvRecord> for CvRecord {
    type Error = CvValidationError;

    fn try_from(raw: RawCvRecord) -> Result<Self, Self::Error> {
        let record = Self {
            id: raw.id,
            code: raw.code,
            name: raw.name,
            email: raw.email,
            phone: raw.phone,
            status: raw.status,
            collaborator_owner_id: raw.collaborator_owner_id,
            admin_owner_id: raw.admin_owner_id,
            is_duplicate: raw.is_duplicate,
            duplicate_with_id: raw.duplicate_with_id,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            deleted_at: raw.deleted_at,
        };
        record.validate()?;
        Ok(record)
    }
}

impl CvRecord {
    /// Creates a new draft CV with a generated id.
    ///
    /// # Invariants
    /// - Starts unique, unowned and not deleted.
    /// - Identity fields are normalized (trimmed, blanks dropped).
    pub fn new(code: impl Into<String>, identity: &CandidateIdentity, now: DateTime<Utc>) -> Self {
        Self::with_id(Uuid::new_v4(), code, identity, now)
    }

    /// Creates a new CV with a caller-provided id.
    ///
    /// Used by import paths where identity already exists externally.
    /// Does not validate; call `validate()` before persisting.
    pub fn with_id(
        id: CvId,
        code: impl Into<String>,
        identity: &CandidateIdentity,
        now: DateTime<Utc>,
    ) -> Self {
        let identity = identity.normalized();
        Self {
            id,
            code: code.into(),
            name: identity.name,
            email: identity.email,
            phone: identity.phone,
            status: CvStatus::Draft,
            collaborator_owner_id: None,
            admin_owner_id: None,
            is_duplicate: false,
            duplicate_with_id: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Validates the record invariants.
    pub fn validate(&self) -> Result<(), CvValidationError> {
        if self.id.is_nil() {
            return Err(CvValidationError::NilId);
        }
        if !is_valid_cv_code(&self.code) {
            return Err(CvValidationError::InvalidCode(self.code.clone()));
        }
        match (self.is_duplicate, self.duplicate_with_id) {
            (true, None) => return Err(CvValidationError::DuplicateWithoutOrigin),
            (false, Some(origin)) => {
                return Err(CvValidationError::OriginWithoutDuplicateFlag(origin))
            }
            (_, Some(origin)) if origin == self.id => {
                return Err(CvValidationError::SelfReference(self.id))
            }
            _ => {}
        }
        if self.updated_at < self.created_at {
            return Err(CvValidationError::UpdatedBeforeCreated {
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }

    /// Identity fields of this record, as stored.
    pub fn identity(&self) -> CandidateIdentity {
        CandidateIdentity {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }

    /// Trims identity fields in place; blank values become `None`.
    pub fn normalize_identity(&mut self) {
        let identity = self.identity().normalized();
        self.name = identity.name;
        self.email = identity.email;
        self.phone = identity.phone;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True when neither a collaborator nor an admin holds this CV.
    pub fn is_ownerless(&self) -> bool {
        self.collaborator_owner_id.is_none() && self.admin_owner_id.is_none()
    }

    pub fn dedup_state(&self) -> DedupState {
        match self.duplicate_with_id {
            Some(origin) if self.is_duplicate => DedupState::Duplicate(origin),
            _ if self.is_ownerless() => DedupState::UniqueUnowned,
            _ => DedupState::UniqueOwned,
        }
    }

    /// Marks this CV as softly deleted (tombstoned).
    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(now);
            self.touch(now);
        }
    }

    /// Flags this CV as a blocked duplicate of `origin_id`.
    pub fn mark_duplicate_of(&mut self, origin_id: CvId, now: DateTime<Utc>) {
        self.is_duplicate = true;
        self.duplicate_with_id = Some(origin_id);
        self.touch(now);
    }

    /// Clears the duplicate flag and its origin reference.
    pub fn mark_unique(&mut self, now: DateTime<Utc>) {
        self.is_duplicate = false;
        self.duplicate_with_id = None;
        self.touch(now);
    }

    /// Drops both ownership claims.
    pub fn release_owners(&mut self, now: DateTime<Utc>) {
        self.collaborator_owner_id = None;
        self.admin_owner_id = None;
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Returns whether `code` is an acceptable human-readable CV code.
pub fn is_valid_cv_code(code: &str) -> bool {
    CV_CODE_RE.is_match(code)
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
