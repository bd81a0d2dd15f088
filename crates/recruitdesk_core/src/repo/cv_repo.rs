//! CV repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the CV store consumed by the matcher and resolver.
//! - Keep SQL details inside core persistence boundary.
//!
//! # Invariants
//! - Write paths call `CvRecord::validate()` and trim identity fields before
//!   SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - `query_candidates` never returns soft-deleted rows and orders by
//!   `created_at ASC, id ASC`.

use crate::db::DbError;
use crate::dedup::predicate::IdentityPredicate;
use crate::model::cv::{CvId, CvRecord, CvStatus, CvValidationError};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const CV_SELECT_SQL: &str = "SELECT
    id,
    code,
    name,
    email,
    phone,
    status,
    collaborator_owner_id,
    admin_owner_id,
    is_duplicate,
    duplicate_with_id,
    created_at,
    updated_at,
    deleted_at
FROM cvs";

const CV_CODE_PREFIX: &str = "CV";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for CV persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(CvValidationError),
    Db(DbError),
    NotFound(CvId),
    /// Another CV already uses this human-readable code.
    DuplicateCode(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "cv not found: {id}"),
            Self::DuplicateCode(code) => write!(f, "cv code already in use: {code}"),
            Self::InvalidData(message) => write!(f, "invalid persisted cv data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::DuplicateCode(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<CvValidationError> for RepoError {
    fn from(value: CvValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the CV store.
pub trait CvRepository {
    /// Inserts a new CV and returns its id.
    fn create_cv(&self, cv: &CvRecord) -> RepoResult<CvId>;
    /// Updates an existing CV in place.
    fn save_cv(&self, cv: &CvRecord) -> RepoResult<()>;
    /// Gets one CV by id with optional deleted-row visibility.
    fn get_cv(&self, id: CvId, include_deleted: bool) -> RepoResult<Option<CvRecord>>;
    /// Lists non-deleted CVs satisfying `predicate`, oldest first.
    fn query_candidates(
        &self,
        predicate: &IdentityPredicate,
        exclude_id: Option<CvId>,
    ) -> RepoResult<Vec<CvRecord>>;
    /// Lists non-deleted CVs flagged as duplicates of `origin_id`.
    fn list_duplicates_of(&self, origin_id: CvId) -> RepoResult<Vec<CvRecord>>;
    /// Allocates the next human-readable CV code not already in use.
    fn next_cv_code(&self) -> RepoResult<String>;
    /// Soft-deletes a CV by id.
    fn soft_delete_cv(&self, id: CvId, now: DateTime<Utc>) -> RepoResult<()>;
}

impl<R: CvRepository + ?Sized> CvRepository for &R {
    fn create_cv(&self, cv: &CvRecord) -> RepoResult<CvId> {
        (**self).create_cv(cv)
    }

    fn save_cv(&self, cv: &CvRecord) -> RepoResult<()> {
        (**self).save_cv(cv)
    }

    fn get_cv(&self, id: CvId, include_deleted: bool) -> RepoResult<Option<CvRecord>> {
        (**self).get_cv(id, include_deleted)
    }

    fn query_candidates(
        &self,
        predicate: &IdentityPredicate,
        exclude_id: Option<CvId>,
    ) -> RepoResult<Vec<CvRecord>> {
        (**self).query_candidates(predicate, exclude_id)
    }

    fn list_duplicates_of(&self, origin_id: CvId) -> RepoResult<Vec<CvRecord>> {
        (**self).list_duplicates_of(origin_id)
    }

    fn next_cv_code(&self) -> RepoResult<String> {
        (**self).next_cv_code()
    }

    fn soft_delete_cv(&self, id: CvId, now: DateTime<Utc>) -> RepoResult<()> {
        (**self).soft_delete_cv(id, now)
    }
}

/// SQLite-backed CV repository.
///
/// Works on a plain connection or, through deref, on an open transaction.
pub struct SqliteCvRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCvRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_cv_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CvRepository for SqliteCvRepository<'_> {
    fn create_cv(&self, cv: &CvRecord) -> RepoResult<CvId> {
        let mut cv = cv.clone();
        cv.normalize_identity();
        cv.validate()?;

        let result = self.conn.execute(
            "INSERT INTO cvs (
                id,
                code,
                name,
                email,
                phone,
                status,
                collaborator_owner_id,
                admin_owner_id,
                is_duplicate,
                duplicate_with_id,
                created_at,
                updated_at,
                deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                cv.id.to_string(),
                cv.code.as_str(),
                cv.name.as_deref(),
                cv.email.as_deref(),
                cv.phone.as_deref(),
                cv.status.as_db(),
                cv.collaborator_owner_id.map(|id| id.to_string()),
                cv.admin_owner_id.map(|id| id.to_string()),
                bool_to_int(cv.is_duplicate),
                cv.duplicate_with_id.map(|id| id.to_string()),
                cv.created_at.timestamp_millis(),
                cv.updated_at.timestamp_millis(),
                cv.deleted_at.map(|at| at.timestamp_millis()),
            ],
        );

        match result {
            Ok(_) => Ok(cv.id),
            Err(err) if is_code_conflict(&err) => Err(RepoError::DuplicateCode(cv.code)),
            Err(err) => Err(err.into()),
        }
    }

    fn save_cv(&self, cv: &CvRecord) -> RepoResult<()> {
        let mut cv = cv.clone();
        cv.normalize_identity();
        cv.validate()?;

        let result = self.conn.execute(
            "UPDATE cvs
             SET
                code = ?2,
                name = ?3,
                email = ?4,
                phone = ?5,
                status = ?6,
                collaborator_owner_id = ?7,
                admin_owner_id = ?8,
                is_duplicate = ?9,
                duplicate_with_id = ?10,
                updated_at = ?11,
                deleted_at = ?12
             WHERE id = ?1;",
            params![
                cv.id.to_string(),
                cv.code.as_str(),
                cv.name.as_deref(),
                cv.email.as_deref(),
                cv.phone.as_deref(),
                cv.status.as_db(),
                cv.collaborator_owner_id.map(|id| id.to_string()),
                cv.admin_owner_id.map(|id| id.to_string()),
                bool_to_int(cv.is_duplicate),
                cv.duplicate_with_id.map(|id| id.to_string()),
                cv.updated_at.timestamp_millis(),
                cv.deleted_at.map(|at| at.timestamp_millis()),
            ],
        );

        match result {
            Ok(0) => Err(RepoError::NotFound(cv.id)),
            Ok(_) => Ok(()),
            Err(err) if is_code_conflict(&err) => Err(RepoError::DuplicateCode(cv.code)),
            Err(err) => Err(err.into()),
        }
    }

    fn get_cv(&self, id: CvId, include_deleted: bool) -> RepoResult<Option<CvRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CV_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR deleted_at IS NULL);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_cv_row(row)?));
        }

        Ok(None)
    }

    fn query_candidates(
        &self,
        predicate: &IdentityPredicate,
        exclude_id: Option<CvId>,
    ) -> RepoResult<Vec<CvRecord>> {
        let (filter_sql, mut bind_values) = predicate.to_sql_filter();
        let mut sql = format!("{CV_SELECT_SQL} WHERE deleted_at IS NULL AND {filter_sql}");

        if let Some(exclude_id) = exclude_id {
            sql.push_str(" AND id <> ?");
            bind_values.push(Value::Text(exclude_id.to_string()));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut cvs = Vec::new();

        while let Some(row) = rows.next()? {
            cvs.push(parse_cv_row(row)?);
        }

        Ok(cvs)
    }

    fn list_duplicates_of(&self, origin_id: CvId) -> RepoResult<Vec<CvRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CV_SELECT_SQL}
             WHERE duplicate_with_id = ?1
               AND is_duplicate = 1
               AND deleted_at IS NULL
             ORDER BY created_at ASC, id ASC;"
        ))?;

        let mut rows = stmt.query([origin_id.to_string()])?;
        let mut cvs = Vec::new();
        while let Some(row) = rows.next()? {
            cvs.push(parse_cv_row(row)?);
        }

        Ok(cvs)
    }

    fn next_cv_code(&self) -> RepoResult<String> {
        // Explicit import codes may already occupy generated values; skip them.
        loop {
            let next: i64 = self.conn.query_row(
                "UPDATE cv_code_counter
                 SET last_value = last_value + 1
                 WHERE singleton = 1
                 RETURNING last_value;",
                [],
                |row| row.get(0),
            )?;

            let code = format_cv_code(next);
            let taken: i64 = self.conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM cvs WHERE code = ?1);",
                [code.as_str()],
                |row| row.get(0),
            )?;
            if taken == 0 {
                return Ok(code);
            }
        }
    }

    fn soft_delete_cv(&self, id: CvId, now: DateTime<Utc>) -> RepoResult<()> {
        let now_ms = now.timestamp_millis();
        let changed = self.conn.execute(
            "UPDATE cvs
             SET
                deleted_at = COALESCE(deleted_at, ?2),
                updated_at = MAX(updated_at, ?2)
             WHERE id = ?1;",
            params![id.to_string(), now_ms],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }
}

/// Formats a counter value as a CV code, e.g. `CV000042`.
pub fn format_cv_code(value: i64) -> String {
    format!("{CV_CODE_PREFIX}{value:06}")
}

fn parse_cv_row(row: &Row<'_>) -> RepoResult<CvRecord> {
    let id = parse_uuid(&row.get::<_, String>("id")?, "id")?;

    let status_value: i64 = row.get("status")?;
    let status = CvStatus::from_db(status_value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_value}` in cvs.status"))
    })?;

    let is_duplicate = match row.get::<_, i64>("is_duplicate")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_duplicate value `{other}` in cvs.is_duplicate"
            )));
        }
    };

    let cv = CvRecord {
        id,
        code: row.get("code")?,
        name: row.get("name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        status,
        collaborator_owner_id: parse_optional_uuid(
            row.get("collaborator_owner_id")?,
            "collaborator_owner_id",
        )?,
        admin_owner_id: parse_optional_uuid(row.get("admin_owner_id")?, "admin_owner_id")?,
        is_duplicate,
        duplicate_with_id: parse_optional_uuid(row.get("duplicate_with_id")?, "duplicate_with_id")?,
        created_at: parse_millis(row.get("created_at")?, "created_at")?,
        updated_at: parse_millis(row.get("updated_at")?, "updated_at")?,
        deleted_at: row
            .get::<_, Option<i64>>("deleted_at")?
            .map(|value| parse_millis(value, "deleted_at"))
            .transpose()?,
    };
    cv.validate()?;
    Ok(cv)
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in cvs.{column}"))
    })
}

fn parse_optional_uuid(value: Option<String>, column: &'static str) -> RepoResult<Option<Uuid>> {
    value.map(|value| parse_uuid(&value, column)).transpose()
}

fn parse_millis(value: i64, column: &'static str) -> RepoResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid timestamp `{value}` in cvs.{column}"))
    })
}

fn is_code_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, Some(message)) => {
            failure.code == ErrorCode::ConstraintViolation && message.contains("cvs.code")
        }
        _ => false,
    }
}

fn ensure_cv_connection_ready(conn: &Connection) -> RepoResult<()> {
    let ready: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM sqlite_master
         WHERE type = 'table' AND name IN ('cvs', 'cv_code_counter');",
        [],
        |row| row.get(0),
    )?;

    if ready != 2 {
        return Err(RepoError::InvalidData(
            "cv store schema is missing; open the database through db::open_db".to_string(),
        ));
    }

    Ok(())
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
