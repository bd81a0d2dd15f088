use chrono::{DateTime, Duration, TimeZone, Utc};
use recruitdesk_core::db::open_db_in_memory;
use recruitdesk_core::{
    CandidateIdentity, CvRecord, CvRepository, CvStatus, IdentityPredicate, RepoError,
    SqliteCvRepository,
};
use uuid::Uuid;

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 8, 0, 0).unwrap()
}

fn ana() -> CandidateIdentity {
    CandidateIdentity::new(Some("Ana"), Some("ana@example.com"), Some("+351 900"))
}

#[test]
fn create_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    let mut cv = CvRecord::new("CV000001", &ana(), at(1));
    cv.status = CvStatus::Active;
    cv.collaborator_owner_id = Some(Uuid::new_v4());
    let id = repo.create_cv(&cv).unwrap();

    let loaded = repo.get_cv(id, false).unwrap().unwrap();
    assert_eq!(loaded, cv);
}

#[test]
fn create_trims_identity_before_storing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    let mut cv = CvRecord::new("CV000001", &ana(), at(1));
    cv.name = Some("  Ana  ".to_string());
    cv.phone = Some("   ".to_string());
    repo.create_cv(&cv).unwrap();

    let loaded = repo.get_cv(cv.id, false).unwrap().unwrap();
    assert_eq!(loaded.name.as_deref(), Some("Ana"));
    assert_eq!(loaded.phone, None);
}

#[test]
fn create_rejects_reused_code() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    repo.create_cv(&CvRecord::new("CV000001", &ana(), at(1)))
        .unwrap();
    let err = repo
        .create_cv(&CvRecord::new("CV000001", &ana(), at(2)))
        .unwrap_err();
    assert!(matches!(err, RepoError::DuplicateCode(code) if code == "CV000001"));
}

#[test]
fn save_not_found_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    let cv = CvRecord::new("CV000001", &ana(), at(1));
    let err = repo.save_cv(&cv).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == cv.id));
}

#[test]
fn next_cv_code_is_sequential() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    assert_eq!(repo.next_cv_code().unwrap(), "CV000001");
    assert_eq!(repo.next_cv_code().unwrap(), "CV000002");
    assert_eq!(repo.next_cv_code().unwrap(), "CV000003");
}

#[test]
fn next_cv_code_skips_codes_already_stored() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    repo.create_cv(&CvRecord::new("CV000001", &ana(), at(1))).unwrap();
    repo.create_cv(&CvRecord::new("CV000002", &ana(), at(1))).unwrap();
    repo.create_cv(&CvRecord::new("CV000004", &ana(), at(1))).unwrap();

    assert_eq!(repo.next_cv_code().unwrap(), "CV000003");
    assert_eq!(repo.next_cv_code().unwrap(), "CV000005");
}

#[test]
fn list_duplicates_of_returns_live_duplicates_oldest_first() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    let origin = CvRecord::new("CV000001", &ana(), at(1));
    repo.create_cv(&origin).unwrap();

    let mut later = CvRecord::new("CV000003", &ana(), at(3));
    later.mark_duplicate_of(origin.id, at(3));
    repo.create_cv(&later).unwrap();
    let mut earlier = CvRecord::new("CV000002", &ana(), at(2));
    earlier.mark_duplicate_of(origin.id, at(2));
    repo.create_cv(&earlier).unwrap();
    let mut deleted = CvRecord::new("CV000004", &ana(), at(4));
    deleted.mark_duplicate_of(origin.id, at(4));
    repo.create_cv(&deleted).unwrap();
    repo.soft_delete_cv(deleted.id, at(5)).unwrap();

    let ids = repo
        .list_duplicates_of(origin.id)
        .unwrap()
        .into_iter()
        .map(|cv| cv.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![earlier.id, later.id]);
    assert!(repo.list_duplicates_of(earlier.id).unwrap().is_empty());
}

#[test]
fn soft_delete_hides_cv_unless_requested() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    let cv = CvRecord::new("CV000001", &ana(), at(1));
    repo.create_cv(&cv).unwrap();
    repo.soft_delete_cv(cv.id, at(3)).unwrap();
    repo.soft_delete_cv(cv.id, at(4)).unwrap();

    assert!(repo.get_cv(cv.id, false).unwrap().is_none());
    let deleted = repo.get_cv(cv.id, true).unwrap().unwrap();
    assert_eq!(deleted.deleted_at, Some(at(3)));
    assert_eq!(deleted.updated_at, at(4));

    let err = repo.soft_delete_cv(Uuid::new_v4(), at(4)).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[test]
fn query_candidates_orders_oldest_first_and_skips_excluded_and_deleted() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    let newest = CvRecord::new("CV000001", &ana(), at(9));
    let oldest = CvRecord::new("CV000002", &ana(), at(2));
    let middle = CvRecord::new("CV000003", &ana(), at(5));
    let deleted = CvRecord::new("CV000004", &ana(), at(1));
    for cv in [&newest, &oldest, &middle, &deleted] {
        repo.create_cv(cv).unwrap();
    }
    repo.soft_delete_cv(deleted.id, at(10)).unwrap();

    let predicate = IdentityPredicate::from_identity(&ana()).unwrap();
    let ids = repo
        .query_candidates(&predicate, Some(middle.id))
        .unwrap()
        .into_iter()
        .map(|cv| cv.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![oldest.id, newest.id]);
}

#[test]
fn query_candidates_requires_two_equal_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    let email_phone = CvRecord::new(
        "CV000001",
        &CandidateIdentity::new(Some("Someone Else"), Some("ana@example.com"), Some("+351 900")),
        at(1),
    );
    let email_only = CvRecord::new(
        "CV000002",
        &CandidateIdentity::new(Some("Other"), Some("ana@example.com"), Some("+351 111")),
        at(1) + Duration::hours(1),
    );
    repo.create_cv(&email_phone).unwrap();
    repo.create_cv(&email_only).unwrap();

    let predicate = IdentityPredicate::from_identity(&ana()).unwrap();
    let found = repo.query_candidates(&predicate, None).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, email_phone.id);
}

#[test]
fn repository_requires_migrated_connection() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let result = SqliteCvRepository::try_new(&conn);
    assert!(matches!(result, Err(RepoError::InvalidData(_))));
}
