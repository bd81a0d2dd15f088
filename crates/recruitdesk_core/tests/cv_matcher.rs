use chrono::{DateTime, TimeZone, Utc};
use recruitdesk_core::db::open_db_in_memory;
use recruitdesk_core::{
    find_origin, CandidateIdentity, CvRecord, CvRepository, SqliteCvRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn at(month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap()
}

fn identity(name: Option<&str>, email: Option<&str>, phone: Option<&str>) -> CandidateIdentity {
    CandidateIdentity::new(name, email, phone)
}

fn seed(
    conn: &Connection,
    code: &str,
    identity: &CandidateIdentity,
    created_at: DateTime<Utc>,
) -> CvRecord {
    let repo = SqliteCvRepository::try_new(conn).unwrap();
    let cv = CvRecord::new(code, identity, created_at);
    repo.create_cv(&cv).unwrap();
    cv
}

#[test]
fn single_field_identity_never_matches() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, "CV1", &identity(Some("Ana"), Some("ana@example.com"), Some("900")), at(1));
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    let origin = find_origin(&repo, &identity(None, Some("ana@example.com"), None), None).unwrap();
    assert!(origin.is_none());

    let blanks = identity(Some("   "), Some("ana@example.com"), Some(""));
    assert!(find_origin(&repo, &blanks, None).unwrap().is_none());
}

#[test]
fn each_pair_is_enough_to_match() {
    let conn = open_db_in_memory().unwrap();
    let ana = identity(Some("Ana"), Some("ana@example.com"), Some("900"));
    let stored = seed(&conn, "CV1", &ana, at(1));
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    for lookup in [
        identity(Some("Ana"), Some("ana@example.com"), None),
        identity(Some("Ana"), None, Some("900")),
        identity(None, Some("ana@example.com"), Some("900")),
        identity(Some(" Ana "), Some("other@example.com"), Some("900 ")),
    ] {
        let origin = find_origin(&repo, &lookup, None).unwrap();
        assert_eq!(origin.map(|cv| cv.id), Some(stored.id), "lookup {lookup:?}");
    }
}

#[test]
fn fewer_than_two_equal_fields_is_excluded() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, "CV1", &identity(Some("Ana"), Some("ana@example.com"), Some("900")), at(1));
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    let lookup = identity(Some("Ana"), Some("someone@example.com"), Some("111"));
    assert!(find_origin(&repo, &lookup, None).unwrap().is_none());

    let different_case = identity(Some("ana"), Some("ANA@example.com"), Some("900"));
    assert!(find_origin(&repo, &different_case, None).unwrap().is_none());
}

#[test]
fn earliest_created_match_is_the_origin() {
    let conn = open_db_in_memory().unwrap();
    let ana = identity(Some("Ana"), Some("ana@example.com"), Some("900"));
    seed(&conn, "CV1", &ana, at(6));
    let earliest = seed(&conn, "CV2", &ana, at(2));
    seed(&conn, "CV3", &ana, at(4));
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    let origin = find_origin(&repo, &ana, None).unwrap().unwrap();
    assert_eq!(origin.id, earliest.id);
}

#[test]
fn equal_creation_times_break_ties_by_smallest_id() {
    let conn = open_db_in_memory().unwrap();
    let ana = identity(Some("Ana"), Some("ana@example.com"), Some("900"));
    let repo = SqliteCvRepository::try_new(&conn).unwrap();

    let high = Uuid::parse_str("ffffffff-0000-4000-8000-000000000000").unwrap();
    let low = Uuid::parse_str("00000000-0000-4000-8000-000000000001").unwrap();
    repo.create_cv(&CvRecord::with_id(high, "CV1", &ana, at(3))).unwrap();
    repo.create_cv(&CvRecord::with_id(low, "CV2", &ana, at(3))).unwrap();

    let origin = find_origin(&repo, &ana, None).unwrap().unwrap();
    assert_eq!(origin.id, low);
}

#[test]
fn excluded_and_deleted_records_are_skipped() {
    let conn = open_db_in_memory().unwrap();
    let ana = identity(Some("Ana"), Some("ana@example.com"), Some("900"));
    let deleted = seed(&conn, "CV1", &ana, at(1));
    let fresh = seed(&conn, "CV2", &ana, at(2));
    let repo = SqliteCvRepository::try_new(&conn).unwrap();
    repo.soft_delete_cv(deleted.id, at(3)).unwrap();

    assert!(find_origin(&repo, &ana, Some(fresh.id)).unwrap().is_none());
    assert_eq!(
        find_origin(&repo, &ana, None).unwrap().map(|cv| cv.id),
        Some(fresh.id)
    );
}

#[test]
fn matching_never_mutates_records() {
    let conn = open_db_in_memory().unwrap();
    let ana = identity(Some("Ana"), Some("ana@example.com"), Some("900"));
    let mut stored = CvRecord::new("CV1", &ana, at(1));
    stored.admin_owner_id = Some(Uuid::new_v4());
    let repo = SqliteCvRepository::try_new(&conn).unwrap();
    repo.create_cv(&stored).unwrap();

    find_origin(&repo, &ana, None).unwrap();
    assert_eq!(repo.get_cv(stored.id, false).unwrap().unwrap(), stored);
}
