//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the CV store contract consumed by dedup.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `CvRecord::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateCode`) in
//!   addition to DB transport errors.

pub mod cv_repo;
