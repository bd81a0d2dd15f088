//! Domain model for the CV dedup core.
//!
//! # Responsibility
//! - Define canonical data structures used by matching and resolution.
//!
//! # Invariants
//! - Every CV is identified by a stable `CvId`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod cv;
