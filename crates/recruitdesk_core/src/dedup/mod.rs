//! CV deduplication and ownership resolution.
//!
//! # Responsibility
//! - `matcher`: find the origin CV for a candidate identity.
//! - `resolver`: decide and apply the duplicate/ownership disposition.
//! - `predicate`: the "two of three fields" rule shared by both.
//!
//! # Invariants
//! - Both admin and collaborator workflows go through this module; the rule
//!   set does not depend on who submitted the CV.

pub mod matcher;
pub mod predicate;
pub mod resolver;
