//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep creation workflows decoupled from dedup and storage details.

pub mod dedup_service;
pub mod intake_service;
