//! Identity match predicate.
//!
//! # Responsibility
//! - Turn a partial candidate identity into the "at least two of three"
//!   exact-match rule as an explicit OR of AND-pairs.
//! - Evaluate the rule in memory and render it as a SQL filter.
//!
//! # Invariants
//! - Built only from identities with at least two non-blank fields.
//! - A pair is included only if both of its identity fields are non-blank.
//! - Comparison is exact after trimming: no case folding, no inner
//!   whitespace collapsing.

use crate::model::cv::{CandidateIdentity, CvRecord};
use rusqlite::types::Value;

/// Minimum number of populated identity fields needed to attempt a match.
pub const MIN_IDENTITY_FIELDS: usize = 2;

/// One of the three field pairs the matcher checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPair {
    NameEmail,
    NamePhone,
    EmailPhone,
}

impl MatchPair {
    pub const ALL: [MatchPair; 3] = [Self::NameEmail, Self::NamePhone, Self::EmailPhone];

    fn columns(self) -> (&'static str, &'static str) {
        match self {
            Self::NameEmail => ("name", "email"),
            Self::NamePhone => ("name", "phone"),
            Self::EmailPhone => ("email", "phone"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PairClause {
    pair: MatchPair,
    left: String,
    right: String,
}

/// Disjunction of exact-match field pairs derived from one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPredicate {
    clauses: Vec<PairClause>,
}

impl IdentityPredicate {
    /// Builds the predicate, or `None` when the identity carries fewer than
    /// two non-blank fields.
    pub fn from_identity(identity: &CandidateIdentity) -> Option<Self> {
        if identity.present_field_count() < MIN_IDENTITY_FIELDS {
            return None;
        }

        let name = identity.trimmed_name();
        let email = identity.trimmed_email();
        let phone = identity.trimmed_phone();

        let clauses = MatchPair::ALL
            .iter()
            .filter_map(|&pair| {
                let (left, right) = match pair {
                    MatchPair::NameEmail => (name, email),
                    MatchPair::NamePhone => (name, phone),
                    MatchPair::EmailPhone => (email, phone),
                };
                Some(PairClause {
                    pair,
                    left: left?.to_string(),
                    right: right?.to_string(),
                })
            })
            .collect::<Vec<_>>();

        Some(Self { clauses })
    }

    /// Pairs this predicate checks, in evaluation order.
    pub fn pairs(&self) -> Vec<MatchPair> {
        self.clauses.iter().map(|clause| clause.pair).collect()
    }

    /// Returns whether a stored record satisfies at least one pair, i.e. at
    /// least two exact field equalities. Deleted records never match.
    pub fn matches(&self, record: &CvRecord) -> bool {
        if record.is_deleted() {
            return false;
        }

        self.clauses.iter().any(|clause| {
            let (left, right) = match clause.pair {
                MatchPair::NameEmail => (&record.name, &record.email),
                MatchPair::NamePhone => (&record.name, &record.phone),
                MatchPair::EmailPhone => (&record.email, &record.phone),
            };
            field_equals(left, &clause.left) && field_equals(right, &clause.right)
        })
    }

    /// Renders `((a = ? AND b = ?) OR ...)` plus its bind values.
    ///
    /// Column names come from a fixed allow-list; only values are bound.
    pub fn to_sql_filter(&self) -> (String, Vec<Value>) {
        let mut parts = Vec::with_capacity(self.clauses.len());
        let mut values = Vec::with_capacity(self.clauses.len() * 2);

        for clause in &self.clauses {
            let (left_col, right_col) = clause.pair.columns();
            parts.push(format!("({left_col} = ? AND {right_col} = ?)"));
            values.push(Value::Text(clause.left.clone()));
            values.push(Value::Text(clause.right.clone()));
        }

        (format!("({})", parts.join(" OR ")), values)
    }
}

fn field_equals(stored: &Option<String>, expected: &str) -> bool {
    stored
        .as_deref()
        .map(str::trim)
        .is_some_and(|value| value == expected)
}
