//! Detected name → candidate id mapping
//!
//! Content analysis reports human names ("Alice Smith"); evidence needs
//! candidate ids. The alias table is consulted first (case-insensitive),
//! otherwise the name is slugged: lower-case, whitespace runs become `-`.

use crate::types::CandidateId;
use std::collections::BTreeMap;

/// Lower-case, whitespace runs → `-`
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Alias table from configured names to candidate ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameResolver {
    aliases: BTreeMap<String, CandidateId>,
}

impl NameResolver {
    pub fn new(aliases: BTreeMap<String, CandidateId>) -> Self {
        Self {
            aliases: aliases
                .into_iter()
                .map(|(name, id)| (slugify(&name), id))
                .collect(),
        }
    }

    pub fn with_alias(mut self, name: &str, candidate_id: impl Into<CandidateId>) -> Self {
        self.aliases.insert(slugify(name), candidate_id.into());
        self
    }

    /// `None` for blank names
    pub fn resolve(&self, name: &str) -> Option<CandidateId> {
        let slug = slugify(name);
        if slug.is_empty() {
            return None;
        }
        Some(self.aliases.get(&slug).cloned().unwrap_or(slug))
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
