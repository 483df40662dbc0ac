use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::SweepError;

/// Characters allowed in a snapshot identifier. Anything else (whitespace,
/// quotes, shell metacharacters) is rejected before it can reach the
/// privileged command line.
static SAFE_ID: LazyLock<Regex> = LazyLock::new(|| {
    // safety: the pattern is a compile-time constant
    Regex::new(r"^[A-Za-z0-9._:+-]+$").expect("valid identifier regex")
});

/// Local snapshot identifier, e.g. `2024-05-01-120000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Target {
    id: String,
}

impl Target {
    pub fn new(id: impl Into<String>) -> Result<Self, SweepError> {
        let id = id.into();
        if !SAFE_ID.is_match(&id) || id.starts_with('-') {
            return Err(SweepError::InvalidTarget(id));
        }
        Ok(Self { id })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Build an ordered target list from raw identifiers, rejecting unsafe and
/// duplicate ids.
pub fn parse_targets<I, S>(ids: I) -> Result<Vec<Target>, SweepError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for id in ids {
        let target = Target::new(id)?;
        if !seen.insert(target.id.clone()) {
            return Err(SweepError::DuplicateTarget(target.id));
        }
        targets.push(target);
    }
    Ok(targets)
}
