use serde::Serialize;

use crate::error::SweepError;

/// Maximum number of failures reported individually before collapsing the
/// rest into an overflow count.
pub const MAX_DETAILED_FAILURES: usize = 3;

/// Diagnostic text longer than this is truncated in user-facing notices.
/// Outcomes and logs keep the full text.
pub const DISPLAY_DETAIL_LIMIT: usize = 200;

/// Reason recorded for targets that never ran because the credential was
/// rejected earlier in the same run.
pub const SKIPPED_DETAIL: &str = "skipped: prior authentication failure";

/// Terminal state of a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Succeeded,
    /// The command failed for a reason other than authentication.
    Failed,
    /// The command failed because the credential was rejected.
    AuthRejected,
    /// Never attempted because an earlier task saw an auth rejection.
    Skipped,
}

/// Settled result for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub target_id: String,
    pub kind: OutcomeKind,
    /// Raw diagnostic text (stderr/stdout) for failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl TaskOutcome {
    pub fn succeeded(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            kind: OutcomeKind::Succeeded,
            error_detail: None,
        }
    }

    pub fn failed(target_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            kind: OutcomeKind::Failed,
            error_detail: Some(detail.into()),
        }
    }

    pub fn auth_rejected(target_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            kind: OutcomeKind::AuthRejected,
            error_detail: Some(detail.into()),
        }
    }

    pub fn skipped(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            kind: OutcomeKind::Skipped,
            error_detail: Some(SKIPPED_DETAIL.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Succeeded
    }

    pub fn classified_as_auth_failure(&self) -> bool {
        self.kind == OutcomeKind::AuthRejected
    }

    pub fn is_skipped(&self) -> bool {
        self.kind == OutcomeKind::Skipped
    }

    /// The failure as an error value, `None` for successes.
    pub fn error(&self) -> Option<SweepError> {
        match self.kind {
            OutcomeKind::Succeeded => None,
            OutcomeKind::AuthRejected => Some(SweepError::Authentication),
            OutcomeKind::Failed | OutcomeKind::Skipped => Some(SweepError::CommandFailure {
                target: self.target_id.clone(),
                detail: self
                    .error_detail
                    .clone()
                    .unwrap_or_else(|| "unknown error".into()),
            }),
        }
    }
}

/// Overall classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    NoOp,
    AllSucceeded,
    AllFailed,
    Partial,
}

/// A failure as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureNotice {
    pub target_id: String,
    pub kind: OutcomeKind,
    pub detail: String,
}

/// Summary derived once all tasks have settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub success_count: usize,
    pub failure_count: usize,
    pub classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure_detail: Option<String>,
    /// Every failure (including skips), in target order.
    pub failures: Vec<FailureNotice>,
}

/// Failures to show individually plus how many were left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotices<'a> {
    pub shown: &'a [FailureNotice],
    pub overflow: usize,
}

impl RunSummary {
    /// Split the ordered failure list into at most `limit` detailed notices
    /// and an overflow count.
    pub fn failure_notices(&self, limit: usize) -> FailureNotices<'_> {
        let shown = &self.failures[..self.failures.len().min(limit)];
        FailureNotices {
            shown,
            overflow: self.failures.len() - shown.len(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.classification,
            Classification::NoOp | Classification::AllSucceeded
        )
    }
}

/// Reduce per-target outcomes into a [`RunSummary`].
///
/// Counts and classification depend only on the multiset of outcome kinds;
/// the failure list follows the order of `outcomes`.
pub fn summarize(outcomes: &[TaskOutcome]) -> RunSummary {
    let success_count = outcomes.iter().filter(|o| o.is_success()).count();
    let failure_count = outcomes.len() - success_count;

    let classification = if outcomes.is_empty() {
        Classification::NoOp
    } else if failure_count == 0 {
        Classification::AllSucceeded
    } else if success_count == 0 {
        Classification::AllFailed
    } else {
        Classification::Partial
    };

    let failures: Vec<FailureNotice> = outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| FailureNotice {
            target_id: o.target_id.clone(),
            kind: o.kind,
            detail: truncate_detail(o.error_detail.as_deref().unwrap_or("unknown error")),
        })
        .collect();

    let first_failure_detail = outcomes
        .iter()
        .find(|o| !o.is_success())
        .map(|o| o.error_detail.clone().unwrap_or_else(|| "unknown error".into()));

    RunSummary {
        success_count,
        failure_count,
        classification,
        first_failure_detail,
        failures,
    }
}

/// Trim and shorten diagnostic text for display.
pub fn truncate_detail(detail: &str) -> String {
    let detail = detail.trim();
    if detail.chars().count() <= DISPLAY_DETAIL_LIMIT {
        return detail.to_string();
    }
    let mut short: String = detail.chars().take(DISPLAY_DETAIL_LIMIT).collect();
    short.push('…');
    short
}
