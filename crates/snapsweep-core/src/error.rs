use thiserror::Error;

/// Errors surfaced by the deletion engine.
///
/// Per-target failures never escape a batch run as `Err`; they are captured as
/// [`TaskOutcome`](crate::summary::TaskOutcome) values instead. Only problems
/// detected before any privileged call (bad credential, bad target list) and
/// the verification probe itself return these variants.
#[derive(Error, Debug)]
pub enum SweepError {
    /// Empty or otherwise unusable credential. Nothing was executed.
    #[error("{0}")]
    Validation(String),

    /// The privilege-escalation mechanism rejected the credential.
    #[error("incorrect password")]
    Authentication,

    /// The verification probe failed for a reason other than a rejected credential.
    #[error("could not verify password: {0}")]
    VerificationIncomplete(String),

    /// The verification probe did not finish in time.
    #[error("could not verify password: timed out after {0}s")]
    VerificationTimeout(u64),

    /// A privileged command ran but reported failure.
    #[error("command failed for '{target}': {detail}")]
    CommandFailure { target: String, detail: String },

    /// A target identifier that is unsafe to pass to the privileged tool.
    #[error("invalid snapshot identifier '{0}'")]
    InvalidTarget(String),

    /// The same identifier was submitted twice in one run.
    #[error("duplicate snapshot identifier '{0}'")]
    DuplicateTarget(String),
}

impl SweepError {
    /// Whether this error means the credential itself is wrong, as opposed to
    /// the check not being able to complete.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Authentication)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_distinguish_rejection_from_incomplete() {
        assert_eq!(SweepError::Authentication.to_string(), "incorrect password");
        assert_eq!(
            SweepError::VerificationIncomplete("sudo: command not found".into()).to_string(),
            "could not verify password: sudo: command not found"
        );
        assert_eq!(
            SweepError::VerificationTimeout(10).to_string(),
            "could not verify password: timed out after 10s"
        );
    }

    #[test]
    fn test_is_auth_rejection() {
        assert!(SweepError::Authentication.is_auth_rejection());
        assert!(!SweepError::VerificationTimeout(10).is_auth_rejection());
        assert!(!SweepError::Validation("empty".into()).is_auth_rejection());
    }
}
