use tracing::{debug, info, warn};

use crate::classify::RejectionSignatures;
use crate::credential::Credential;
use crate::error::SweepError;
use crate::privilege::PrivilegedExecutor;
use crate::summary::truncate_detail;

/// Validate a raw password and prove it authorizes elevation.
///
/// Empty input fails with [`SweepError::Validation`] before any process is
/// spawned. On success the validated [`Credential`] is handed back so the
/// caller can use it for the run that follows.
pub async fn run<E: PrivilegedExecutor>(
    raw: impl Into<String>,
    executor: &E,
    signatures: &RejectionSignatures,
) -> Result<Credential, SweepError> {
    let credential = Credential::new(raw)?;
    check(&credential, executor, signatures).await?;
    Ok(credential)
}

/// Probe an already-validated credential.
pub async fn check<E: PrivilegedExecutor>(
    credential: &Credential,
    executor: &E,
    signatures: &RejectionSignatures,
) -> Result<(), SweepError> {
    debug!("probing administrator credential");

    let output = match executor.probe(credential).await {
        Ok(output) => output,
        Err(e) => {
            warn!(error = %e, "credential probe did not complete");
            return Err(e);
        }
    };

    if output.success {
        info!("administrator credential verified");
        return Ok(());
    }

    let diagnostic = output.diagnostic();
    if signatures.is_auth_rejection(&diagnostic) {
        warn!("administrator credential rejected");
        return Err(SweepError::Authentication);
    }

    warn!(diagnostic = %diagnostic, "credential probe failed");
    Err(SweepError::VerificationIncomplete(truncate_detail(
        &diagnostic,
    )))
}
