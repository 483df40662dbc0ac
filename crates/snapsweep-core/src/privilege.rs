use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::SweepConfig;
use crate::credential::Credential;
use crate::error::SweepError;
use crate::target::Target;

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// A failure that never produced process output (spawn error, timeout).
    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: detail.into(),
        }
    }

    /// Combined diagnostic text: stderr first, then stdout.
    ///
    /// Falls back to the exit code when the command printed nothing.
    pub fn diagnostic(&self) -> String {
        let parts: Vec<&str> = [self.stderr.trim(), self.stdout.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join("\n");
        }
        match self.exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated without exit status".to_string(),
        }
    }
}

/// The privileged process boundary.
///
/// Implementations receive the credential by reference and must deliver it
/// through a channel that does not show up in process listings.
pub trait PrivilegedExecutor: Send + Sync {
    /// Prove that `credential` authorizes elevation without running anything
    /// effectful. `Err` means the probe itself could not run (spawn failure
    /// or timeout); a rejected password comes back as a failed output.
    fn probe(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<CommandOutput, SweepError>> + Send;

    /// Delete one snapshot with elevated privileges. Never fails as `Err`:
    /// every problem is reported through the returned output.
    fn delete(
        &self,
        target: &Target,
        credential: &Credential,
    ) -> impl Future<Output = CommandOutput> + Send;
}

/// Runs the snapshot tool through `sudo -S`, feeding the password on stdin.
#[derive(Debug, Clone)]
pub struct SudoExecutor {
    sudo: String,
    tool: String,
    delete_verb: String,
    probe_timeout: Duration,
    delete_timeout: Option<Duration>,
}

impl SudoExecutor {
    pub fn from_config(config: &SweepConfig) -> Self {
        Self {
            sudo: config.sudo_program().to_string(),
            tool: config.tool_program().to_string(),
            delete_verb: config.delete_verb().to_string(),
            probe_timeout: config.verify_timeout(),
            delete_timeout: config.delete_timeout(),
        }
    }

    /// Arguments passed to sudo for deleting `target`. The password is never
    /// part of argv.
    pub fn delete_args(&self, target: &Target) -> Vec<String> {
        vec![
            "-S".to_string(),
            "-p".to_string(),
            String::new(),
            "--".to_string(),
            self.tool.clone(),
            self.delete_verb.clone(),
            target.id().to_string(),
        ]
    }

    fn sudo_command(&self) -> Command {
        let mut cmd = Command::new(&self.sudo);
        // Keep sudo's own messages in the C locale so rejection phrases match.
        cmd.env("LC_ALL", "C")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Drop any cached sudo timestamp so the probe cannot pass on stale
    /// authorization. Bounded by the probe timeout.
    async fn invalidate_cached_elevation(&self) -> Result<(), SweepError> {
        let mut cmd = Command::new(&self.sudo);
        cmd.arg("-k")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let status = tokio::time::timeout(self.probe_timeout, cmd.status())
            .await
            .map_err(|_| SweepError::VerificationTimeout(self.probe_timeout.as_secs()))?
            .map_err(|e| SweepError::VerificationIncomplete(format!("{}: {}", self.sudo, e)))?;
        if !status.success() {
            return Err(SweepError::VerificationIncomplete(format!(
                "{} -k exited with {}",
                self.sudo, status
            )));
        }
        Ok(())
    }
}

/// Spawn `cmd`, write `payload` to its stdin, and collect its output.
///
/// Returns `Ok(None)` on timeout; the child is killed when the wait future
/// is dropped.
async fn run_with_stdin(
    mut cmd: Command,
    payload: &[u8],
    timeout: Option<Duration>,
) -> std::io::Result<Option<CommandOutput>> {
    let mut child = cmd.spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        // A process that exits before reading its stdin closes the pipe; the
        // exit status still tells us what happened.
        if let Err(e) = stdin.write_all(payload).await {
            debug!(error = %e, "stdin closed before password was written");
        }
        drop(stdin);
    }

    let wait = child.wait_with_output();
    let output = match timeout {
        Some(dur) => match tokio::time::timeout(dur, wait).await {
            Ok(result) => result?,
            Err(_) => return Ok(None),
        },
        None => wait.await?,
    };

    Ok(Some(CommandOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }))
}

impl PrivilegedExecutor for SudoExecutor {
    async fn probe(&self, credential: &Credential) -> Result<CommandOutput, SweepError> {
        self.invalidate_cached_elevation().await?;

        let mut cmd = self.sudo_command();
        cmd.args(["-S", "-p", "", "-v"]);

        let payload = credential.stdin_payload();
        match run_with_stdin(cmd, &payload, Some(self.probe_timeout)).await {
            Ok(Some(output)) => Ok(output),
            Ok(None) => Err(SweepError::VerificationTimeout(
                self.probe_timeout.as_secs(),
            )),
            Err(e) => Err(SweepError::VerificationIncomplete(format!(
                "{}: {}",
                self.sudo, e
            ))),
        }
    }

    async fn delete(&self, target: &Target, credential: &Credential) -> CommandOutput {
        let mut cmd = self.sudo_command();
        cmd.args(self.delete_args(target));

        let payload = credential.stdin_payload();
        match run_with_stdin(cmd, &payload, self.delete_timeout).await {
            Ok(Some(output)) => output,
            Ok(None) => CommandOutput::failure(format!(
                "timed out after {}s",
                self.delete_timeout.map(|d| d.as_secs()).unwrap_or_default()
            )),
            Err(e) => CommandOutput::failure(format!("failed to run {}: {}", self.sudo, e)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> SudoExecutor {
        SudoExecutor::from_config(&SweepConfig::default())
    }

    #[test]
    fn test_delete_args_keep_password_out_of_argv() {
        let target = Target::new("2024-05-01-120000").unwrap();
        let args = executor().delete_args(&target);
        assert_eq!(
            args,
            vec![
                "-S",
                "-p",
                "",
                "--",
                "tmutil",
                "deletelocalsnapshots",
                "2024-05-01-120000"
            ]
        );
    }

    #[test]
    fn test_diagnostic_prefers_stderr_then_stdout() {
        let output = CommandOutput {
            success: false,
            exit_code: Some(1),
            stdout: "partial\n".into(),
            stderr: "Sorry, try again.\n".into(),
        };
        assert_eq!(output.diagnostic(), "Sorry, try again.\npartial");
    }

    #[test]
    fn test_diagnostic_falls_back_to_exit_code() {
        let output = CommandOutput {
            success: false,
            exit_code: Some(70),
            ..CommandOutput::default()
        };
        assert_eq!(output.diagnostic(), "exited with status 70");
        assert_eq!(
            CommandOutput::default().diagnostic(),
            "terminated without exit status"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_with_stdin_delivers_payload() {
        let mut cmd = Command::new("cat");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let output = run_with_stdin(cmd, b"secret\n", Some(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "secret\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_with_stdin_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let output = run_with_stdin(cmd, b"", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(output.is_none());
    }

    /// Install a stand-in sudo that records each argv line in `calls.log`
    /// and then runs `body`.
    #[cfg(unix)]
    fn scripted_sudo(dir: &std::path::Path, body: &str) -> (SudoExecutor, std::path::PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("calls.log");
        let script = dir.join("sudo");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$*\" >> '{}'\n{}\n", log.display(), body),
        )
        .unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let config = SweepConfig {
            sudo_path: Some(script.display().to_string()),
            verify_timeout_secs: Some(1),
            ..SweepConfig::default()
        };
        (SudoExecutor::from_config(&config), log)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_invalidates_cache_then_validates() {
        let dir = tempfile::TempDir::new().unwrap();
        let (executor, log) = scripted_sudo(dir.path(), "exit 0");

        let cred = Credential::new("pw").unwrap();
        let output = executor.probe(&cred).await.unwrap();
        assert!(output.success);

        let calls = std::fs::read_to_string(&log).unwrap();
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], "-k");
        assert!(calls[1].ends_with("-v"), "{calls:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_probe_times_out() {
        let dir = tempfile::TempDir::new().unwrap();
        let (executor, log) = scripted_sudo(
            dir.path(),
            "case \"$*\" in *-v) exec sleep 5 ;; esac\nexit 0",
        );

        let cred = Credential::new("pw").unwrap();
        let err = executor.probe(&cred).await.unwrap_err();
        assert!(matches!(err, SweepError::VerificationTimeout(1)), "{err:?}");

        let calls = std::fs::read_to_string(&log).unwrap();
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(calls[0], "-k");
        assert!(calls[1].ends_with("-v"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_cache_invalidation_times_out() {
        let dir = tempfile::TempDir::new().unwrap();
        let (executor, log) = scripted_sudo(
            dir.path(),
            "case \"$1\" in -k) exec sleep 5 ;; esac\nexit 0",
        );

        let cred = Credential::new("pw").unwrap();
        let err = executor.probe(&cred).await.unwrap_err();
        assert!(matches!(err, SweepError::VerificationTimeout(1)), "{err:?}");

        // The -v step never ran.
        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls.lines().collect::<Vec<_>>(), vec!["-k"]);
    }

    #[tokio::test]
    async fn test_missing_sudo_reports_incomplete_verification() {
        let config = SweepConfig {
            sudo_path: Some("/nonexistent/snapsweep-sudo".into()),
            ..SweepConfig::default()
        };
        let executor = SudoExecutor::from_config(&config);
        let cred = Credential::new("pw").unwrap();
        let err = executor.probe(&cred).await.unwrap_err();
        assert!(matches!(err, SweepError::VerificationIncomplete(_)));
    }

    #[tokio::test]
    async fn test_missing_sudo_delete_is_failure_output() {
        let config = SweepConfig {
            sudo_path: Some("/nonexistent/snapsweep-sudo".into()),
            ..SweepConfig::default()
        };
        let executor = SudoExecutor::from_config(&config);
        let cred = Credential::new("pw").unwrap();
        let target = Target::new("2024-05-01-120000").unwrap();
        let output = executor.delete(&target, &cred).await;
        assert!(!output.success);
        assert!(output.diagnostic().contains("failed to run"));
    }
}
