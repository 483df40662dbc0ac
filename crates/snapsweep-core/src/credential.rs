use std::fmt;

use zeroize::Zeroizing;

use crate::error::SweepError;

/// Administrator password scoped to a single run.
///
/// The secret is wiped from memory when the value is dropped. It is not
/// `Clone`; tasks borrow it (or share it through an `Arc`) for the lifetime
/// of the run and it is only ever written to a child process's stdin.
pub struct Credential {
    secret: Zeroizing<String>,
}

impl Credential {
    /// Validate and wrap a raw password.
    ///
    /// A single trailing line terminator (as read from stdin) is stripped.
    /// Empty or whitespace-only input is rejected without touching any
    /// privileged mechanism.
    pub fn new(raw: impl Into<String>) -> Result<Self, SweepError> {
        Self::from_secret(Zeroizing::new(raw.into()))
    }

    /// Like [`Credential::new`], for input that was read straight into a
    /// wiped-on-drop buffer.
    pub fn from_secret(mut secret: Zeroizing<String>) -> Result<Self, SweepError> {
        if secret.ends_with('\n') {
            secret.pop();
            if secret.ends_with('\r') {
                secret.pop();
            }
        }
        if secret.trim().is_empty() {
            return Err(SweepError::Validation("password must not be empty".into()));
        }
        Ok(Self { secret })
    }

    /// Bytes to write to a privileged process's stdin, newline-terminated.
    pub(crate) fn stdin_payload(&self) -> Zeroizing<Vec<u8>> {
        let mut payload = Zeroizing::new(Vec::with_capacity(self.secret.len() + 1));
        payload.extend_from_slice(self.secret.as_bytes());
        payload.push(b'\n');
        payload
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
