pub mod delete;
pub mod list;
pub mod verify;

use std::io::{BufRead, Read};

use anyhow::{Context, Result, bail};
use zeroize::Zeroizing;

/// Longest accepted password line, terminator included. The buffer is
/// allocated once at this size so reading never reallocates it.
const PASSWORD_BUF_CAPACITY: usize = 1024;

/// Read the administrator password from the first line of stdin.
///
/// Returns the line as read (terminator included); validation happens in
/// the core so that empty input is reported consistently.
pub fn read_password() -> Result<Zeroizing<String>> {
    read_password_from(std::io::stdin().lock())
}

fn read_password_from(reader: impl BufRead) -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::with_capacity(PASSWORD_BUF_CAPACITY));
    reader
        .take(PASSWORD_BUF_CAPACITY as u64)
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    if line.len() == PASSWORD_BUF_CAPACITY && !line.ends_with('\n') {
        bail!("Password longer than {} bytes", PASSWORD_BUF_CAPACITY - 1);
    }
    Ok(line)
}
