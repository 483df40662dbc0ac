/// Phrases `sudo` prints when it refuses a password on stock macOS/Linux in
/// an English locale.
pub const DEFAULT_REJECTION_PHRASES: &[&str] = &["Sorry", "incorrect password"];

/// Substring signatures that mark a privileged command's diagnostic output as
/// an authentication rejection.
///
/// Matching is case-insensitive. The phrases are locale and platform
/// dependent, so callers can extend the set from configuration.
#[derive(Debug, Clone)]
pub struct RejectionSignatures {
    phrases: Vec<String>,
}

impl Default for RejectionSignatures {
    fn default() -> Self {
        Self::new(DEFAULT_REJECTION_PHRASES.iter().copied())
    }
}

impl RejectionSignatures {
    /// Build a signature set from exactly the given phrases. Blank phrases are
    /// dropped since they would match everything.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sigs = Self {
            phrases: Vec::new(),
        };
        sigs.extend(phrases);
        sigs
    }

    /// Add more phrases on top of the current set.
    pub fn extend<I, S>(&mut self, phrases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for phrase in phrases {
            let phrase = phrase.as_ref().trim().to_lowercase();
            if !phrase.is_empty() && !self.phrases.contains(&phrase) {
                self.phrases.push(phrase);
            }
        }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Whether `diagnostic` contains any rejection phrase.
    pub fn is_auth_rejection(&self, diagnostic: &str) -> bool {
        let haystack = diagnostic.to_lowercase();
        self.phrases.iter().any(|p| haystack.contains(p.as_str()))
    }
}
