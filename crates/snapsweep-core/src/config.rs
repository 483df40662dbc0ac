use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::classify::RejectionSignatures;

/// Concurrency used when nothing (or nothing parsable) is configured.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Accepted concurrency range; configured values are clamped into it.
pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 5;

pub const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 10;

/// Environment variable pointing at a config file.
pub const CONFIG_ENV: &str = "SNAPSWEEP_CONFIG";

/// Environment variable overriding the configured concurrency.
pub const CONCURRENCY_ENV: &str = "SNAPSWEEP_CONCURRENCY";

const CONFIG_DIR_NAME: &str = "snapsweep";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Concurrency as written in the config file: a number, a string that
/// should parse as one, or any other YAML value (reported as unparsable).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ConcurrencySetting {
    Number(i64),
    Text(String),
    Other(yaml_serde::Value),
}

impl fmt::Display for ConcurrencySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
            Self::Other(value) => match yaml_serde::to_string(value) {
                Ok(rendered) => f.write_str(rendered.trim_end()),
                Err(_) => f.write_str("<unrepresentable>"),
            },
        }
    }
}

/// User preferences read from `config.yaml`.
///
/// Every field is optional; accessors apply the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SweepConfig {
    /// Maximum number of deletions in flight at once (clamped to 1..=5).
    pub concurrency: Option<ConcurrencySetting>,

    /// Extra phrases that mark a password rejection, on top of the defaults.
    /// Useful for non-English sudo builds.
    pub rejection_phrases: Vec<String>,

    /// Privilege-escalation program (default: `sudo`).
    pub sudo_path: Option<String>,

    /// Snapshot tool (default: `tmutil`).
    pub tool_path: Option<String>,

    /// Tool subcommand that deletes one snapshot (default: `deletelocalsnapshots`).
    pub delete_verb: Option<String>,

    /// Tool arguments that list snapshots (default: `listlocalsnapshotdates /`).
    pub list_args: Option<Vec<String>>,

    /// Upper bound for the password probe, in seconds (default: 10).
    pub verify_timeout_secs: Option<u64>,

    /// Per-snapshot deletion timeout in seconds (default: none).
    pub delete_timeout_secs: Option<u64>,
}

/// A loaded config plus where it came from.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: SweepConfig,
    /// `None` when no file was found and defaults are in effect.
    pub source: Option<PathBuf>,
}

impl SweepConfig {
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        yaml_serde::from_str(content).context("Failed to parse config")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config at {}", path.display()))
    }

    /// Load the config following the lookup order: explicit path, then
    /// `SNAPSWEEP_CONFIG`, then the per-user config directory. Missing
    /// default file means defaults; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
        let default_path = dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
        let Some(path) = locate(explicit, std::env::var_os(CONFIG_ENV), default_path)? else {
            return Ok(LoadedConfig::default());
        };
        Ok(LoadedConfig {
            config: Self::from_path(&path)?,
            source: Some(path),
        })
    }

    /// Default rejection phrases plus any configured ones.
    pub fn rejection_signatures(&self) -> RejectionSignatures {
        let mut signatures = RejectionSignatures::default();
        signatures.extend(&self.rejection_phrases);
        signatures
    }

    pub fn sudo_program(&self) -> &str {
        self.sudo_path.as_deref().unwrap_or("sudo")
    }

    pub fn tool_program(&self) -> &str {
        self.tool_path.as_deref().unwrap_or("tmutil")
    }

    pub fn delete_verb(&self) -> &str {
        self.delete_verb.as_deref().unwrap_or("deletelocalsnapshots")
    }

    pub fn list_args(&self) -> Vec<String> {
        self.list_args
            .clone()
            .unwrap_or_else(|| vec!["listlocalsnapshotdates".to_string(), "/".to_string()])
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(
            self.verify_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_VERIFY_TIMEOUT_SECS),
        )
    }

    pub fn delete_timeout(&self) -> Option<Duration> {
        self.delete_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    /// Resolve the effective concurrency. Precedence: `cli`, then `env`
    /// (the `SNAPSWEEP_CONCURRENCY` value), then the config file.
    ///
    /// Returns the value and any warnings about ignored or clamped input.
    pub fn effective_concurrency(
        &self,
        env: Option<&str>,
        cli: Option<usize>,
    ) -> (usize, Vec<String>) {
        let raw = match (cli, env) {
            (Some(n), _) => Some(n.to_string()),
            (None, Some(e)) => Some(e.to_string()),
            (None, None) => self.concurrency.as_ref().map(|c| c.to_string()),
        };
        let (value, warning) = resolve_concurrency(raw.as_deref());
        (value, warning.into_iter().collect())
    }
}

/// Parse and clamp a raw concurrency value.
///
/// Absent or unparsable input yields [`DEFAULT_CONCURRENCY`]; out-of-range
/// numbers are clamped into `MIN_CONCURRENCY..=MAX_CONCURRENCY`.
pub fn resolve_concurrency(raw: Option<&str>) -> (usize, Option<String>) {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return (DEFAULT_CONCURRENCY, None);
    };

    match raw.parse::<i64>() {
        Ok(n) => {
            let clamped = n.clamp(MIN_CONCURRENCY as i64, MAX_CONCURRENCY as i64) as usize;
            if clamped as i64 != n {
                (
                    clamped,
                    Some(format!(
                        "Concurrency {} is outside {}..={}, using {}",
                        n, MIN_CONCURRENCY, MAX_CONCURRENCY, clamped
                    )),
                )
            } else {
                (clamped, None)
            }
        }
        Err(_) => (
            DEFAULT_CONCURRENCY,
            Some(format!(
                "Ignoring unparsable concurrency '{}', using {}",
                raw, DEFAULT_CONCURRENCY
            )),
        ),
    }
}

/// Pick the config file to read, if any.
fn locate(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    default_path: Option<PathBuf>,
) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("Config file not found: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        let path = PathBuf::from(value);
        if !path.is_file() {
            bail!("{} points to a missing file: {}", CONFIG_ENV, path.display());
        }
        return Ok(Some(path));
    }

    Ok(default_path.filter(|p| p.is_file()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_concurrency_defaults() {
        assert_eq!(resolve_concurrency(None), (3, None));
        assert_eq!(resolve_concurrency(Some("")), (3, None));
        assert_eq!(resolve_concurrency(Some("  ")), (3, None));
    }

    #[test]
    fn test_resolve_concurrency_in_range() {
        for n in 1..=5 {
            assert_eq!(resolve_concurrency(Some(&n.to_string())), (n, None));
        }
        assert_eq!(resolve_concurrency(Some(" 4 ")), (4, None));
    }

    #[test]
    fn test_resolve_concurrency_clamps() {
        let (value, warning) = resolve_concurrency(Some("50"));
        assert_eq!(value, 5);
        assert!(warning.unwrap().contains("outside"));

        let (value, warning) = resolve_concurrency(Some("0"));
        assert_eq!(value, 1);
        assert!(warning.is_some());

        let (value, _) = resolve_concurrency(Some("-3"));
        assert_eq!(value, 1);
    }

    #[test]
    fn test_resolve_concurrency_unparsable() {
        let (value, warning) = resolve_concurrency(Some("lots"));
        assert_eq!(value, DEFAULT_CONCURRENCY);
        assert!(warning.unwrap().contains("unparsable"));
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
concurrency: "4"
rejectionPhrases:
  - "Mot de passe incorrect"
sudoPath: /usr/bin/sudo
toolPath: /usr/bin/tmutil
deleteVerb: deletelocalsnapshots
listArgs: ["listlocalsnapshotdates", "/Volumes/Data"]
verifyTimeoutSecs: 5
deleteTimeoutSecs: 120
"#;
        let config = SweepConfig::parse(yaml).unwrap();
        assert_eq!(
            config.concurrency,
            Some(ConcurrencySetting::Text("4".into()))
        );
        assert_eq!(config.rejection_phrases, vec!["Mot de passe incorrect"]);
        assert_eq!(config.sudo_program(), "/usr/bin/sudo");
        assert_eq!(config.tool_program(), "/usr/bin/tmutil");
        assert_eq!(config.list_args(), vec!["listlocalsnapshotdates", "/Volumes/Data"]);
        assert_eq!(config.verify_timeout(), Duration::from_secs(5));
        assert_eq!(config.delete_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_rejection_signatures_extend_defaults() {
        let config = SweepConfig::parse("rejectionPhrases: [\"Mot de passe incorrect\"]\n").unwrap();
        let signatures = config.rejection_signatures();
        assert!(signatures.is_auth_rejection("Sorry, try again."));
        assert!(signatures.is_auth_rejection("Mot de passe incorrect"));
    }

    #[test]
    fn test_parse_numeric_concurrency() {
        let config = SweepConfig::parse("concurrency: 2\n").unwrap();
        assert_eq!(config.concurrency, Some(ConcurrencySetting::Number(2)));
        assert_eq!(config.effective_concurrency(None, None), (2, vec![]));
    }

    #[test]
    fn test_defaults() {
        let config = SweepConfig::parse("").unwrap();
        assert_eq!(config.sudo_program(), "sudo");
        assert_eq!(config.tool_program(), "tmutil");
        assert_eq!(config.delete_verb(), "deletelocalsnapshots");
        assert_eq!(config.list_args(), vec!["listlocalsnapshotdates", "/"]);
        assert_eq!(config.verify_timeout(), Duration::from_secs(10));
        assert_eq!(config.delete_timeout(), None);
        assert_eq!(config.effective_concurrency(None, None).0, 3);
    }

    #[test]
    fn test_zero_timeouts_fall_back() {
        let config = SweepConfig::parse("verifyTimeoutSecs: 0\ndeleteTimeoutSecs: 0\n").unwrap();
        assert_eq!(config.verify_timeout(), Duration::from_secs(10));
        assert_eq!(config.delete_timeout(), None);
    }

    #[test]
    fn test_effective_concurrency_precedence() {
        let config = SweepConfig::parse("concurrency: 2\n").unwrap();
        assert_eq!(config.effective_concurrency(Some("4"), None).0, 4);
        assert_eq!(config.effective_concurrency(Some("4"), Some(1)).0, 1);

        let (value, warnings) = config.effective_concurrency(None, Some(9));
        assert_eq!(value, 5);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_non_integer_concurrency_falls_back_with_warning() {
        for yaml in ["concurrency: 2.5\n", "concurrency: true\n", "concurrency: [1, 2]\n"] {
            let config = SweepConfig::parse(yaml).unwrap();
            assert!(matches!(config.concurrency, Some(ConcurrencySetting::Other(_))));

            let (value, warnings) = config.effective_concurrency(None, None);
            assert_eq!(value, DEFAULT_CONCURRENCY, "{yaml}");
            assert_eq!(warnings.len(), 1);
            assert!(warnings[0].contains("unparsable"));
        }
    }

    #[test]
    fn test_non_integer_concurrency_keeps_other_settings() {
        let config = SweepConfig::parse("concurrency: 2.5\nsudoPath: /opt/sudo\n").unwrap();
        assert_eq!(config.sudo_program(), "/opt/sudo");
        assert_eq!(
            config.concurrency.map(|c| c.to_string()),
            Some("2.5".to_string())
        );
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(SweepConfig::parse("concurrency: [1, 2").is_err());
    }

    #[test]
    fn test_locate_explicit_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(locate(Some(&missing), None, None).is_err());
    }

    #[test]
    fn test_locate_precedence() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("explicit.yaml");
        let from_env = dir.path().join("env.yaml");
        let default = dir.path().join("default.yaml");
        for p in [&explicit, &from_env, &default] {
            fs::write(p, "concurrency: 1\n").unwrap();
        }

        let found = locate(
            Some(&explicit),
            Some(from_env.clone().into_os_string()),
            Some(default.clone()),
        )
        .unwrap();
        assert_eq!(found, Some(explicit.clone()));

        let found = locate(
            None,
            Some(from_env.clone().into_os_string()),
            Some(default.clone()),
        )
        .unwrap();
        assert_eq!(found, Some(from_env));

        let found = locate(None, None, Some(default.clone())).unwrap();
        assert_eq!(found, Some(default));
    }

    #[test]
    fn test_locate_missing_default_means_defaults() {
        let dir = TempDir::new().unwrap();
        let found = locate(None, None, Some(dir.path().join("config.yaml"))).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "concurrency: \"5\"\n").unwrap();
        let config = SweepConfig::from_path(&path).unwrap();
        assert_eq!(config.effective_concurrency(None, None).0, 5);
    }
}
