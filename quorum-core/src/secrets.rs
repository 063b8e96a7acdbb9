//! Credentials for remote change trackers
//!
//! Kept apart from `config.toml` so configuration can be shared freely. The
//! file lives at `~/.config/quorum/secrets.toml` and must not be readable by
//! group or others on Unix.
//!
//! Lookup order for the GitHub token:
//! 1. `GITHUB_TOKEN` environment variable
//! 2. `[github] token` in the secrets file

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Environment variable holding a GitHub token
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    pub github: GitHubSecrets,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubSecrets {
    /// Token used to request reviews and read teams
    pub token: Option<String>,
}

impl Secrets {
    /// Load from the default location, empty if there is no file
    pub fn load() -> Result<Self> {
        match Self::default_secrets_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load a secrets file, refusing one with loose permissions
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = std::fs::metadata(path).map_err(Error::Io)?.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }
        }

        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;
        secrets.github.token = secrets
            .github
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        debug!(path = %path.display(), "Loaded secrets");
        Ok(secrets)
    }

    /// `~/.config/quorum/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("quorum").join("secrets.toml"))
    }

    /// GitHub token, environment first
    pub fn github_token(&self) -> Option<String> {
        self.github_token_with(std::env::var(GITHUB_TOKEN_VAR).ok())
    }

    fn github_token_with(&self, from_env: Option<String>) -> Option<String> {
        if let Some(token) = from_env.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            debug!("Using GitHub token from {}", GITHUB_TOKEN_VAR);
            return Some(token);
        }
        self.github.token.clone().filter(|t| !t.is_empty())
    }

    /// Write an empty secrets file with owner-only permissions
    pub fn create_template(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(Error::Config(format!(
                "Secrets file already exists at {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        let template = r#"# Quorum secrets - do not commit or share
#
# This file must be readable by its owner only (chmod 600)

[github]
# Needs pull request read/write and organisation team read access
token = ""
"#;
        std::fs::write(path, template).map_err(Error::Io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(Error::Io)?;
        }

        warn!(path = %path.display(), "Created secrets template, add your GitHub token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_env_token_wins_over_file() {
        let secrets = Secrets {
            github: GitHubSecrets {
                token: Some("from_file".to_string()),
            },
        };
        assert_eq!(
            secrets.github_token_with(Some(" from_env \n".to_string())),
            Some("from_env".to_string())
        );
        assert_eq!(secrets.github_token_with(Some("  ".to_string())), Some("from_file".to_string()));
        assert_eq!(Secrets::default().github_token_with(None), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_insecure_permissions_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[github]\ntoken = \"test\"").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = Secrets::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("insecure permissions"));
    }

    #[cfg(unix)]
    #[test]
    fn test_token_is_trimmed() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[github]\ntoken = \"  ghp_test  \"").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();

        let secrets = Secrets::load_from_file(file.path()).unwrap();
        assert_eq!(secrets.github.token, Some("ghp_test".to_string()));
    }

    #[test]
    fn test_template_is_loadable_and_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quorum").join("secrets.toml");

        Secrets::create_template(&path).unwrap();
        let secrets = Secrets::load_from_file(&path).unwrap();
        assert!(secrets.github.token.is_none());

        assert!(Secrets::create_template(&path).is_err());
    }
}
