//! Credential resolution for the cloud providers.
//!
//! The core never reads environment variables mid-request; everything is
//! resolved once at startup into a [`GoogleCredentials`] handle and plain
//! strings, then injected into the service structs.

use crate::error::{MitraError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reference to a secret value, resolved at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretRef {
    /// No secret configured.
    #[default]
    None,
    /// Inline literal value (discouraged; use env/command when possible).
    Literal { value: String },
    /// Resolve from an environment variable.
    Env { var: String },
    /// Resolve by running a local command and trimming its stdout.
    Command { cmd: String },
}

impl SecretRef {
    /// Resolve the secret, returning `None` for the unset variants.
    ///
    /// A configured-but-missing env var is an error; an unset reference is
    /// not.
    pub fn resolve(&self) -> Result<Option<String>> {
        match self {
            Self::None => Ok(None),
            Self::Literal { value } => Ok(Some(value.clone())),
            Self::Env { var } => match std::env::var(var) {
                Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
                Ok(_) => Err(MitraError::Credentials(format!(
                    "secret env var is empty: {var}"
                ))),
                Err(_) => Ok(None),
            },
            Self::Command { cmd } => {
                if cmd.trim().is_empty() {
                    return Err(MitraError::Credentials(
                        "secret command is empty".to_owned(),
                    ));
                }
                let output = std::process::Command::new("/bin/sh")
                    .arg("-lc")
                    .arg(cmd)
                    .output()
                    .map_err(|e| {
                        MitraError::Credentials(format!("failed to run secret command: {e}"))
                    })?;
                if !output.status.success() {
                    return Err(MitraError::Credentials(format!(
                        "secret command failed with status {}",
                        output
                            .status
                            .code()
                            .map_or_else(|| "unknown".to_owned(), |c| c.to_string())
                    )));
                }
                let value = String::from_utf8_lossy(&output.stdout).trim().to_owned();
                if value.is_empty() {
                    return Err(MitraError::Credentials(
                        "secret command returned empty output".to_owned(),
                    ));
                }
                Ok(Some(value))
            }
        }
    }
}

/// Authenticated access to the Google Cloud STT/TTS APIs.
///
/// Built once at startup and shared by reference; the pipeline only asks
/// "is cloud STT/TTS available" and "give me a bearer token".
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    /// Service-account JSON path, when file-based credentials exist.
    credentials_path: Option<PathBuf>,
    /// OAuth bearer token for cloud-platform scope.
    access_token: String,
    /// Keeps an inline-JSON temp file alive for the process lifetime.
    _inline_file: Option<std::sync::Arc<tempfile::NamedTempFile>>,
}

impl GoogleCredentials {
    /// Resolve Google credentials from the environment:
    ///
    /// 1. `GOOGLE_APPLICATION_CREDENTIALS` pointing at an existing
    ///    service-account JSON file, or
    /// 2. `GOOGLE_CREDENTIALS_JSON` holding the JSON inline (cloud
    ///    deployments), materialized to a temp file, plus
    /// 3. an access token from `token_ref` (typically
    ///    `Env { var: "GOOGLE_ACCESS_TOKEN" }` or a `gcloud auth
    ///    print-access-token` command).
    ///
    /// Returns `Ok(None)` when no credentials are configured; cloud STT/TTS
    /// are then structurally unavailable.
    pub fn from_env(token_ref: &SecretRef) -> Result<Option<Self>> {
        let mut inline_file = None;
        let credentials_path = match std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            Ok(path) if Path::new(&path).exists() => Some(PathBuf::from(path)),
            _ => match std::env::var("GOOGLE_CREDENTIALS_JSON") {
                Ok(json) if !json.trim().is_empty() => {
                    serde_json::from_str::<serde_json::Value>(&json).map_err(|e| {
                        MitraError::Credentials(format!(
                            "GOOGLE_CREDENTIALS_JSON contains invalid JSON: {e}"
                        ))
                    })?;
                    let file = tempfile::Builder::new()
                        .prefix("google-credentials-")
                        .suffix(".json")
                        .tempfile()?;
                    std::fs::write(file.path(), json.as_bytes())?;
                    tracing::info!(
                        "materialized inline Google credentials to {}",
                        file.path().display()
                    );
                    let path = file.path().to_path_buf();
                    inline_file = Some(std::sync::Arc::new(file));
                    Some(path)
                }
                _ => None,
            },
        };

        let access_token = token_ref.resolve()?;
        match (credentials_path, access_token) {
            (Some(path), Some(token)) => Ok(Some(Self {
                credentials_path: Some(path),
                access_token: token,
                _inline_file: inline_file,
            })),
            // A token alone is enough to call the REST APIs.
            (None, Some(token)) => Ok(Some(Self {
                credentials_path: None,
                access_token: token,
                _inline_file: None,
            })),
            _ => {
                tracing::warn!(
                    "no Google credentials configured; cloud STT/TTS are disabled"
                );
                Ok(None)
            }
        }
    }

    /// Construct directly from a bearer token (tests, short-lived tools).
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            credentials_path: None,
            access_token: token.into(),
            _inline_file: None,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn credentials_path(&self) -> Option<&Path> {
        self.credentials_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    struct EnvGuard {
        key: &'static str,
        old: Option<std::ffi::OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let old = std::env::var_os(key);
            unsafe { std::env::set_var(key, value) };
            Self { key, old }
        }

        fn unset(key: &'static str) -> Self {
            let old = std::env::var_os(key);
            unsafe { std::env::remove_var(key) };
            Self { key, old }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old {
                Some(v) => unsafe { std::env::set_var(self.key, v) },
                None => unsafe { std::env::remove_var(self.key) },
            }
        }
    }

    #[test]
    fn literal_secret_resolves() {
        let secret = SecretRef::Literal {
            value: "abc".to_owned(),
        };
        assert_eq!(secret.resolve().unwrap(), Some("abc".to_owned()));
    }

    #[test]
    fn env_secret_resolves_and_unset_is_none() {
        let _set = EnvGuard::set("MITRA_TEST_SECRET", "tok-1");
        let secret = SecretRef::Env {
            var: "MITRA_TEST_SECRET".to_owned(),
        };
        assert_eq!(secret.resolve().unwrap(), Some("tok-1".to_owned()));

        let _unset = EnvGuard::unset("MITRA_TEST_SECRET_MISSING");
        let secret = SecretRef::Env {
            var: "MITRA_TEST_SECRET_MISSING".to_owned(),
        };
        assert_eq!(secret.resolve().unwrap(), None);
    }

    #[test]
    fn empty_env_secret_errors() {
        let _set = EnvGuard::set("MITRA_TEST_SECRET_EMPTY", "  ");
        let secret = SecretRef::Env {
            var: "MITRA_TEST_SECRET_EMPTY".to_owned(),
        };
        assert!(secret.resolve().is_err());
    }

    // Single test for the GOOGLE_* vars so parallel tests never interleave
    // on shared process environment.
    #[test]
    fn google_credential_resolution() {
        let _creds = EnvGuard::unset("GOOGLE_APPLICATION_CREDENTIALS");
        let _json = EnvGuard::unset("GOOGLE_CREDENTIALS_JSON");

        // Nothing configured: cloud is structurally unavailable.
        let result = GoogleCredentials::from_env(&SecretRef::None).unwrap();
        assert!(result.is_none());

        // Inline JSON must actually parse.
        let _bad = EnvGuard::set("GOOGLE_CREDENTIALS_JSON", "not json");
        let token = SecretRef::Literal {
            value: "tok".to_owned(),
        };
        assert!(GoogleCredentials::from_env(&token).is_err());
    }
}
