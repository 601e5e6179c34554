use crate::domain::{ConnectionKind, Credential, CredentialSource, DomainError, DomainResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Loads credentials from `<dir>/.<application>.credentials`, falling back to
/// the `<APPLICATION>_CREDENTIALS` environment variable.
///
/// Both sources hold a flat JSON object of strings.
#[derive(Debug, Clone)]
pub struct FileCredentialSource {
    credentials_dir: PathBuf,
}

impl FileCredentialSource {
    pub fn new(credentials_dir: impl Into<PathBuf>) -> Self {
        Self {
            credentials_dir: credentials_dir.into(),
        }
    }

    pub fn credentials_file(&self, application_name: &str) -> PathBuf {
        self.credentials_dir
            .join(format!(".{}.credentials", application_name))
    }

    /// Environment variable consulted when no credential file exists
    pub fn env_var_name(application_name: &str) -> String {
        let sanitized: String = application_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_CREDENTIALS", sanitized)
    }

    async fn read_source(&self, application_name: &str) -> DomainResult<String> {
        let path = self.credentials_file(application_name);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                debug!(application = %application_name, path = %path.display(), "read credential file");
                Ok(raw)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let var = Self::env_var_name(application_name);
                std::env::var(&var).map_err(|_| DomainError::Authentication {
                    application: application_name.to_string(),
                    reason: format!(
                        "no credential file at {} and {} is not set",
                        path.display(),
                        var
                    ),
                })
            }
            Err(e) => Err(DomainError::Authentication {
                application: application_name.to_string(),
                reason: format!("unable to read {}: {}", path.display(), e),
            }),
        }
    }
}

fn parse_object(raw: &str, application_name: &str) -> DomainResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DomainError::Authentication {
            application: application_name.to_string(),
            reason: "credentials must be a JSON object".to_string(),
        }),
        Err(e) => Err(DomainError::Authentication {
            application: application_name.to_string(),
            reason: format!("malformed credentials: {}", e),
        }),
    }
}

#[async_trait]
impl CredentialSource for FileCredentialSource {
    async fn load(&self, application_name: &str, kind: ConnectionKind) -> DomainResult<Credential> {
        let raw = self.read_source(application_name).await?;
        let object = parse_object(&raw, application_name)?;

        // Network-server credentials are keyed by application, one API key each
        if kind == ConnectionKind::Subscription {
            if let Some(Value::String(api_key)) = object.get(application_name) {
                return Ok([
                    ("username", application_name.to_string()),
                    ("password", api_key.clone()),
                ]
                .into_iter()
                .collect());
            }
        }

        let credential: Credential = object
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                Value::Number(n) => Some((k, n.to_string())),
                _ => None,
            })
            .collect();

        if credential.is_empty() {
            return Err(DomainError::Authentication {
                application: application_name.to_string(),
                reason: "credentials are empty".to_string(),
            });
        }
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_env_var_name_sanitizes() {
        assert_eq!(
            FileCredentialSource::env_var_name("room-120.netatmo"),
            "ROOM_120_NETATMO_CREDENTIALS"
        );
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".netatmo.credentials"),
            r#"{"CLIENT_ID": "1", "CLIENT_SECRET": "2", "REFRESH_TOKEN": "3"}"#,
        )
        .unwrap();

        let source = FileCredentialSource::new(dir.path());
        let credential = source.load("netatmo", ConnectionKind::Polling).await.unwrap();
        assert_eq!(credential.get("CLIENT_ID"), Some("1"));
        assert_eq!(credential.get("REFRESH_TOKEN"), Some("3"));
    }

    #[tokio::test]
    async fn test_subscription_selects_application_key() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".app1.credentials"),
            r#"{"app1": "12345qwerty", "app2": "0987asdf"}"#,
        )
        .unwrap();

        let source = FileCredentialSource::new(dir.path());
        let credential = source.load("app1", ConnectionKind::Subscription).await.unwrap();
        assert_eq!(credential.get("username"), Some("app1"));
        assert_eq!(credential.get("password"), Some("12345qwerty"));
    }

    #[tokio::test]
    async fn test_missing_source_is_authentication_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileCredentialSource::new(dir.path());
        let result = source
            .load("no-such-application-x9", ConnectionKind::Polling)
            .await;
        assert!(matches!(result, Err(DomainError::Authentication { .. })));
    }

    #[tokio::test]
    async fn test_falls_back_to_environment() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("ENV_ONLY_X7_CREDENTIALS", r#"{"access_token": "abc"}"#);

        let source = FileCredentialSource::new(dir.path());
        let credential = source.load("env-only-x7", ConnectionKind::Polling).await;
        std::env::remove_var("ENV_ONLY_X7_CREDENTIALS");

        assert_eq!(credential.unwrap().get("access_token"), Some("abc"));
    }

    #[tokio::test]
    async fn test_malformed_file_is_authentication_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".broken.credentials"), "[1, 2, 3]").unwrap();

        let source = FileCredentialSource::new(dir.path());
        let result = source.load("broken", ConnectionKind::Polling).await;
        assert!(matches!(result, Err(DomainError::Authentication { .. })));
    }
}
