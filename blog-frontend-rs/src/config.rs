use std::time::Duration;

use crate::error::ConfigError;

/// Connection settings for the hosted backend, in the shape the backend's console hands them out.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendCredentials {
    pub api_key: String,
    pub project_id: String,
    #[serde(default)]
    pub auth_domain: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub auth: Duration,
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            auth: Duration::from_secs(20),
            write: Duration::from_secs(15),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Namespaces all data of this deployment: `artifacts/{application_id}/...`
    pub application_id: String,
    pub credentials: BackendCredentials,
    /// Pre-issued sign-in token. Without one, users are signed in anonymously.
    pub bootstrap_token: Option<String>,
    pub timeouts: Timeouts,
}

pub const APP_ID_VAR: &str = "BLOG_APP_ID";
pub const API_KEY_VAR: &str = "BLOG_API_KEY";
pub const PROJECT_ID_VAR: &str = "BLOG_PROJECT_ID";
pub const AUTH_DOMAIN_VAR: &str = "BLOG_AUTH_DOMAIN";
pub const AUTH_TOKEN_VAR: &str = "BLOG_AUTH_TOKEN";
pub const AUTH_TIMEOUT_VAR: &str = "BLOG_AUTH_TIMEOUT_SECS";
pub const WRITE_TIMEOUT_VAR: &str = "BLOG_WRITE_TIMEOUT_SECS";

impl AppConfig {
    pub fn new(application_id: impl Into<String>, credentials: BackendCredentials) -> Self {
        Self {
            application_id: application_id.into(),
            credentials,
            bootstrap_token: None,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_bootstrap_token(mut self, token: Option<String>) -> Self {
        self.bootstrap_token = token.filter(|token| !token.trim().is_empty());
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_id.trim().is_empty() {
            return Err(ConfigError::Missing("application id"));
        }
        if self.application_id.contains('/') {
            return Err(ConfigError::Invalid {
                name: "application id",
                reason: "must not contain '/'".to_string(),
            });
        }
        if self.credentials.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("api key"));
        }
        if self.credentials.project_id.trim().is_empty() {
            return Err(ConfigError::Missing("project id"));
        }
        if self.timeouts.auth.is_zero() || self.timeouts.write.is_zero() {
            return Err(ConfigError::Invalid {
                name: "timeouts",
                reason: "must be longer than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Builds the config from the values a host page injects: the application id, the backend
    /// credentials as JSON, and an optional sign-in token.
    pub fn from_json(
        application_id: &str,
        credentials_json: &str,
        bootstrap_token: Option<String>,
    ) -> Result<Self, ConfigError> {
        let credentials: BackendCredentials = serde_json::from_str(credentials_json)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config = Self::new(application_id, credentials).with_bootstrap_token(bootstrap_token);
        config.validate()?;
        Ok(config)
    }

    /// Reads `BLOG_*` variables, loading a `.env` file first if there is one.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env file loaded: {e}");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let seconds = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(name) {
                None => Ok(default),
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| ConfigError::Invalid {
                        name,
                        reason: e.to_string(),
                    }),
            }
        };

        let credentials = BackendCredentials {
            api_key: required(API_KEY_VAR)?,
            project_id: required(PROJECT_ID_VAR)?,
            auth_domain: lookup(AUTH_DOMAIN_VAR),
        };
        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            auth: seconds(AUTH_TIMEOUT_VAR, defaults.auth)?,
            write: seconds(WRITE_TIMEOUT_VAR, defaults.write)?,
        };

        let config = Self::new(required(APP_ID_VAR)?, credentials)
            .with_bootstrap_token(lookup(AUTH_TOKEN_VAR))
            .with_timeouts(timeouts);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn credentials() -> BackendCredentials {
        BackendCredentials {
            api_key: "key".into(),
            project_id: "project".into(),
            auth_domain: None,
        }
    }

    #[test]
    fn test_from_json() {
        let config = AppConfig::from_json(
            "app1",
            r#"{"apiKey":"key","projectId":"project","authDomain":"project.example.com"}"#,
            Some("".into()),
        )
        .unwrap();
        assert_eq!(config.application_id, "app1");
        assert_eq!(
            config.credentials.auth_domain.as_deref(),
            Some("project.example.com")
        );
        // blank tokens mean "sign in anonymously"
        assert_eq!(config.bootstrap_token, None);
        assert_eq!(config.timeouts, Timeouts::default());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            AppConfig::from_json("app1", "not json", None),
            Err(ConfigError::Parse(_))
        ));
        assert_eq!(
            AppConfig::from_json("app1", r#"{"apiKey":"","projectId":"p"}"#, None),
            Err(ConfigError::Missing("api key"))
        );
    }

    #[test]
    fn test_validate() {
        assert_eq!(AppConfig::new("app1", credentials()).validate(), Ok(()));
        assert_eq!(
            AppConfig::new(" ", credentials()).validate(),
            Err(ConfigError::Missing("application id"))
        );
        assert!(matches!(
            AppConfig::new("a/b", credentials()).validate(),
            Err(ConfigError::Invalid { .. })
        ));
        let no_project = BackendCredentials {
            project_id: String::new(),
            ..credentials()
        };
        assert_eq!(
            AppConfig::new("app1", no_project).validate(),
            Err(ConfigError::Missing("project id"))
        );
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (APP_ID_VAR, "app1"),
            (API_KEY_VAR, "key"),
            (PROJECT_ID_VAR, "project"),
            (AUTH_TOKEN_VAR, "token-123"),
            (WRITE_TIMEOUT_VAR, "3"),
        ]);
        let config = AppConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.bootstrap_token.as_deref(), Some("token-123"));
        assert_eq!(config.timeouts.write, Duration::from_secs(3));
        assert_eq!(config.timeouts.auth, Timeouts::default().auth);

        let missing = AppConfig::from_lookup(|name| {
            (name != APP_ID_VAR)
                .then(|| vars.get(name).map(|v| v.to_string()))
                .flatten()
        });
        assert_eq!(missing, Err(ConfigError::Missing(APP_ID_VAR)));

        let bad_timeout = AppConfig::from_lookup(|name| {
            if name == AUTH_TIMEOUT_VAR {
                Some("soon".to_string())
            } else {
                vars.get(name).map(|v| v.to_string())
            }
        });
        assert!(matches!(
            bad_timeout,
            Err(ConfigError::Invalid {
                name: AUTH_TIMEOUT_VAR,
                ..
            })
        ));
    }
}
