//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `SCUBACTL_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `SCUBACTL_` override YAML values
//! 3. **Well-known deployment variables** - `DATABASE_URL`, `SECRET_KEY`, `JWT_SECRET_KEY`,
//!    `GROQ_API_KEY`, `GROQ_MODEL`, `CORS_ORIGIN` and `ADMIN_INITIAL_PASSWORD` are honored
//!    without a prefix, matching what the deployment environment already exports.
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `SCUBACTL_GROQ__MODEL=llama3-70b-8192` sets the `groq.model` field.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "SCUBACTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// PostgreSQL connection string
    pub database_url: String,
    /// Secret key used for JWT signing when `jwt_secret_key` is unset
    pub secret_key: Option<String>,
    /// Dedicated JWT signing key (falls back to `secret_key`)
    pub jwt_secret_key: Option<String>,
    /// Allowed CORS origin ("*" for any)
    pub cors_origin: String,
    /// Initial admin user created on first startup
    pub admin: AdminConfig,
    /// Authentication behavior (registration, password rules, token lifetimes)
    pub auth: AuthConfig,
    /// Groq API client settings
    pub groq: GroqConfig,
}

/// Initial admin user, seeded idempotently at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminConfig {
    pub username: String,
    pub email: String,
    /// Password for the initial admin user (optional, usually set via ADMIN_INITIAL_PASSWORD)
    pub initial_password: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            email: "admin@scuba.local".to_string(),
            initial_password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Whether new accounts can self-register
    pub allow_registration: bool,
    /// Password length rules
    pub password: PasswordConfig,
    /// Access token lifetime
    #[serde(with = "humantime_serde")]
    pub access_token_expiry: Duration,
    /// Refresh token lifetime
    #[serde(with = "humantime_serde")]
    pub refresh_token_expiry: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_registration: true,
            password: PasswordConfig::default(),
            access_token_expiry: Duration::from_secs(3600),            // 1 hour
            refresh_token_expiry: Duration::from_secs(30 * 24 * 3600), // 30 days
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 6,
            max_length: 128,
        }
    }
}

/// Groq chat-completions client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroqConfig {
    /// API key (required for chat endpoints to function)
    pub api_key: Option<String>,
    /// Model name passed to the completions endpoint
    pub model: String,
    /// Base URL of the OpenAI-compatible API
    pub base_url: Url,
    /// Request timeout for completion calls
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "llama3-8b-8192".to_string(),
            base_url: Url::parse("https://api.groq.com/openai/v1").expect("valid default Groq URL"),
            timeout: Duration::from_secs(60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            database_url: "postgresql://localhost/scubactl".to_string(),
            secret_key: None,
            jwt_secret_key: None,
            cors_origin: "*".to_string(),
            admin: AdminConfig::default(),
            auth: AuthConfig::default(),
            groq: GroqConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the YAML file and environment overrides.
    pub fn load(args: &Args) -> Result<Self, Error> {
        let figment = Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("SCUBACTL_").split("__"));

        let mut config: Config = figment.extract().map_err(|e| Error::Internal {
            operation: format!("load configuration: {e}"),
        })?;

        // Well-known deployment variables override the file without a prefix.
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(secret) = std::env::var("SECRET_KEY") {
            config.secret_key = Some(secret);
        }
        if let Ok(secret) = std::env::var("JWT_SECRET_KEY") {
            config.jwt_secret_key = Some(secret);
        }
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            config.groq.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("GROQ_MODEL") {
            config.groq.model = model;
        }
        if let Ok(origin) = std::env::var("CORS_ORIGIN") {
            config.cors_origin = origin;
        }
        if let Ok(password) = std::env::var("ADMIN_INITIAL_PASSWORD") {
            config.admin.initial_password = Some(password);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.jwt_secret_key.is_none() && self.secret_key.is_none() {
            return Err(Error::Internal {
                operation: "validate configuration: SECRET_KEY or JWT_SECRET_KEY must be set".to_string(),
            });
        }
        Ok(())
    }

    /// The key used for JWT signing and verification.
    pub fn jwt_secret(&self) -> Result<&str, Error> {
        self.jwt_secret_key
            .as_deref()
            .or(self.secret_key.as_deref())
            .ok_or_else(|| Error::Internal {
                operation: "JWT sessions: secret_key is required".to_string(),
            })
    }

    /// Socket address string the server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.auth.access_token_expiry, Duration::from_secs(3600));
        assert_eq!(config.auth.refresh_token_expiry, Duration::from_secs(30 * 24 * 3600));
        assert_eq!(config.groq.model, "llama3-8b-8192");
        assert_eq!(config.cors_origin, "*");
    }

    #[test]
    fn test_jwt_secret_fallback() {
        let mut config = Config {
            secret_key: Some("base-secret".to_string()),
            ..Default::default()
        };
        assert_eq!(config.jwt_secret().unwrap(), "base-secret");

        config.jwt_secret_key = Some("jwt-secret".to_string());
        assert_eq!(config.jwt_secret().unwrap(), "jwt-secret");
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let config = Config::default();
        assert!(config.validate().is_err());
        assert!(config.jwt_secret().is_err());
    }

    #[test]
    fn test_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                port: 9000
                secret_key: file-secret
                groq:
                  model: from-file
                "#,
            )?;
            jail.set_env("DATABASE_URL", "postgresql://db.internal/scuba");
            jail.set_env("GROQ_MODEL", "llama3-70b-8192");
            jail.set_env("ADMIN_INITIAL_PASSWORD", "scubaadmin");

            let args = Args {
                config: "config.yaml".to_string(),
                validate: false,
            };
            let config = Config::load(&args).expect("config should load");

            assert_eq!(config.port, 9000);
            assert_eq!(config.database_url, "postgresql://db.internal/scuba");
            assert_eq!(config.groq.model, "llama3-70b-8192");
            assert_eq!(config.admin.initial_password.as_deref(), Some("scubaadmin"));
            Ok(())
        });
    }

    #[test]
    fn test_nested_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "secret_key: s\n")?;
            jail.set_env("SCUBACTL_AUTH__ALLOW_REGISTRATION", "false");

            let args = Args {
                config: "config.yaml".to_string(),
                validate: false,
            };
            let config = Config::load(&args).expect("config should load");
            assert!(!config.auth.allow_registration);
            Ok(())
        });
    }
}
