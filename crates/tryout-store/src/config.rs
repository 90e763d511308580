//! Application configuration and backend factory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use tryout_core::session::SessionConfig;

/// Where entities and accounts are kept.
///
/// The API key is masked in `Debug` output.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Process-local; everything is lost on exit.
    Memory,
    /// A single JSON document on disk.
    File {
        #[serde(default = "default_data_file")]
        path: PathBuf,
    },
    /// The hosted backend-as-a-service.
    Remote {
        base_url: String,
        app_id: String,
        #[serde(default)]
        api_key: String,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Memory => f.write_str("Memory"),
            StoreConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
            StoreConfig::Remote {
                base_url,
                app_id,
                api_key: _,
            } => f
                .debug_struct("Remote")
                .field("base_url", base_url)
                .field("app_id", app_id)
                .field("api_key", &"***")
                .finish(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: default_data_file(),
        }
    }
}

fn default_data_file() -> PathBuf {
    PathBuf::from("tryout-data.json")
}

/// Top-level tryout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryoutConfig {
    #[serde(default)]
    pub store: StoreConfig,
    /// File remembering the signed-in user between commands.
    #[serde(default = "default_context_file")]
    pub context_file: PathBuf,
    /// Accounts registered with these emails become administrators.
    #[serde(default)]
    pub admin_emails: Vec<String>,
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_context_file() -> PathBuf {
    PathBuf::from(".tryout-session.json")
}

impl Default for TryoutConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            context_file: default_context_file(),
            admin_emails: Vec::new(),
            session: SessionConfig::default(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut from = 0;
    while let Some(offset) = result[from..].find("${") {
        let start = from + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
        from = start + value.len();
    }
    result
}

fn resolve_store_config(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Memory => StoreConfig::Memory,
        StoreConfig::File { path } => StoreConfig::File {
            path: PathBuf::from(resolve_env_vars(&path.to_string_lossy())),
        },
        StoreConfig::Remote {
            base_url,
            app_id,
            api_key,
        } => StoreConfig::Remote {
            base_url: resolve_env_vars(base_url),
            app_id: resolve_env_vars(app_id),
            api_key: resolve_env_vars(api_key),
        },
    }
}

/// Apply `TRYOUT_DATA_FILE` and `TRYOUT_API_KEY` style overrides.
///
/// `TRYOUT_DATA_FILE` switches the store to a JSON file at that path;
/// `TRYOUT_API_KEY` replaces the key of a remote store.
fn apply_overrides(config: &mut TryoutConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(path) = var("TRYOUT_DATA_FILE").filter(|p| !p.is_empty()) {
        config.store = StoreConfig::File {
            path: PathBuf::from(path),
        };
    }
    if let Some(key) = var("TRYOUT_API_KEY") {
        if let StoreConfig::Remote { api_key, .. } = &mut config.store {
            *api_key = key;
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `tryout.toml` in the current directory
/// 2. `~/.config/tryout/config.toml`
///
/// Environment variable overrides: `TRYOUT_DATA_FILE`, `TRYOUT_API_KEY`.
pub fn load_config() -> Result<TryoutConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<TryoutConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("tryout.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => TryoutConfig::default(),
    };

    apply_overrides(&mut config, |name| std::env::var(name).ok());
    config.store = resolve_store_config(&config.store);

    Ok(config)
}

/// Parse configuration TOML.
pub fn parse_config(content: &str) -> Result<TryoutConfig> {
    Ok(toml::from_str(content)?)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("tryout"))
}

/// Starter configuration written by `tryout init`.
pub const STARTER_CONFIG: &str = r#"# tryout configuration

# Accounts registered with these emails become administrators.
admin_emails = []

# Remembers who is signed in between commands.
context_file = ".tryout-session.json"

[store]
type = "file"
path = "tryout-data.json"

# [store]
# type = "remote"
# base_url = "https://api.example.com"
# app_id = "your-app-id"
# api_key = "${TRYOUT_API_KEY}"

[session]
# "reset" restarts the per-question timer on every visit, "accumulate" keeps it.
revisit_policy = "reset"
expiry_grace_ms = 2000
question_limit = 200
"#;
