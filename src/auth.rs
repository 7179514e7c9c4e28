//! Download credentials.
//!
//! The catalog hands out a token in exchange for a username and password.
//! Only the username and that token are persisted, in the game's own
//! `player-data.json`, so the game and this tool share one login.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
#[cfg(test)]
use mockall::automock;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Error;
use crate::provider::ModCatalog;
use crate::runtime::Runtime;

pub const PLAYER_DATA_FILE: &str = "player-data.json";

const USERNAME_KEY: &str = "service-username";
const TOKEN_KEY: &str = "service-token";

/// Maximum number of username/password rounds per login.
pub const MAX_LOGIN_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

#[cfg_attr(test, automock)]
pub trait CredentialStore: Send + Sync {
    /// Stored credentials, if both username and token are present.
    fn get(&self) -> Result<Option<Credentials>>;

    /// The last username used, even without a token.
    fn username(&self) -> Result<Option<String>>;

    fn save(&self, credentials: &Credentials) -> Result<()>;
}

/// Credential store backed by `player-data.json` in the game's write path.
/// Unrelated fields of the file are preserved on save.
pub struct PlayerDataStore<R: Runtime> {
    runtime: Arc<R>,
    path: PathBuf,
}

impl<R: Runtime> PlayerDataStore<R> {
    pub fn new(runtime: Arc<R>, write_path: &Path) -> Self {
        Self {
            runtime,
            path: write_path.join(PLAYER_DATA_FILE),
        }
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.runtime.exists(&self.path) {
            return Ok(Map::new());
        }
        let content = self.runtime.read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", self.path))
    }

    fn field(data: &Map<String, Value>, key: &str) -> Option<String> {
        data.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

impl<R: Runtime> CredentialStore for PlayerDataStore<R> {
    fn get(&self) -> Result<Option<Credentials>> {
        let data = self.load()?;
        Ok(
            match (Self::field(&data, USERNAME_KEY), Self::field(&data, TOKEN_KEY)) {
                (Some(username), Some(token)) => Some(Credentials { username, token }),
                _ => None,
            },
        )
    }

    fn username(&self) -> Result<Option<String>> {
        Ok(Self::field(&self.load()?, USERNAME_KEY))
    }

    #[tracing::instrument(skip(self, credentials))]
    fn save(&self, credentials: &Credentials) -> Result<()> {
        let mut data = self.load()?;
        data.insert(
            USERNAME_KEY.to_string(),
            Value::String(credentials.username.clone()),
        );
        data.insert(
            TOKEN_KEY.to_string(),
            Value::String(credentials.token.clone()),
        );
        let json = serde_json::to_string_pretty(&data)?;
        self.runtime
            .write(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to save credentials to {:?}", self.path))?;
        debug!("Saved credentials for {}", credentials.username);
        Ok(())
    }
}

/// Supplies credentials for downloads, logging in when needed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Stored credentials, or a fresh login when none are stored or `reset`
    /// is set.
    async fn credentials(&self, reset: bool) -> Result<Credentials>;
}

/// Interactive login against the catalog.
pub struct Authenticator<R: Runtime, C: ModCatalog + ?Sized, S: CredentialStore> {
    runtime: Arc<R>,
    catalog: Arc<C>,
    store: S,
}

impl<R: Runtime, C: ModCatalog + ?Sized, S: CredentialStore> Authenticator<R, C, S> {
    pub fn new(runtime: Arc<R>, catalog: Arc<C>, store: S) -> Self {
        Self {
            runtime,
            catalog,
            store,
        }
    }

    async fn login(&self) -> Result<Credentials> {
        eprintln!("You need a Factorio account to download mods.");
        eprintln!("Your username and token (NOT your password) will be stored.");

        let mut username = self.store.username().unwrap_or_else(|e| {
            warn!("Could not read stored username: {:#}", e);
            None
        });
        let mut last_error = None;

        for attempt in 1..=MAX_LOGIN_ATTEMPTS {
            debug!("Login attempt {}/{}", attempt, MAX_LOGIN_ATTEMPTS);

            let input = self.runtime.prompt_input("Username", username.clone())?;
            if input.is_empty() {
                continue;
            }
            username = Some(input.clone());

            let password = self.runtime.prompt_password("Password (not shown)")?;
            if password.is_empty() {
                continue;
            }

            match self.catalog.login(&input, &password, true).await {
                Ok(token) => {
                    eprintln!("Logged in successfully.");
                    let credentials = Credentials {
                        username: input,
                        token,
                    };
                    self.store.save(&credentials)?;
                    return Ok(credentials);
                }
                Err(e) => {
                    match Error::find(&e) {
                        Some(Error::Ownership(_)) => {
                            eprintln!("Ownership error: Your Factorio account doesn't own the game.");
                            eprintln!(
                                "Please buy the game or link your Steam account if you bought it on Steam."
                            );
                        }
                        Some(err @ Error::Auth(_)) => eprintln!("{}.", err),
                        _ => eprintln!("Error: {:#}.", e),
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::Auth("No username or password given".to_string()).into())
            .context(format!("Login failed after {} attempts", MAX_LOGIN_ATTEMPTS)))
    }
}

#[async_trait]
impl<R, C, S> CredentialProvider for Authenticator<R, C, S>
where
    R: Runtime + 'static,
    C: ModCatalog + ?Sized + 'static,
    S: CredentialStore + 'static,
{
    #[tracing::instrument(skip(self))]
    async fn credentials(&self, reset: bool) -> Result<Credentials> {
        if !reset && let Some(credentials) = self.store.get()? {
            return Ok(credentials);
        }
        self.login().await
    }
}
