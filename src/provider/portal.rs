use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Url;
use tokio::sync::OnceCell;

use super::types::{PortalMod, PortalModList};
use super::{Mod, ModCatalog, ModSummary, SearchFilters, SortOrder};
use crate::error::Error;
use crate::http::{HttpClient, NonRetryableError};

pub const DEFAULT_API_URL: &str = "https://mods.factorio.com/api/";
pub const DEFAULT_AUTH_URL: &str = "https://auth.factorio.com/api-login";

/// Rejection message the auth server uses for accounts without the game.
const INSUFFICIENT_MEMBERSHIP: &str = "Insufficient membership";

/// [`ModCatalog`] backed by the mod portal HTTP API.
pub struct ModPortal {
    http_client: HttpClient,
    api_url: Url,
    auth_url: String,
    mod_list: OnceCell<Vec<ModSummary>>,
}

impl ModPortal {
    #[tracing::instrument(skip(http_client))]
    pub fn new(http_client: HttpClient, api_url: &str, auth_url: &str) -> Result<Self> {
        // Relative joins need the trailing slash
        let api_url = if api_url.ends_with('/') {
            api_url.to_string()
        } else {
            format!("{}/", api_url)
        };
        Ok(Self {
            http_client,
            api_url: Url::parse(&api_url).with_context(|| format!("Invalid API URL {}", api_url))?,
            auth_url: auth_url.to_string(),
            mod_list: OnceCell::new(),
        })
    }

    fn mod_url(&self, name: &str) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid API URL {}", self.api_url))?
            .pop_if_empty()
            .extend(["mods", name, "full"]);
        Ok(url)
    }

    async fn all_mods(&self) -> Result<&Vec<ModSummary>> {
        self.mod_list
            .get_or_try_init(|| async {
                let url = self.api_url.join("mods")?;
                debug!("Fetching mod list from {}...", url);
                let list: PortalModList = self
                    .http_client
                    .get_json_with_query(url.as_str(), &[("page_size", "max")])
                    .await
                    .context("Failed to fetch the mod list")?;
                Ok::<_, anyhow::Error>(list.results.into_iter().map(ModSummary::from).collect())
            })
            .await
    }
}

#[async_trait]
impl ModCatalog for ModPortal {
    #[tracing::instrument(skip(self))]
    async fn get_mod(&self, name: &str) -> Result<Mod> {
        let url = self.mod_url(name)?;
        let wire: PortalMod = match self.http_client.get_json(url.as_str()).await {
            Ok(wire) => wire,
            Err(e) => {
                if let Some(NonRetryableError::NotFound(_)) = e.downcast_ref::<NonRetryableError>() {
                    return Err(Error::ModNotFound(name.to_string()).into());
                }
                return Err(e.context(format!("Failed to fetch mod {}", name)));
            }
        };

        let (m, errors) = wire.into_mod(&self.api_url);
        for e in errors {
            warn!("Skipping release of {}: {:#}", m.name, e);
        }
        Ok(m)
    }

    #[tracing::instrument(skip(self, filters))]
    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<ModSummary>> {
        let mods = self.all_mods().await?;
        Ok(filter_mods(mods, query, filters))
    }

    #[tracing::instrument(skip(self, password))]
    async fn login(
        &self,
        username: &str,
        password: &str,
        require_ownership: bool,
    ) -> Result<String> {
        let ownership = if require_ownership { "1" } else { "0" };
        let result = self
            .http_client
            .post_form_json::<Vec<String>>(
                &self.auth_url,
                &[("require_game_ownership", ownership)],
                &[("username", username), ("password", password)],
            )
            .await;

        match result {
            Ok(tokens) => tokens
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("Login response did not contain a token")),
            Err(e) => match e.downcast_ref::<NonRetryableError>() {
                Some(rejection) if rejection.message() == INSUFFICIENT_MEMBERSHIP => {
                    Err(Error::Ownership(rejection.message().to_string()).into())
                }
                Some(rejection) => Err(Error::Auth(rejection.message().to_string()).into()),
                None => Err(e),
            },
        }
    }
}

/// Case-insensitive match of every query word against name, title, owner
/// and summary, then tag filtering, ordering and truncation.
fn filter_mods(mods: &[ModSummary], query: &str, filters: &SearchFilters) -> Vec<ModSummary> {
    let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    let tags: Vec<String> = filters.tags.iter().map(|t| t.to_lowercase()).collect();

    let mut hits: Vec<ModSummary> = mods
        .iter()
        .filter(|m| {
            let haystack = format!("{} {} {} {}", m.name, m.title, m.owner, m.summary).to_lowercase();
            words.iter().all(|w| haystack.contains(w.as_str()))
        })
        .filter(|m| {
            tags.iter()
                .all(|tag| m.tags.iter().any(|t| t.to_lowercase() == *tag))
        })
        .cloned()
        .collect();

    match filters.order {
        SortOrder::Top => hits.sort_by(|a, b| b.downloads_count.cmp(&a.downloads_count)),
        SortOrder::Alpha => hits.sort_by_key(|m| m.name.to_lowercase()),
        SortOrder::Updated => hits.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
    }
    if let Some(limit) = filters.limit {
        hits.truncate(limit);
    }
    hits
}
