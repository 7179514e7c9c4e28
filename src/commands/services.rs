//! Construction of the components a command works with.
//!
//! The catalog, downloader and credential provider are held as trait objects
//! so commands can be exercised against mocks.

use std::sync::Arc;

use anyhow::Result;
use log::debug;
use reqwest::Client;

use crate::{
    auth::{Authenticator, CredentialProvider, PlayerDataStore},
    cleanup::{SharedCleanupContext, new_shared},
    config::{Config, Context},
    download::{Downloader, HttpDownloader},
    http::HttpClient,
    install::InstallOrchestrator,
    provider::{ModCatalog, ModPortal},
    resolver::{DependencyResolver, ResolveOptions},
    runtime::Runtime,
    store::ModStore,
};

/// Build the HTTP client shared by the catalog and the downloader
pub fn build_http_client() -> Result<HttpClient> {
    let client = Client::builder()
        .user_agent(concat!("fac/", env!("FAC_VERSION")))
        .build()?;
    Ok(HttpClient::new(client))
}

pub struct Services<R: Runtime> {
    pub runtime: Arc<R>,
    pub config: Config,
    pub context: Context,
    pub catalog: Arc<dyn ModCatalog>,
    pub downloader: Arc<dyn Downloader>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub cleanup: SharedCleanupContext,
}

impl<R: Runtime + 'static> Services<R> {
    /// Wire the portal, the HTTP downloader and the interactive login.
    pub fn build(
        runtime: Arc<R>,
        config: Config,
        context: Context,
        api_url: &str,
        auth_url: &str,
    ) -> Result<Self> {
        debug!("Using catalog at {} (auth {})", api_url, auth_url);
        let http_client = build_http_client()?;
        let catalog: Arc<dyn ModCatalog> =
            Arc::new(ModPortal::new(http_client.clone(), api_url, auth_url)?);
        let downloader = Arc::new(HttpDownloader::new(Arc::clone(&runtime), http_client));
        let credentials = Arc::new(Authenticator::new(
            Arc::clone(&runtime),
            Arc::clone(&catalog),
            PlayerDataStore::new(Arc::clone(&runtime), &context.write_path),
        ));

        Ok(Self {
            runtime,
            config,
            context,
            catalog,
            downloader,
            credentials,
            cleanup: new_shared(),
        })
    }
}

impl<R: Runtime> Services<R> {
    /// A store over the mods directory; scan again after every mutation.
    pub fn store(&self) -> ModStore<R> {
        self.context.store(Arc::clone(&self.runtime))
    }

    pub fn resolver<'a>(
        &'a self,
        store: &'a ModStore<R>,
        options: ResolveOptions,
    ) -> DependencyResolver<'a, R, dyn ModCatalog> {
        DependencyResolver::new(store, self.catalog.as_ref(), options)
    }

    pub fn orchestrator<'a>(
        &'a self,
        store: &'a ModStore<R>,
    ) -> InstallOrchestrator<'a, R, dyn Downloader, dyn CredentialProvider> {
        InstallOrchestrator::new(
            store,
            self.downloader.as_ref(),
            self.credentials.as_ref(),
            self.context.write_path.clone(),
            Some(Arc::clone(&self.cleanup)),
        )
    }
}
