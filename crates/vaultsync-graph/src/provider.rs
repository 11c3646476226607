//! GraphRemoteDrive - IRemoteDrive implementation for Microsoft Graph API
//!
//! Wraps the [`GraphClient`] and delegates to the delta, upload and items
//! modules to fulfil the [`IRemoteDrive`] port contract.

use anyhow::Result;
use tracing::instrument;

use vaultsync_core::domain::DeltaCursor;
use vaultsync_core::ports::{IRemoteDrive, RemoteItem, RemoteListing};

use crate::client::GraphClient;
use crate::{delta, items, upload};

/// Remote drive backed by the OneDrive application folder
#[derive(Debug, Clone)]
pub struct GraphRemoteDrive {
    client: GraphClient,
}

impl GraphRemoteDrive {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Returns the underlying client
    pub fn client(&self) -> &GraphClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IRemoteDrive for GraphRemoteDrive {
    #[instrument(skip(self))]
    async fn full_listing(&self, root: &str) -> Result<RemoteListing> {
        delta::full_listing(&self.client, root).await
    }

    #[instrument(skip_all)]
    async fn incremental_listing(&self, cursor: &DeltaCursor) -> Result<RemoteListing> {
        delta::incremental_listing(&self.client, cursor).await
    }

    async fn latest_cursor(&self) -> Result<DeltaCursor> {
        delta::latest_cursor(&self.client).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(items::get_item_by_path(&self.client, path).await?.is_some())
    }

    #[instrument(skip(self))]
    async fn delete_by_path(&self, path: &str) -> Result<()> {
        items::delete_by_path(&self.client, path).await
    }

    #[instrument(skip(self))]
    async fn create_root_folder(&self, name: &str) -> Result<()> {
        items::create_root_folder(&self.client, name).await
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, path: &str) -> Result<()> {
        items::create_folder(&self.client, path).await
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn upload_small(&self, path: &str, data: Vec<u8>) -> Result<()> {
        upload::upload_small(&self.client, path, data).await
    }

    #[instrument(skip(self, data, progress), fields(bytes = data.len()))]
    async fn upload_large(
        &self,
        path: &str,
        data: Vec<u8>,
        chunk_size: u64,
        progress: Option<&(dyn Fn(u64, u64) + Send + Sync)>,
    ) -> Result<()> {
        upload::upload_large(&self.client, path, &data, chunk_size, progress).await
    }

    #[instrument(skip_all, fields(name = %item.name))]
    async fn download(&self, item: &RemoteItem) -> Result<Vec<u8>> {
        items::download(&self.client, item).await
    }
}
