//! Folder listing and projection
//!
//! The provider returns a heterogeneous item list discriminated by `type`.
//! The relay only surfaces assets and sub-folders, each reduced to the few
//! fields the frontend renders.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::CanvaClient;
use crate::error::Result;

/// Folder id the provider accepts for the user's top-level folder.
pub const ROOT_FOLDER: &str = "root";

/// Upper bound on continuation pages followed for one listing.
const MAX_PAGES: usize = 20;

/// One entry of `GET /folders/{id}/items`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FolderItem {
    Asset { asset: ProviderAsset },
    Folder { folder: ProviderFolder },
    /// Designs, images and any type added later.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderAsset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderFolder {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ItemsPage {
    #[serde(default)]
    items: Vec<FolderItem>,
    #[serde(default)]
    continuation: Option<String>,
}

/// Asset as returned to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetEntry {
    pub id: String,
    pub name: String,
    /// Thumbnail URL, `null` when the provider has none yet.
    pub url: Option<String>,
}

/// Sub-folder as returned to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderListing {
    pub assets: Vec<AssetEntry>,
    pub folders: Vec<FolderEntry>,
}

impl FolderListing {
    /// Partition items by type and keep only the projected fields.
    pub fn project(items: impl IntoIterator<Item = FolderItem>) -> Self {
        let mut listing = Self::default();
        for item in items {
            match item {
                FolderItem::Asset { asset } => listing.assets.push(AssetEntry {
                    id: asset.id,
                    name: asset.name,
                    url: asset.thumbnail.map(|t| t.url),
                }),
                FolderItem::Folder { folder } => listing.folders.push(FolderEntry {
                    id: folder.id,
                    name: folder.name,
                }),
                FolderItem::Other => {}
            }
        }
        listing
    }
}

impl CanvaClient {
    /// List a folder, following continuation tokens up to [`MAX_PAGES`].
    pub async fn list_folder(&self, token: &str, folder_id: &str) -> Result<FolderListing> {
        let mut items = Vec::new();
        let mut continuation: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut url = self.endpoint(&["folders", folder_id, "items"]);
            if let Some(ref c) = continuation {
                url.query_pairs_mut().append_pair("continuation", c);
            }
            let page: ItemsPage = self
                .send_json(self.request(Method::GET, url, token))
                .await?;
            items.extend(page.items);

            match page.continuation {
                Some(next) if !next.is_empty() => continuation = Some(next),
                _ => {
                    continuation = None;
                    break;
                }
            }
        }
        if continuation.is_some() {
            debug!(folder_id, pages = MAX_PAGES, "folder listing truncated");
        }

        Ok(FolderListing::project(items))
    }
}
