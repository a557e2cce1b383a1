//! Paginated catalog walker.

use crate::config::ReconcileConfig;
use crate::models::{AssetObject, ObjectType};
use cr_connectors::CmdbConnector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Result of walking every page of an object type.
///
/// A failed page stops the walk; `failed_page` records where, so callers can
/// tell a truncated listing from a complete one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogWalk {
    pub object_type: ObjectType,
    pub objects: Vec<AssetObject>,
    /// Page count last reported by the server.
    pub total_pages: u32,
    pub pages_fetched: u32,
    pub failed_page: Option<u32>,
}

impl CatalogWalk {
    fn empty(object_type: ObjectType) -> Self {
        Self {
            object_type,
            objects: Vec::new(),
            total_pages: 0,
            pages_fetched: 0,
            failed_page: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed_page.is_none()
    }
}

/// Enumerates all objects of a type, one page at a time.
pub struct CatalogWalker {
    cmdb: Arc<dyn CmdbConnector>,
    config: Arc<ReconcileConfig>,
}

impl CatalogWalker {
    pub fn new(cmdb: Arc<dyn CmdbConnector>, config: Arc<ReconcileConfig>) -> Self {
        Self { cmdb, config }
    }

    /// Fetches pages `1..=pageSize` in order.
    #[instrument(skip(self))]
    pub async fn list_objects(&self, object_type: ObjectType) -> CatalogWalk {
        let mut walk = CatalogWalk::empty(object_type);

        let Some(query) = self.config.catalog_query(object_type) else {
            error!(object_type = %object_type, "No object type id configured, cannot list objects");
            walk.failed_page = Some(1);
            return walk;
        };

        let mut page = 1;
        let mut total_pages = 1;
        while page <= total_pages {
            match self.cmdb.search_page(&query, page).await {
                Ok(result) => {
                    total_pages = result.page_size;
                    walk.total_pages = total_pages;
                    walk.pages_fetched += 1;
                    info!(
                        object_type = %object_type,
                        page,
                        total_pages,
                        entries = result.object_entries.len(),
                        "Fetched page {} of {}",
                        page,
                        total_pages
                    );
                    walk.objects.extend(
                        result
                            .object_entries
                            .into_iter()
                            .map(|entry| AssetObject::from_entry(entry, object_type)),
                    );
                    page += 1;
                }
                Err(e) => {
                    error!(
                        object_type = %object_type,
                        page,
                        error = %e,
                        "Catalog walk stopped at page {}; listing is partial",
                        page
                    );
                    walk.failed_page = Some(page);
                    break;
                }
            }
        }

        walk
    }
}
