use async_trait::async_trait;
use crate::{error::Result, types::{FolderRecord, ItemPage, Permission}};

/// Core abstraction for a file storage backend
///
/// Implementors provide read-only access to an owner's items, their
/// permissions and the folder hierarchy above them.
#[async_trait]
pub trait DriveSource: Send + Sync {
    /// Fetch one page of items matching `query`
    ///
    /// `page_token` is `None` for the first page.
    async fn list_items(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<ItemPage>;

    /// List every permission granted on an item
    async fn list_permissions(&self, item_id: &str) -> Result<Vec<Permission>>;

    /// Fetch the name and parents of a folder
    ///
    /// Returns `FinderError::NotFound` if the folder doesn't exist
    async fn get_folder(&self, folder_id: &str) -> Result<FolderRecord>;

    /// Total bytes of storage used by the owner, when the backend reports it
    async fn storage_used(&self) -> Result<Option<u64>> {
        Ok(None)
    }

    /// Get a human-readable identifier for this source (for logging/debugging)
    fn identifier(&self) -> String;
}
