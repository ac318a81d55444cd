use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::{
    error::{FinderError, Result},
    source::DriveSource,
    types::{FolderRecord, ItemPage, Permission},
};

/// Public Drive v2 endpoint
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v2";

const ITEM_FIELDS: &str = "items(id,mimeType,iconLink,alternateLink,title,shared,parents(isRoot,id),quotaBytesUsed),nextPageToken";
const FOLDER_FIELDS: &str = "id,title,parents(isRoot,id)";
const PERMISSION_FIELDS: &str = "items(emailAddress,role)";

/// Google Drive backed source
///
/// Uses the Drive v2 REST API with a caller-supplied OAuth access token:
/// - `files` for the owner listing and folder lookups
/// - `files/{id}/permissions` for access lists
/// - `about` for the storage quota
#[derive(Clone)]
pub struct GoogleDriveSource {
    client: Client,
    base_url: String,
    access_token: String,
}

#[derive(Deserialize)]
struct PermissionList {
    #[serde(default)]
    items: Vec<Permission>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct About {
    quota_bytes_used: Option<String>,
}

/// HTTP client shared by the Drive and Sheets collaborators
///
/// The timeout is part of the contract, so a client that cannot be built
/// with it is a configuration error rather than a silent fallback.
pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent("shared-file-finder/0.1")
        .timeout(timeout)
        .build()
        .map_err(|e| FinderError::InvalidConfig {
            message: format!("could not build HTTP client: {}", e),
        })
}

impl GoogleDriveSource {
    /// Create a source against the public Drive endpoint
    pub fn new(access_token: String, timeout: Duration) -> Result<Self> {
        Self::with_base_url(DRIVE_API_BASE.to_string(), access_token, timeout)
    }

    /// Create a source against another endpoint (a proxy, or a test server)
    pub fn with_base_url(
        base_url: String,
        access_token: String,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a JSON document, mapping error statuses
    ///
    /// `id` names the requested resource in `NotFound` errors.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        id: &str,
    ) -> Result<T> {
        let url = self.url(path);
        debug!(url = %url, "drive request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                serde_json::from_str(&body).map_err(|e| FinderError::InvalidStructure {
                    message: format!("Unexpected response from {}: {}", path, e),
                })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(FinderError::from_status(status, &body, id))
            }
        }
    }
}

#[async_trait]
impl DriveSource for GoogleDriveSource {
    async fn list_items(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<ItemPage> {
        let page_size = page_size.to_string();
        let mut params = vec![
            ("q", query),
            ("maxResults", page_size.as_str()),
            ("spaces", "drive"),
            ("fields", ITEM_FIELDS),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        self.get_json("files", &params, "files").await
    }

    async fn list_permissions(&self, item_id: &str) -> Result<Vec<Permission>> {
        let list: PermissionList = self
            .get_json(
                &format!("files/{}/permissions", item_id),
                &[("fields", PERMISSION_FIELDS)],
                item_id,
            )
            .await?;
        Ok(list.items)
    }

    async fn get_folder(&self, folder_id: &str) -> Result<FolderRecord> {
        self.get_json(
            &format!("files/{}", folder_id),
            &[("fields", FOLDER_FIELDS)],
            folder_id,
        )
        .await
    }

    async fn storage_used(&self) -> Result<Option<u64>> {
        let about: About = self
            .get_json("about", &[("fields", "quotaBytesUsed")], "about")
            .await?;
        Ok(about.quota_bytes_used.and_then(|b| b.parse().ok()))
    }

    fn identifier(&self) -> String {
        format!("gdrive://{}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let source = GoogleDriveSource::with_base_url(
            "http://localhost:1234/drive/v2/".to_string(),
            "token".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(source.url("files"), "http://localhost:1234/drive/v2/files");
        assert_eq!(source.url("/about"), "http://localhost:1234/drive/v2/about");
        assert_eq!(source.identifier(), "gdrive://http://localhost:1234/drive/v2");
    }

    #[test]
    fn test_client_keeps_timeout() {
        tokio_test::assert_ok!(http_client(Duration::from_millis(250)));
        tokio_test::assert_ok!(GoogleDriveSource::new(
            "token".to_string(),
            Duration::from_secs(30)
        ));
    }
}
