use std::time::Duration;

use crate::error::{FinderError, Result};

/// Listing filter: items the current user owns that are not in the trash
pub const DEFAULT_QUERY: &str = "trashed = false and \"me\" in owners";

/// Largest page size Drive accepts
pub const MAX_PAGE_SIZE: u32 = 1000;

/// What a scan does when fetching a page fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageErrorPolicy {
    /// Stop the scan and return the error
    #[default]
    Abort,
    /// Retry retryable errors with exponential backoff, then abort
    Retry {
        max_attempts: u32,
        initial_backoff: Duration,
    },
    /// Stop paginating and return what was gathered, recording the error
    ContinuePartial,
}

/// Colors used in the report, as `#RRGGBB`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorPalette {
    pub folder_background: String,
    pub file_background: String,
    pub reader_font: String,
    pub writer_font: String,
    pub commenter_font: String,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            folder_background: "#FFF8E1".to_string(),
            file_background: "#E0F7FA".to_string(),
            reader_font: "#000000".to_string(),
            writer_font: "#B71C1C".to_string(),
            commenter_font: "#1B5E20".to_string(),
        }
    }
}

/// Tunables for a scan and its report
#[derive(Debug, Clone)]
pub struct FinderConfig {
    pub query: String,
    pub page_size: u32,
    /// Stop after the first page; for trying things out interactively
    pub debug_single_page: bool,
    pub error_policy: PageErrorPolicy,
    pub request_timeout: Duration,
    pub sheet_name: String,
    pub header_labels: Vec<String>,
    pub palette: ColorPalette,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY.to_string(),
            page_size: MAX_PAGE_SIZE,
            debug_single_page: false,
            error_policy: PageErrorPolicy::default(),
            request_timeout: Duration::from_secs(30),
            sheet_name: "Shared Files".to_string(),
            header_labels: ["ID", "", "Path", "Users"]
                .into_iter()
                .map(String::from)
                .collect(),
            palette: ColorPalette::default(),
        }
    }
}

impl FinderConfig {
    /// Build a config from `SFF_*` environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(size) = lookup("SFF_PAGE_SIZE") {
            config.page_size = parse_number(&size, "SFF_PAGE_SIZE")?;
        }
        if let Some(flag) = lookup("SFF_DEBUG_SINGLE_PAGE") {
            config.debug_single_page = parse_bool(&flag, "SFF_DEBUG_SINGLE_PAGE")?;
        }
        if let Some(name) = lookup("SFF_SHEET_NAME") {
            config.sheet_name = name;
        }
        if let Some(secs) = lookup("SFF_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse_number::<u64>(&secs, "SFF_TIMEOUT_SECS")?);
        }
        if let Some(policy) = lookup("SFF_ERROR_POLICY") {
            config.error_policy = match policy.trim().to_ascii_lowercase().as_str() {
                "abort" => PageErrorPolicy::Abort,
                "continue" => PageErrorPolicy::ContinuePartial,
                "retry" => {
                    let max_attempts = match lookup("SFF_MAX_ATTEMPTS") {
                        Some(n) => parse_number(&n, "SFF_MAX_ATTEMPTS")?,
                        None => 3,
                    };
                    PageErrorPolicy::Retry {
                        max_attempts,
                        initial_backoff: Duration::from_millis(500),
                    }
                }
                other => {
                    return Err(FinderError::InvalidConfig {
                        message: format!("unknown SFF_ERROR_POLICY '{}'", other),
                    })
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the values can be sent upstream
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(FinderError::InvalidConfig {
                message: format!(
                    "page size must be between 1 and {}, got {}",
                    MAX_PAGE_SIZE, self.page_size
                ),
            });
        }
        if self.query.trim().is_empty() {
            return Err(FinderError::InvalidConfig {
                message: "listing query is empty".to_string(),
            });
        }
        if let PageErrorPolicy::Retry { max_attempts: 0, .. } = self.error_policy {
            return Err(FinderError::InvalidConfig {
                message: "retry policy needs at least one attempt".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value.trim().parse().map_err(|_| FinderError::InvalidConfig {
        message: format!("{} must be a number, got '{}'", key, value),
    })
}

fn parse_bool(value: &str, key: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(FinderError::InvalidConfig {
            message: format!("{} must be a boolean, got '{}'", key, value),
        }),
    }
}
