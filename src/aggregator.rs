use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    config::{FinderConfig, PageErrorPolicy},
    error::{FinderError, Result},
    resolver::PathResolver,
    retry::{with_policy, FetchOutcome},
    source::DriveSource,
    types::{AccessEntry, FileSummary, Item, ItemPage},
};

/// Everything a scan produced
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Shared items, sorted by path
    pub summaries: Vec<FileSummary>,
    pub items_processed: u64,
    pub bytes_processed: u64,
    pub pages_fetched: u32,
    /// Errors tolerated under [`PageErrorPolicy::ContinuePartial`]
    pub errors: Vec<FinderError>,
}

impl ScanReport {
    /// Whether some of the listing may be missing
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Walks the paginated listing and collects summaries of shared items
pub struct ListingAggregator {
    source: Arc<dyn DriveSource>,
    config: FinderConfig,
}

impl ListingAggregator {
    pub fn new(source: Arc<dyn DriveSource>, config: FinderConfig) -> Self {
        Self { source, config }
    }

    /// Fetch one page without applying the error policy
    pub async fn fetch_page(&self, page_token: Option<&str>) -> FetchOutcome<ItemPage> {
        self.source
            .list_items(&self.config.query, self.config.page_size, page_token)
            .await
            .into()
    }

    /// Enumerate every owned item and summarize the shared ones
    ///
    /// Caches live for the duration of this call only.
    pub async fn scan(&self) -> Result<ScanReport> {
        let quota = match self.source.storage_used().await {
            Ok(quota) => quota,
            Err(e) => {
                warn!("Could not read storage quota: {}", e);
                None
            }
        };
        if let Some(bytes) = quota {
            info!("{} bytes of storage used", bytes);
        }
        info!(source = %self.source.identifier(), "Processing files...");

        let mut resolver =
            PathResolver::new(self.source.clone()).with_error_policy(self.config.error_policy);
        let mut report = ScanReport::default();
        let mut page_token: Option<String> = None;

        loop {
            let page = match with_policy(self.config.error_policy, "list items", || {
                self.fetch_page(page_token.as_deref())
            })
            .await
            {
                Ok(page) => page,
                Err(e) if self.config.error_policy == PageErrorPolicy::ContinuePartial => {
                    error!("Failed to fetch page, keeping partial results: {}", e);
                    report.errors.push(e);
                    break;
                }
                Err(e) => return Err(e),
            };
            report.pages_fetched += 1;

            if page.items.is_empty() && report.pages_fetched == 1 {
                warn!("No files or folders found.");
                break;
            }

            for item in &page.items {
                report.items_processed += 1;
                report.bytes_processed += item.size;

                if !item.shared {
                    continue;
                }

                match self.summarize(&mut resolver, item).await {
                    Ok(summary) => {
                        info!(
                            "{} '{}' is shared. Adding to list",
                            summary.kind.label(),
                            item.name
                        );
                        report.summaries.push(summary);
                    }
                    Err(e) if self.config.error_policy == PageErrorPolicy::ContinuePartial => {
                        error!("Skipping '{}': {}", item.name, e);
                        report.errors.push(e);
                    }
                    Err(e) => return Err(e),
                }
            }

            match quota.filter(|&q| q > 0) {
                Some(total) => info!(
                    "{} files processed (~{:.2}%)",
                    report.items_processed,
                    report.bytes_processed as f64 * 100.0 / total as f64
                ),
                None => info!("{} files processed", report.items_processed),
            }

            if self.config.debug_single_page {
                break;
            }
            match page.continuation() {
                Some(next) => page_token = Some(next.to_string()),
                None => break,
            }
        }

        info!("Done processing files");
        sort_by_path(&mut report.summaries);
        Ok(report)
    }

    /// Build the summary of one shared item
    async fn summarize(&self, resolver: &mut PathResolver, item: &Item) -> Result<FileSummary> {
        let path = resolver.resolve_path(item).await?;
        let access = self.access_list(&item.id).await?;

        Ok(FileSummary {
            id: item.id.clone(),
            kind: item.kind(),
            icon_link: item.icon_link.clone(),
            path,
            access,
            link: item.link.clone(),
        })
    }

    /// Reader, writer and commenter grants on an item
    async fn access_list(&self, item_id: &str) -> Result<Vec<AccessEntry>> {
        let permissions = with_policy(self.config.error_policy, "list permissions", || async {
            FetchOutcome::from(self.source.list_permissions(item_id).await)
        })
        .await?;

        if permissions.is_empty() {
            warn!("No permissions found for file {}", item_id);
            return Ok(Vec::new());
        }

        Ok(permissions
            .iter()
            .filter_map(AccessEntry::from_permission)
            .collect())
    }
}

/// Locale-style ordering of paths
///
/// Compares letters first with case and accents removed, then accents
/// (unaccented first), then case (lowercase first). Accent folding covers
/// the Latin-1 and Latin Extended-A letters only; other scripts compare by
/// code point after lowercasing.
pub fn compare_paths(a: &str, b: &str) -> Ordering {
    let lower = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
    let (lower_a, lower_b) = (lower(a), lower(b));
    let base = |chars: &[char]| chars.iter().map(|&c| base_letter(c)).collect::<Vec<_>>();
    let upper = |s: &str| s.chars().map(char::is_uppercase).collect::<Vec<_>>();

    base(&lower_a)
        .cmp(&base(&lower_b))
        .then_with(|| lower_a.cmp(&lower_b))
        .then_with(|| upper(a).cmp(&upper(b)))
        .then_with(|| a.cmp(b))
}

/// The unaccented form of a lowercase Latin letter
fn base_letter(c: char) -> char {
    match c {
        'à'..='å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' | 'ħ' => 'h',
        'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' | 'ŧ' => 't',
        'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

/// Sort summaries ascending by path
pub fn sort_by_path(summaries: &mut [FileSummary]) {
    summaries.sort_by(|a, b| compare_paths(&a.path, &b.path));
}
