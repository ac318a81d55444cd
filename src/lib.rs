pub mod aggregator;
pub mod cache;
pub mod config;
pub mod drive;
pub mod error;
pub mod report;
pub mod resolver;
pub mod retry;
pub mod sheets;
pub mod source;
pub mod types;

pub use aggregator::{compare_paths, sort_by_path, ListingAggregator, ScanReport};
pub use cache::{FolderCache, MemoryCache, PathCache, RunCache};
pub use config::{ColorPalette, FinderConfig, PageErrorPolicy};
pub use drive::GoogleDriveSource;
pub use error::{FinderError, Result};
pub use report::{Cell, ReportBuilder, ReportSheet, StyledText, TextStyle};
pub use resolver::PathResolver;
pub use retry::{with_policy, FetchOutcome};
pub use sheets::{GoogleSheetsWriter, SheetWriter};
pub use source::DriveSource;
pub use types::{AccessEntry, FileSummary, FolderRecord, Item, ItemKind, ItemPage, ParentRef, Permission, Role};
