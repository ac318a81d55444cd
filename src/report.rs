use chrono::{Datelike, NaiveDate};

use crate::{
    cache::MemoryCache,
    config::{ColorPalette, FinderConfig},
    types::{AccessEntry, FileSummary, ItemKind, Role},
};

/// Styling applied to a run of text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextStyle {
    /// `#RRGGBB`
    pub foreground: Option<String>,
    pub bold: bool,
    pub link: Option<String>,
}

/// A style over the characters `start..end` of a [`StyledText`]
///
/// Offsets count `char`s, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub start: usize,
    pub end: usize,
    pub style: TextStyle,
}

/// A string with styled spans over it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledText {
    pub text: String,
    pub spans: Vec<StyledSpan>,
}

impl StyledText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spans: Vec::new(),
        }
    }

    /// Text styled as a whole
    pub fn styled(text: impl Into<String>, style: TextStyle) -> Self {
        let text = text.into();
        let end = text.chars().count();
        let spans = if end == 0 {
            Vec::new()
        } else {
            vec![StyledSpan { start: 0, end, style }]
        };
        Self { text, spans }
    }

    /// Text that links to `url`
    pub fn linked(text: impl Into<String>, url: Option<&str>) -> Self {
        match url {
            Some(url) => Self::styled(
                text,
                TextStyle {
                    link: Some(url.to_string()),
                    ..TextStyle::default()
                },
            ),
            None => Self::plain(text),
        }
    }

    /// Append a styled line, separated from the previous one by `\n`
    pub fn push_line(&mut self, line: &str, style: TextStyle) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        let start = self.text.chars().count();
        self.text.push_str(line);
        let end = self.text.chars().count();
        if end > start {
            self.spans.push(StyledSpan { start, end, style });
        }
    }
}

/// Content of one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Text(StyledText),
    Image { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnWidth {
    Pixels(u32),
    Auto,
}

/// One data row and its background color
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub cells: Vec<Cell>,
    pub background: String,
}

/// A sheet ready to be written by a [`crate::sheets::SheetWriter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSheet {
    pub title: String,
    /// Frozen first row
    pub header: Vec<StyledText>,
    pub rows: Vec<ReportRow>,
    pub column_widths: Vec<ColumnWidth>,
}

impl ReportSheet {
    pub fn column_count(&self) -> usize {
        self.header.len()
    }
}

/// `"<name> (<year>-<month>-<day>)"`, without zero padding
pub fn sheet_title(name: &str, date: NaiveDate) -> String {
    format!("{} ({}-{}-{})", name, date.year(), date.month(), date.day())
}

/// Turns sorted summaries into a [`ReportSheet`]
pub struct ReportBuilder<'a> {
    config: &'a FinderConfig,
    icons: MemoryCache<Cell>,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(config: &'a FinderConfig) -> Self {
        Self {
            config,
            icons: MemoryCache::new(),
        }
    }

    /// Build the sheet for `summaries`, titled with `date`
    pub fn build(&mut self, summaries: &[FileSummary], date: NaiveDate) -> ReportSheet {
        let rows: Vec<ReportRow> = summaries.iter().map(|s| self.row(s)).collect();

        let mut column_widths = vec![ColumnWidth::Pixels(50), ColumnWidth::Pixels(20)];
        let columns = self.config.header_labels.len();
        column_widths.resize(columns.max(2), ColumnWidth::Auto);
        column_widths.truncate(columns);

        ReportSheet {
            title: sheet_title(&self.config.sheet_name, date),
            header: self
                .config
                .header_labels
                .iter()
                .map(|label| StyledText::styled(label.clone(), header_style()))
                .collect(),
            rows,
            column_widths,
        }
    }

    fn row(&mut self, summary: &FileSummary) -> ReportRow {
        let config: &'a FinderConfig = self.config;
        let palette = &config.palette;
        let background = match summary.kind {
            ItemKind::Folder => palette.folder_background.clone(),
            ItemKind::File => palette.file_background.clone(),
        };

        ReportRow {
            cells: vec![
                Cell::Text(StyledText::plain(summary.id.clone())),
                self.icon(summary.icon_link.as_deref()),
                Cell::Text(StyledText::linked(summary.path.clone(), summary.link.as_deref())),
                Cell::Text(access_text(&summary.access, palette)),
            ],
            background,
        }
    }

    fn icon(&mut self, icon_link: Option<&str>) -> Cell {
        match icon_link {
            Some(url) if !url.is_empty() => self
                .icons
                .get_or_insert_with(url, || Cell::Image {
                    url: url.to_string(),
                })
                .clone(),
            _ => Cell::Empty,
        }
    }

    /// Distinct icons seen so far
    pub fn icon_count(&self) -> usize {
        self.icons.len()
    }
}

fn header_style() -> TextStyle {
    TextStyle {
        bold: true,
        ..TextStyle::default()
    }
}

/// One `label (role)` line per grant, colored by role
pub fn access_text(access: &[AccessEntry], palette: &ColorPalette) -> StyledText {
    let mut text = StyledText::default();
    for entry in access {
        let color = match entry.role {
            Role::Writer => &palette.writer_font,
            Role::Commenter => &palette.commenter_font,
            _ => &palette.reader_font,
        };
        text.push_line(
            &format!("{} ({})", entry.label, entry.role.as_str()),
            TextStyle {
                foreground: Some(color.clone()),
                ..TextStyle::default()
            },
        );
    }
    text
}
