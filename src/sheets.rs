use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::{
    drive::http_client,
    error::{FinderError, Result},
    report::{Cell, ColumnWidth, ReportSheet, StyledText, TextStyle},
};

/// Public Sheets v4 endpoint
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Destination for a finished report
#[async_trait]
pub trait SheetWriter: Send + Sync {
    /// Write `sheet`, replacing any sheet with the same title
    async fn write_sheet(&self, sheet: &ReportSheet) -> Result<()>;
}

/// Writes reports into a Google Sheets spreadsheet
#[derive(Clone)]
pub struct GoogleSheetsWriter {
    client: Client,
    base_url: String,
    access_token: String,
    spreadsheet_id: String,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

impl GoogleSheetsWriter {
    pub fn new(access_token: String, spreadsheet_id: String, timeout: Duration) -> Result<Self> {
        Self::with_base_url(SHEETS_API_BASE.to_string(), access_token, spreadsheet_id, timeout)
    }

    pub fn with_base_url(
        base_url: String,
        access_token: String,
        spreadsheet_id: String,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            spreadsheet_id,
        })
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/spreadsheets/{}", self.base_url, self.spreadsheet_id)
    }

    async fn existing_sheets(&self) -> Result<Vec<SheetProperties>> {
        let response = self
            .client
            .get(self.spreadsheet_url())
            .bearer_auth(&self.access_token)
            .query(&[("fields", "sheets.properties(sheetId,title)")])
            .send()
            .await?;

        let meta: SpreadsheetMeta = read_json(response, &self.spreadsheet_id).await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn batch_update(&self, requests: Vec<Value>) -> Result<Value> {
        debug!(requests = requests.len(), "sheets batchUpdate");
        let response = self
            .client
            .post(format!("{}:batchUpdate", self.spreadsheet_url()))
            .bearer_auth(&self.access_token)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;

        read_json(response, &self.spreadsheet_id).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    id: &str,
) -> Result<T> {
    match response.status() {
        StatusCode::OK => {
            let body = response.text().await?;
            Ok(serde_json::from_str(&body)?)
        }
        status => {
            let body = response.text().await.unwrap_or_default();
            Err(FinderError::from_status(status, &body, id))
        }
    }
}

#[async_trait]
impl SheetWriter for GoogleSheetsWriter {
    async fn write_sheet(&self, sheet: &ReportSheet) -> Result<()> {
        info!("Generating results sheet...");

        let mut setup = Vec::new();
        if let Some(existing) = self
            .existing_sheets()
            .await?
            .into_iter()
            .find(|s| s.title == sheet.title)
        {
            setup.push(json!({ "deleteSheet": { "sheetId": existing.sheet_id } }));
        }
        setup.push(add_sheet_request(sheet));

        let reply = self.batch_update(setup).await?;
        let sheet_id = reply["replies"]
            .as_array()
            .and_then(|replies| {
                replies
                    .iter()
                    .find_map(|r| r["addSheet"]["properties"]["sheetId"].as_i64())
            })
            .ok_or_else(|| FinderError::InvalidStructure {
                message: "addSheet reply carried no sheet id".to_string(),
            })?;

        self.batch_update(content_requests(sheet, sheet_id)?).await?;

        info!("Done generating results sheet");
        Ok(())
    }
}

/// Request creating an empty sheet sized to the report, first row frozen
///
/// Sheets rejects a grid whose frozen rows cover every row, so the grid
/// keeps at least one row below the header.
pub fn add_sheet_request(sheet: &ReportSheet) -> Value {
    json!({
        "addSheet": {
            "properties": {
                "title": sheet.title,
                "gridProperties": {
                    "rowCount": (sheet.rows.len() + 1).max(2),
                    "columnCount": sheet.column_count(),
                    "frozenRowCount": 1
                }
            }
        }
    })
}

/// Requests filling a freshly added sheet with the report
pub fn content_requests(sheet: &ReportSheet, sheet_id: i64) -> Result<Vec<Value>> {
    let header_cells = sheet
        .header
        .iter()
        .map(|label| cell_data(&Cell::Text(label.clone())))
        .collect::<Result<Vec<Value>>>()?;

    let mut rows = vec![json!({ "values": header_cells })];
    for row in &sheet.rows {
        let background = rgb_color(&row.background)?;
        let mut values = Vec::with_capacity(row.cells.len());
        for cell in &row.cells {
            let alignment = match cell {
                Cell::Image { .. } => "CENTER",
                _ => "LEFT",
            };
            let mut data = cell_data(cell)?;
            data["userEnteredFormat"] = json!({
                "backgroundColor": background,
                "verticalAlignment": "MIDDLE",
                "horizontalAlignment": alignment
            });
            values.push(data);
        }
        rows.push(json!({ "values": values }));
    }

    let mut requests = vec![json!({
        "updateCells": {
            "start": { "sheetId": sheet_id, "rowIndex": 0, "columnIndex": 0 },
            "rows": rows,
            "fields": "userEnteredValue,textFormatRuns,userEnteredFormat(backgroundColor,textFormat,verticalAlignment,horizontalAlignment)"
        }
    })];

    for (index, width) in sheet.column_widths.iter().enumerate() {
        let range = json!({
            "sheetId": sheet_id,
            "dimension": "COLUMNS",
            "startIndex": index,
            "endIndex": index + 1
        });
        requests.push(match width {
            ColumnWidth::Pixels(pixels) => json!({
                "updateDimensionProperties": {
                    "range": range,
                    "properties": { "pixelSize": pixels },
                    "fields": "pixelSize"
                }
            }),
            ColumnWidth::Auto => json!({ "autoResizeDimensions": { "dimensions": range } }),
        });
    }

    Ok(requests)
}

/// CellData for one cell, without its format
pub fn cell_data(cell: &Cell) -> Result<Value> {
    Ok(match cell {
        Cell::Empty => json!({}),
        Cell::Text(text) => {
            let mut data = json!({ "userEnteredValue": { "stringValue": text.text } });
            let runs = format_runs(text)?;
            if !runs.is_empty() {
                data["textFormatRuns"] = Value::Array(runs);
            }
            data
        }
        Cell::Image { url } => json!({
            "userEnteredValue": {
                "formulaValue": format!("=IMAGE(\"{}\")", url.replace('"', "\"\""))
            }
        }),
    })
}

/// Sheets text runs for the spans of `text`
///
/// A run lasts until the next one starts, so a run with an empty format
/// closes each span that is not directly followed by another.
pub fn format_runs(text: &StyledText) -> Result<Vec<Value>> {
    let len = text.text.chars().count();
    let mut runs = Vec::new();

    for (i, span) in text.spans.iter().enumerate() {
        runs.push(json!({
            "startIndex": utf16_offset(&text.text, span.start),
            "format": text_format(&span.style)?
        }));

        let next_start = text.spans.get(i + 1).map(|next| next.start);
        if span.end < len && next_start != Some(span.end) {
            runs.push(json!({
                "startIndex": utf16_offset(&text.text, span.end),
                "format": {}
            }));
        }
    }

    Ok(runs)
}

fn text_format(style: &TextStyle) -> Result<Value> {
    let mut format = json!({});
    if let Some(color) = &style.foreground {
        format["foregroundColor"] = rgb_color(color)?;
    }
    if style.bold {
        format["bold"] = json!(true);
    }
    if let Some(link) = &style.link {
        format["link"] = json!({ "uri": link });
    }
    Ok(format)
}

/// Sheets counts string positions in UTF-16 code units
fn utf16_offset(text: &str, char_index: usize) -> usize {
    text.chars().take(char_index).map(char::len_utf16).sum()
}

/// `#RRGGBB` to a Sheets color with channels in `0.0..=1.0`
pub fn rgb_color(hex: &str) -> Result<Value> {
    let invalid = || FinderError::InvalidConfig {
        message: format!("'{}' is not a #RRGGBB color", hex),
    };
    let digits = hex.strip_prefix('#').ok_or_else(invalid)?;
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(invalid());
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map(|v| f64::from(v) / 255.0)
            .map_err(|_| invalid())
    };

    Ok(json!({
        "red": channel(0..2)?,
        "green": channel(2..4)?,
        "blue": channel(4..6)?
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportRow, StyledSpan};

    fn colored(color: &str) -> TextStyle {
        TextStyle {
            foreground: Some(color.to_string()),
            ..TextStyle::default()
        }
    }

    fn bold() -> TextStyle {
        TextStyle {
            bold: true,
            ..TextStyle::default()
        }
    }

    #[test]
    fn test_empty_report_keeps_a_row_below_header() {
        let sheet = ReportSheet {
            title: "Shared Files (2024-1-2)".to_string(),
            header: vec![StyledText::styled("ID", bold())],
            rows: Vec::new(),
            column_widths: vec![ColumnWidth::Pixels(50)],
        };

        let grid = &add_sheet_request(&sheet)["addSheet"]["properties"]["gridProperties"];
        assert_eq!(grid["rowCount"], json!(2));
        assert_eq!(grid["frozenRowCount"], json!(1));
        assert_eq!(grid["columnCount"], json!(1));
    }

    #[test]
    fn test_rgb_color() {
        let color = rgb_color("#FF0000").unwrap();
        assert_eq!(color["red"], json!(1.0));
        assert_eq!(color["green"], json!(0.0));
        assert!(rgb_color("FF0000").is_err());
        assert!(rgb_color("#GG0000").is_err());
        assert!(rgb_color("#FFF").is_err());
    }

    #[test]
    fn test_format_runs_close_gaps() {
        let mut text = StyledText::default();
        text.push_line("a (reader)", colored("#000000"));
        text.push_line("b (writer)", colored("#B71C1C"));

        let runs = format_runs(&text).unwrap();
        let starts: Vec<u64> = runs
            .iter()
            .map(|r| r["startIndex"].as_u64().unwrap())
            .collect();
        // span, newline reset, span; nothing past the end
        assert_eq!(starts, vec![0, 10, 11]);
        assert_eq!(runs[1]["format"], json!({}));
    }

    #[test]
    fn test_utf16_offsets() {
        let text = StyledText {
            text: "😀 x".to_string(),
            spans: vec![StyledSpan {
                start: 2,
                end: 3,
                style: bold(),
            }],
        };
        let runs = format_runs(&text).unwrap();
        assert_eq!(runs[0]["startIndex"], json!(3));
        assert_eq!(runs[0]["format"]["bold"], json!(true));
    }

    #[test]
    fn test_content_requests() {
        let sheet = ReportSheet {
            title: "Shared Files (2024-1-2)".to_string(),
            header: vec![
                StyledText::styled("ID", bold()),
                StyledText::plain(""),
            ],
            rows: vec![ReportRow {
                cells: vec![
                    Cell::Text(StyledText::linked("/a", Some("https://drive/a"))),
                    Cell::Image {
                        url: "https://icons/a.png".to_string(),
                    },
                ],
                background: "#E0F7FA".to_string(),
            }],
            column_widths: vec![ColumnWidth::Pixels(50), ColumnWidth::Auto],
        };

        let add = add_sheet_request(&sheet);
        assert_eq!(add["addSheet"]["properties"]["gridProperties"]["rowCount"], json!(2));

        let requests = content_requests(&sheet, 7).unwrap();
        assert_eq!(requests.len(), 3);

        let rows = &requests[0]["updateCells"]["rows"];
        assert_eq!(rows[0]["values"][0]["userEnteredValue"]["stringValue"], json!("ID"));
        assert_eq!(rows[0]["values"][0]["textFormatRuns"][0]["format"]["bold"], json!(true));
        assert!(rows[0]["values"][1].get("textFormatRuns").is_none());
        let path_cell = &rows[1]["values"][0];
        assert_eq!(
            path_cell["textFormatRuns"][0]["format"]["link"]["uri"],
            json!("https://drive/a")
        );
        assert_eq!(
            rows[1]["values"][1]["userEnteredValue"]["formulaValue"],
            json!("=IMAGE(\"https://icons/a.png\")")
        );
        assert_eq!(rows[1]["values"][1]["userEnteredFormat"]["horizontalAlignment"], json!("CENTER"));
        assert_eq!(
            requests[1]["updateDimensionProperties"]["properties"]["pixelSize"],
            json!(50)
        );
        assert!(requests[2].get("autoResizeDimensions").is_some());
    }
}
