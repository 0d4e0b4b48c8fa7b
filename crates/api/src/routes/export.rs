//! File download and upload helpers for the export and import endpoints.
//!
//! Downloads carry `Content-Disposition: attachment` with a dated file name
//! such as `orders-2025-06-01.csv`. Uploads arrive as multipart forms with
//! the CSV in the `file` field.

use std::fmt::Display;

use axum::{
    Json,
    extract::{Multipart, multipart::MultipartRejection},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use emporium_core::csv::{CsvColumn, CsvTable, to_csv};

use crate::db::RepositoryError;
use crate::error::AppError;

/// Largest accepted import file.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Name of the multipart field holding the CSV.
const UPLOAD_FIELD: &str = "file";

/// Format segment of `/export/{format}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Render `rows` as a download named after `resource`.
    pub fn download<T: Serialize>(
        self,
        resource: &str,
        rows: &[T],
        columns: impl FnOnce() -> Vec<CsvColumn<T>>,
    ) -> Response {
        match self {
            Self::Csv => csv_download(resource, rows, &columns()),
            Self::Json => json_download(resource, rows),
        }
    }
}

fn attachment(resource: &str, extension: &str) -> String {
    format!(
        "attachment; filename=\"{resource}-{}.{extension}\"",
        Utc::now().format("%Y-%m-%d")
    )
}

/// `text/csv` attachment.
pub fn csv_download<T>(resource: &str, rows: &[T], columns: &[CsvColumn<T>]) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment(resource, "csv")),
        ],
        to_csv(rows, columns),
    )
        .into_response()
}

/// `application/json` attachment.
pub fn json_download<T: Serialize>(resource: &str, rows: &[T]) -> Response {
    (
        [(header::CONTENT_DISPOSITION, attachment(resource, "json"))],
        Json(rows),
    )
        .into_response()
}

/// Read the `file` field of a multipart upload and parse it as CSV with a
/// header row containing every label in `required`.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a malformed form, a missing field,
/// non-UTF-8 content, unparseable CSV or a missing column.
pub async fn read_csv_upload(
    upload: Result<Multipart, MultipartRejection>,
    required: &[&str],
) -> Result<CsvTable, AppError> {
    let mut multipart = upload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| AppError::BadRequest("Uploaded file must be UTF-8 text".to_string()))?;
        let table = CsvTable::parse(text).map_err(|e| AppError::BadRequest(e.to_string()))?;
        table
            .require_columns(required)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        return Ok(table);
    }

    Err(AppError::BadRequest(format!(
        "Missing multipart field '{UPLOAD_FIELD}'"
    )))
}

/// A row that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// Spreadsheet row number; the header is row 1.
    pub row: usize,
    pub error: String,
}

/// Outcome of an import. Failed rows don't stop the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub updated: usize,
    pub failed: Vec<RowFailure>,
}

impl ImportReport {
    pub fn record_imported(&mut self) {
        self.imported += 1;
    }

    pub fn record_updated(&mut self) {
        self.updated += 1;
    }

    pub fn record_failure(&mut self, row: usize, error: impl Display) {
        self.failed.push(RowFailure {
            row,
            error: error.to_string(),
        });
    }

    /// Record a row the database refused. Server faults are logged and
    /// reported to the client without detail.
    pub fn record_write_failure(&mut self, row: usize, error: RepositoryError) {
        let error = AppError::from(error);
        if error.status().is_server_error() {
            tracing::error!(row, error = %error, "Import row failed");
        }
        self.record_failure(row, error.public_message());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
    }

    fn columns() -> Vec<CsvColumn<Row>> {
        vec![CsvColumn::new("Name", |r: &Row| r.name.into())]
    }

    #[tokio::test]
    async fn test_csv_download_headers() {
        let response = ExportFormat::Csv.download("orders", &[Row { name: "a,b" }], columns);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"orders-"));
        assert!(disposition.ends_with(".csv\""));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Name\r\n\"a,b\"\r\n");
    }

    #[tokio::test]
    async fn test_json_download() {
        let response = ExportFormat::Json.download("stock", &[Row { name: "x" }], columns);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert!(
            response.headers()[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .ends_with(".json\"")
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"[{"name":"x"}]"#);
    }

    #[test]
    fn test_format_segment() {
        assert_eq!(
            serde_json::from_str::<ExportFormat>(r#""csv""#).unwrap(),
            ExportFormat::Csv
        );
        assert!(serde_json::from_str::<ExportFormat>(r#""xlsx""#).is_err());
    }

    #[test]
    fn test_import_report_shape() {
        let mut report = ImportReport::default();
        report.record_imported();
        report.record_updated();
        report.record_failure(4, "missing value for SKU");
        report.record_write_failure(
            5,
            RepositoryError::InvalidValue("numeric value out of range".to_string()),
        );
        report.record_write_failure(6, RepositoryError::DataCorruption("bad row".to_string()));
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "imported": 1,
                "updated": 1,
                "failed": [
                    {"row": 4, "error": "missing value for SKU"},
                    {"row": 5, "error": "numeric value out of range"},
                    {"row": 6, "error": "Internal server error"},
                ],
            })
        );
    }
}
