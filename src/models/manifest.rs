use serde::{Deserialize, Serialize};

/// Provenance written beside a fetched record file.
///
/// The record file itself stays a bare JSON array, so a partial download is
/// only distinguishable from a complete one through this sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchManifest {
    pub complete: bool,
    pub record_count: usize,
    pub pages: usize,
    pub api_url: String,
    #[serde(rename = "where")]
    pub where_clause: String,
    pub order: String,
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchManifest {
    pub fn summary(&self) -> String {
        let status = if self.complete { "complete" } else { "PARTIAL" };
        let mut text = format!(
            "Fetch Manifest:\n\
            - Status: {}\n\
            - Records: {}\n\
            - Pages: {} (page size {})\n\
            - Source: {}\n\
            - Where: {}\n\
            - Order: {}",
            status,
            self.record_count,
            self.pages,
            self.page_size,
            self.api_url,
            self.where_clause,
            self.order
        );
        if let Some(ref error) = self.error {
            text.push_str(&format!("\n- Error: {}", error));
        }
        text
    }
}
