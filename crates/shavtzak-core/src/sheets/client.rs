//! Client for the Google Sheets v4 `values` API.
//!
//! The roster lives in one sheet (tab) of a spreadsheet. Reads work with an
//! API key or an OAuth access token; writes need the access token. Requests
//! are not retried: a rate-limit response surfaces as `SheetsError::RateLimited`.

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::models::Soldier;

use super::rows::{
    data_range, id_column_range, row_numbers_by_id, row_range, soldier_to_row, soldiers_from_rows,
};
use super::SheetsError;

// ============================================================================
// Constants
// ============================================================================

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Values are stored exactly as sent. Parsing them as typed input would turn
/// "0123456" into a number, "1/2" into a date and "=..." into a formula.
const VALUE_INPUT_OPTION: &str = "RAW";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct ValueRangeBody<'a> {
    range: String,
    #[serde(rename = "majorDimension")]
    major_dimension: &'a str,
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct BatchUpdateBody<'a> {
    #[serde(rename = "valueInputOption")]
    value_input_option: &'a str,
    data: Vec<ValueRangeBody<'a>>,
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(rename = "totalUpdatedRows", default)]
    total_updated_rows: usize,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
struct AppendUpdates {
    #[serde(rename = "updatedRows", default)]
    updated_rows: usize,
}

/// Outcome of pushing changed soldiers to the sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub updated: usize,
    pub appended: usize,
}

/// Sheets client bound to one spreadsheet tab.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: impl Into<String>, sheet_name: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: SHEETS_BASE_URL.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            api_key: None,
            access_token: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Point the client at another API root (used for local testing).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn can_write(&self) -> bool {
        self.access_token.is_some()
    }

    /// Build `{base}/{spreadsheet}/values/{range}{suffix}` with the range
    /// percent-encoded as a single path segment.
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid Sheets base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Sheets base URL cannot be a base"))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", range, suffix));
        Ok(url)
    }

    fn batch_update_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid Sheets base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Sheets base URL cannot be a base"))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values:batchUpdate");
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.access_token, &self.api_key) {
            (Some(token), _) => request.bearer_auth(token),
            (None, Some(key)) => request.query(&[("key", key)]),
            (None, None) => request,
        }
    }

    fn require_write(&self) -> Result<()> {
        if self.can_write() {
            Ok(())
        } else {
            Err(SheetsError::ReadOnly.into())
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(SheetsError::from_response(status, &body).into())
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(SheetsError::from)
            .with_context(|| format!("Failed to send {} request", what))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>> {
        let url = self.values_url(range, "")?;
        let parsed: ValueRange = self.send_json(self.client.get(url), "values get").await?;
        Ok(parsed.values)
    }

    // ===== Roster =====

    /// Fetch every soldier on the roster sheet.
    pub async fn fetch_soldiers(&self) -> Result<Vec<Soldier>> {
        let rows = self.get_values(&data_range(&self.sheet_name)).await?;
        let soldiers = soldiers_from_rows(&rows);
        info!(rows = rows.len(), soldiers = soldiers.len(), "Roster fetched");
        Ok(soldiers)
    }

    /// Append soldiers after the last data row.
    pub async fn append_soldiers(&self, soldiers: &[&Soldier]) -> Result<usize> {
        self.require_write()?;
        if soldiers.is_empty() {
            return Ok(0);
        }

        let range = data_range(&self.sheet_name);
        let mut url = self.values_url(&range, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION)
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = ValueRangeBody {
            range,
            major_dimension: "ROWS",
            values: soldiers.iter().map(|s| soldier_to_row(s)).collect(),
        };

        let response: AppendResponse = self
            .send_json(self.client.post(url).json(&body), "values append")
            .await?;
        let appended = response.updates.map(|u| u.updated_rows).unwrap_or(soldiers.len());
        debug!(appended, "Rows appended");
        Ok(appended)
    }

    /// Write changed soldiers back. Rows are matched by personal number;
    /// soldiers without a row are appended. Last write wins.
    pub async fn update_soldiers(&self, changed: &[&Soldier]) -> Result<SyncSummary> {
        self.require_write()?;
        if changed.is_empty() {
            return Ok(SyncSummary::default());
        }

        let id_column = self.get_values(&id_column_range(&self.sheet_name)).await?;
        let row_numbers = row_numbers_by_id(&id_column);

        let mut data = Vec::new();
        let mut missing = Vec::new();
        for soldier in changed {
            match row_numbers.get(&soldier.id) {
                Some(&row) => data.push(ValueRangeBody {
                    range: row_range(&self.sheet_name, row),
                    major_dimension: "ROWS",
                    values: vec![soldier_to_row(soldier)],
                }),
                None => missing.push(*soldier),
            }
        }

        let mut summary = SyncSummary::default();

        if !data.is_empty() {
            let requested = data.len();
            let body = BatchUpdateBody {
                value_input_option: VALUE_INPUT_OPTION,
                data,
            };
            let response: BatchUpdateResponse = self
                .send_json(
                    self.client.post(self.batch_update_url()?).json(&body),
                    "values batchUpdate",
                )
                .await?;
            summary.updated = if response.total_updated_rows > 0 {
                response.total_updated_rows
            } else {
                requested
            };
        }

        summary.appended = self.append_soldiers(&missing).await?;

        info!(
            updated = summary.updated,
            appended = summary.appended,
            "Roster changes written"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SheetsClient {
        SheetsClient::new("sheet-id", "שבצ\"ק").unwrap()
    }

    #[test]
    fn test_values_url_encodes_range() {
        let url = client().values_url("'Roster'!A2:F", "").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/'Roster'!A2:F"
        );

        let hebrew = client().values_url("'שבצ\"ק'!A:A", "").unwrap();
        assert!(hebrew.as_str().contains("/values/'%D7%A9"));
        assert!(hebrew.as_str().contains("%22"));
    }

    #[test]
    fn test_append_url_suffix() {
        let url = client().values_url("'Roster'!A2:F", ":append").unwrap();
        assert!(url.path().ends_with("A2:F:append"));
    }

    #[test]
    fn test_batch_update_url() {
        let url = client().batch_update_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values:batchUpdate"
        );
    }

    #[test]
    fn test_write_requires_token() {
        let read_only = client().with_api_key(Some("key".to_string()));
        assert!(!read_only.can_write());
        assert!(read_only.require_write().is_err());

        let writer = client().with_access_token(Some("token".to_string()));
        assert!(writer.can_write());

        let blank = client().with_access_token(Some(String::new()));
        assert!(!blank.can_write());
    }

    #[tokio::test]
    async fn test_update_without_token_fails_before_network() {
        let err = client().update_soldiers(&[]).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<SheetsError>(), Some(SheetsError::ReadOnly)));
    }

    #[test]
    fn test_batch_body_shape() {
        let body = BatchUpdateBody {
            value_input_option: VALUE_INPUT_OPTION,
            data: vec![ValueRangeBody {
                range: "'R'!A2:F2".to_string(),
                major_dimension: "ROWS",
                values: vec![vec![Value::String("1".to_string())]],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["valueInputOption"], "RAW");
        assert_eq!(json["data"][0]["majorDimension"], "ROWS");
    }

    // ===== Against a local stand-in for the Sheets API =====

    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{Method, Uri};
    use axum::{Json, Router};
    use serde_json::json;

    use crate::status::map_raw_status_to_structured;

    #[derive(Clone, Default)]
    struct Requests(Arc<Mutex<Vec<(Method, String, String)>>>);

    impl Requests {
        fn take(&self) -> Vec<(Method, String, String)> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    /// Column A holds a header, two soldiers and a duplicate of the first id.
    /// Write responses omit their counts.
    async fn fake_sheets(
        State(requests): State<Requests>,
        method: Method,
        uri: Uri,
        body: String,
    ) -> Json<Value> {
        let target = uri.to_string();
        requests.0.lock().unwrap().push((method, target.clone(), body));
        if target.contains(":batchUpdate") || target.contains(":append") {
            Json(json!({}))
        } else {
            Json(json!({ "values": [["מ.א"], ["1000001"], ["0123456"], ["1000001"]] }))
        }
    }

    async fn serve_fake_sheets() -> (SheetsClient, Requests) {
        let requests = Requests::default();
        let app = Router::new()
            .fallback(fake_sheets)
            .with_state(requests.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let client = SheetsClient::new("sheet-id", "Roster")
            .unwrap()
            .with_access_token(Some("token".to_string()))
            .with_base_url(format!("http://{}", addr));
        (client, requests)
    }

    fn soldier(id: &str, raw_status: &str) -> Soldier {
        Soldier::new(id, "Dana", "Levi", "2", map_raw_status_to_structured(raw_status))
    }

    #[tokio::test]
    async fn test_update_soldiers_splits_update_and_append() {
        let (client, requests) = serve_fake_sheets().await;
        let known = soldier("1000001", "משמר");
        let leading_zero = soldier("0123456", "1/2");
        let new = soldier("1000009", "=SUM(A1)");

        let summary = client
            .update_soldiers(&[&known, &leading_zero, &new])
            .await
            .unwrap();
        assert_eq!(summary, SyncSummary { updated: 2, appended: 1 });

        let requests = requests.take();
        assert_eq!(requests.len(), 3);

        let (method, target, _) = &requests[0];
        assert_eq!(*method, Method::GET);
        assert!(target.starts_with("/sheet-id/values/"));

        let (method, target, body) = &requests[1];
        assert_eq!(*method, Method::POST);
        assert_eq!(target, "/sheet-id/values:batchUpdate");
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["valueInputOption"], "RAW");
        // First occurrence of a duplicated id wins
        assert_eq!(body["data"][0]["range"], "'Roster'!A2:F2");
        assert_eq!(body["data"][0]["values"][0][4], "משמר");
        assert_eq!(body["data"][1]["range"], "'Roster'!A3:F3");
        assert_eq!(body["data"][1]["values"][0][0], "0123456");
        assert_eq!(body["data"][1]["values"][0][4], "1/2");

        let (method, target, body) = &requests[2];
        assert_eq!(*method, Method::POST);
        assert!(target.contains(":append?"));
        assert!(target.contains("valueInputOption=RAW"));
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["values"].as_array().unwrap().len(), 1);
        assert_eq!(body["values"][0][0], "1000009");
        assert_eq!(body["values"][0][4], "=SUM(A1)");
    }

    #[tokio::test]
    async fn test_update_soldiers_only_known_rows_skips_append() {
        let (client, requests) = serve_fake_sheets().await;
        let known = soldier("1000001", "בית");

        let summary = client.update_soldiers(&[&known]).await.unwrap();
        assert_eq!(summary, SyncSummary { updated: 1, appended: 0 });

        let requests = requests.take();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|(_, target, _)| !target.contains(":append")));
    }

    #[tokio::test]
    async fn test_fetch_soldiers_with_bearer_token() {
        let (client, requests) = serve_fake_sheets().await;
        let soldiers = client.fetch_soldiers().await.unwrap();

        // The stand-in returns its id column for every read; each row has only an id
        assert_eq!(soldiers.len(), 4);
        assert_eq!(soldiers[2].id, "0123456");
        let requests = requests.take();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].1.contains("key="));
    }
}
