use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, trace, warn};
use url::Url;

use crate::{
    opportunities::OpportunityRecord,
    tools::summary::{ServerSummaryRow, SummaryCategory},
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

pub const ENDPOINT_OPPORTUNITY_DETAIL: &str = "/api/opportunity-detail";
pub const ENDPOINT_DIVISION_SUMMARY: &str = "/api/division-summary";
pub const ENDPOINT_LEAD_SUMMARY: &str = "/api/lead-summary";

const USER_AGENT: &str = concat!("opptool/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid API base URL \"{url}\": {source}")]
    InvalidBaseUrl { url: String, source: url::ParseError },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{path} responded with HTTP status {status}")]
    HttpStatus { path: String, status: StatusCode },
    #[error("{path} sent a response that is not a valid envelope: {source}")]
    Malformed { path: String, source: serde_json::Error },
    #[error("{path} reported a failure: {}", message.as_deref().unwrap_or("no reason given"))]
    ApiReported { path: String, message: Option<String> },
}

/// The envelope every endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    success: bool,
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct ApiClient {
    base_url: Url,
    client: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url)
            .map_err(|source| FetchError::InvalidBaseUrl { url: base_url.to_owned(), source })?;
        let mut builder = reqwest::blocking::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self { base_url, client: builder.build()? })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issues a GET to `path` and returns the `data` array of the envelope.
    pub fn fetch_data(&self, path: &str) -> Result<Vec<Value>, FetchError> {
        let url = self.base_url.join(path).map_err(|source| FetchError::InvalidBaseUrl {
            url: self.base_url.to_string(),
            source,
        })?;
        trace!("Sending GET {}", url);

        let response = self.client.get(url).send()?;
        let status = response.status();
        let body = response.text()?;

        let envelope: ApiResponse = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(FetchError::HttpStatus { path: path.to_owned(), status });
            }
            Err(source) => return Err(FetchError::Malformed { path: path.to_owned(), source }),
        };
        if !envelope.success {
            return Err(FetchError::ApiReported { path: path.to_owned(), message: envelope.error });
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus { path: path.to_owned(), status });
        }

        info!("received {} rows from {}", envelope.data.len(), path);
        Ok(envelope.data)
    }

    pub fn get_opportunity_detail(&self) -> Result<Vec<OpportunityRecord>, FetchError> {
        info!("getting all opportunities from {}", self.base_url);
        let rows = self.fetch_data(ENDPOINT_OPPORTUNITY_DETAIL)?;
        Ok(rows
            .into_iter()
            .filter_map(|v| {
                OpportunityRecord::try_from(v)
                    .inspect_err(|err| warn!("error deserializing opportunity: {}", err))
                    .ok()
            })
            .collect())
    }

    pub fn get_division_summary(&self) -> Result<Vec<ServerSummaryRow>, FetchError> {
        let rows = self.fetch_data(ENDPOINT_DIVISION_SUMMARY)?;
        Ok(rows.iter().filter_map(|row| parse_server_summary_row(row, "Division")).collect())
    }

    pub fn get_lead_summary(&self) -> Result<Vec<ServerSummaryRow>, FetchError> {
        let rows = self.fetch_data(ENDPOINT_LEAD_SUMMARY)?;
        Ok(rows.iter().filter_map(|row| parse_server_summary_row(row, "LeadType")).collect())
    }
}

/// Reads one row of a server-side summary. Rows without a usable year or
/// count are skipped with a warning.
fn parse_server_summary_row(row: &Value, category_key: &str) -> Option<ServerSummaryRow> {
    let as_integer = |value: Option<&Value>| match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    let year = as_integer(row.get("Year")).and_then(|year| i32::try_from(year).ok());
    let total_opp = as_integer(row.get("TotalOpp")).and_then(|n| u64::try_from(n).ok());
    let (Some(year), Some(total_opp)) = (year, total_opp) else {
        warn!("skipping server summary row without a year or count: {}", row);
        return None;
    };

    let category = match row.get(category_key).and_then(Value::as_str).map(str::trim) {
        Some(SummaryCategory::TOTAL_LABEL) => SummaryCategory::Total,
        Some(name) if !name.is_empty() => SummaryCategory::Named(name.to_owned()),
        _ => SummaryCategory::Unknown,
    };
    Some(ServerSummaryRow { year, category, total_opp })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::opportunities::Stage;

    fn client(server: &mockito::Server) -> ApiClient {
        ApiClient::new(&server.url(), None).unwrap()
    }

    #[test]
    fn fetches_and_normalizes_opportunities() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", ENDPOINT_OPPORTUNITY_DETAIL)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "count": 3,
                    "data": [
                        {
                            "Id": "006A",
                            "Name": "Smith roof",
                            "Amount": "$1,200",
                            "StageName": "Approved",
                            "Created_Date": "2023-06-01T00:00:00.000Z",
                            "LastStageChangeDate": "2024-01-10T00:00:00.000Z",
                            "Division": "Roofing",
                            "LeadType": "Referral"
                        },
                        "not a record",
                        { "Id": 7, "StageName": "Open", "Created_Date": "2023-06-01" }
                    ]
                })
                .to_string(),
            )
            .create();

        let records = client(&server).get_opportunity_detail().unwrap();
        mock.assert();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "006A");
        assert_eq!(records[0].amount, Some(1200.0));
        assert_eq!(records[0].stage, Stage::Approved);
        assert_eq!(records[1].id, "7");
        assert_eq!(records[1].last_stage_change_date, None);
    }

    #[test]
    fn api_reported_failure_is_an_error() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", ENDPOINT_OPPORTUNITY_DETAIL)
            .with_status(500)
            .with_body(r#"{"success": false, "error": "database unavailable"}"#)
            .create();

        let err = client(&server).get_opportunity_detail().unwrap_err();
        match err {
            FetchError::ApiReported { path, message } => {
                assert_eq!(path, ENDPOINT_OPPORTUNITY_DETAIL);
                assert_eq!(message.as_deref(), Some("database unavailable"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_body_is_an_error() {
        let mut server = mockito::Server::new();
        server.mock("GET", ENDPOINT_OPPORTUNITY_DETAIL).with_status(200).with_body("<html>").create();
        assert!(matches!(
            client(&server).fetch_data(ENDPOINT_OPPORTUNITY_DETAIL),
            Err(FetchError::Malformed { .. })
        ));

        // an envelope without the success flag is just as unusable
        server
            .mock("GET", ENDPOINT_LEAD_SUMMARY)
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .create();
        assert!(matches!(
            client(&server).fetch_data(ENDPOINT_LEAD_SUMMARY),
            Err(FetchError::Malformed { .. })
        ));
    }

    #[test]
    fn error_status_without_envelope_is_an_http_error() {
        let mut server = mockito::Server::new();
        server.mock("GET", ENDPOINT_DIVISION_SUMMARY).with_status(404).with_body("Not Found").create();
        match client(&server).get_division_summary() {
            Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, StatusCode::NOT_FOUND),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        // bind then release a port so that nothing is listening on it
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let client = ApiClient::new(&url, Some(Duration::from_secs(2))).unwrap();
        assert!(matches!(
            client.fetch_data(ENDPOINT_OPPORTUNITY_DETAIL),
            Err(FetchError::Transport(_))
        ));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            ApiClient::new("localhost without scheme", None),
            Err(FetchError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn reads_server_summaries() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", ENDPOINT_LEAD_SUMMARY)
            .with_status(200)
            .with_body(
                json!({
                    "success": true,
                    "data": [
                        { "Year": 2024, "LeadType": "Referral", "TotalOpp": 4 },
                        { "Year": 2024, "LeadType": null, "TotalOpp": 1 },
                        { "Year": "2024", "LeadType": "TOTAL", "TotalOpp": 5 },
                        { "Year": null, "LeadType": "Web", "TotalOpp": 2 }
                    ]
                })
                .to_string(),
            )
            .create();

        let rows = client(&server).get_lead_summary().unwrap();
        assert_eq!(
            rows,
            vec![
                ServerSummaryRow {
                    year: 2024,
                    category: SummaryCategory::Named("Referral".to_owned()),
                    total_opp: 4
                },
                ServerSummaryRow { year: 2024, category: SummaryCategory::Unknown, total_opp: 1 },
                ServerSummaryRow { year: 2024, category: SummaryCategory::Total, total_opp: 5 },
            ]
        );
    }
}
