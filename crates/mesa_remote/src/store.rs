use mesa_core::domain::{NewReport, Report, ReportId};
use mesa_core::error::AppError;
use mesa_core::mutation::ReportPatch;
use mesa_core::remote::RemoteStore;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{map_ureq_error, ApiClient};
use crate::config::RemoteConfig;

const REPORTS: &str = "reports";

/// `RemoteStore` over the report service's REST endpoints.
#[derive(Debug, Clone)]
pub struct HttpReportStore {
    client: ApiClient,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: ReportId,
}

impl HttpReportStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self, AppError> {
        Ok(Self::new(ApiClient::new(config)?))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

fn decode_failed(op: &str, e: impl std::fmt::Display) -> AppError {
    AppError::server("REMOTE_DECODE_FAILED", "Unexpected response from the report service")
        .with_details(format!("op={op}: {e}"))
        .with_retryable(false)
}

fn encode_failed(op: &str, e: serde_json::Error) -> AppError {
    AppError::internal("REMOTE_ENCODE_FAILED", "Failed to encode request")
        .with_details(format!("op={op}: {e}"))
}

/// Decode a listing body (an array, or an object with a `reportes` array). Records that fail to
/// normalize are logged and skipped so one bad row does not block a refetch.
pub fn decode_report_list(body: &str) -> Result<Vec<Report>, AppError> {
    let root: Value = serde_json::from_str(body).map_err(|e| decode_failed("list", e))?;
    let items = match root {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("reportes") {
            Some(Value::Array(items)) => items,
            _ => return Err(decode_failed("list", "missing `reportes` array")),
        },
        _ => return Err(decode_failed("list", "expected an array")),
    };

    let total = items.len();
    let reports: Vec<Report> = items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value::<Report>(item) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(index = idx, error = %e, "skipping malformed report in listing");
                None
            }
        })
        .collect();
    debug!(total, kept = reports.len(), "listing decoded");
    Ok(reports)
}

impl RemoteStore for HttpReportStore {
    fn list(&self) -> Result<Vec<Report>, AppError> {
        let resp = self
            .client
            .request("GET", &[REPORTS])?
            .call()
            .map_err(|e| map_ureq_error("list", e))?;
        let body = resp.into_string().map_err(|e| decode_failed("list", e))?;
        decode_report_list(&body)
    }

    fn create(&self, payload: &NewReport) -> Result<ReportId, AppError> {
        let value = serde_json::to_value(payload).map_err(|e| encode_failed("create", e))?;
        let resp = self
            .client
            .request("POST", &[REPORTS])?
            .send_json(value)
            .map_err(|e| map_ureq_error("create", e))?;
        let created: CreatedResponse = resp.into_json().map_err(|e| decode_failed("create", e))?;
        Ok(created.id)
    }

    fn patch(&self, id: &ReportId, patch: &ReportPatch) -> Result<(), AppError> {
        let value = serde_json::to_value(patch).map_err(|e| encode_failed("patch", e))?;
        self.client
            .request("PATCH", &[REPORTS, id.as_str()])?
            .send_json(value)
            .map_err(|e| map_ureq_error("patch", e))?;
        Ok(())
    }

    fn delete(&self, id: &ReportId) -> Result<(), AppError> {
        self.client
            .request("DELETE", &[REPORTS, id.as_str()])?
            .call()
            .map_err(|e| map_ureq_error("delete", e))?;
        Ok(())
    }
}
