//! Capture accumulator and the serialized capture record.
//!
//! `CaptureLog` is append-only: every relevant request, response and dialog
//! seen during a run is kept in arrival order. The record written to disk is
//! derived from it by `CaptureLog::record`, which keeps one observation of each
//! kind according to the `CapturePolicy`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Which relevant exchange survives when the page issues it more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapturePolicy {
    /// Later matches overwrite earlier ones.
    #[default]
    Last,
    /// The first relevant exchange is kept.
    First,
}

impl CapturePolicy {
    fn pick<'a, T>(self, items: &'a [T]) -> Option<&'a T> {
        match self {
            Self::Last => items.last(),
            Self::First => items.first(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub status: u16,
    pub url: String,
    /// Empty when the body could not be read.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogRecord {
    /// alert, confirm, prompt or beforeunload
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// What a run writes to the record file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub run_id: Uuid,
    pub target_url: String,
    pub captured_at: DateTime<Utc>,
    pub request: Option<RequestRecord>,
    pub response: Option<ResponseRecord>,
    pub dialog: Option<DialogRecord>,
    pub matched_requests: usize,
    pub matched_responses: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Handle to a logged response whose body may arrive later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSlot(usize);

#[derive(Debug, Default)]
pub struct CaptureLog {
    requests: Vec<RequestRecord>,
    responses: Vec<ResponseRecord>,
    dialogs: Vec<DialogRecord>,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_request(&mut self, request: RequestRecord) {
        self.requests.push(request);
    }

    /// Log a response with an empty body and return the slot to fill it later.
    pub fn push_response(&mut self, status: u16, url: String) -> ResponseSlot {
        self.responses.push(ResponseRecord {
            status,
            url,
            body: String::new(),
        });
        ResponseSlot(self.responses.len() - 1)
    }

    pub fn set_response_body(&mut self, slot: ResponseSlot, body: String) {
        if let Some(response) = self.responses.get_mut(slot.0) {
            response.body = body;
        }
    }

    pub fn push_dialog(&mut self, dialog: DialogRecord) {
        self.dialogs.push(dialog);
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    pub fn record(&self, policy: CapturePolicy, target_url: &str) -> CaptureRecord {
        CaptureRecord {
            run_id: Uuid::new_v4(),
            target_url: target_url.to_string(),
            captured_at: Utc::now(),
            request: policy.pick(&self.requests).cloned(),
            response: policy.pick(&self.responses).cloned(),
            // A dialog is not an exchange; the latest one is always reported.
            dialog: self.dialogs.last().cloned(),
            matched_requests: self.requests.len(),
            matched_responses: self.responses.len(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn put(url: &str) -> RequestRecord {
        RequestRecord {
            method: "PUT".to_string(),
            url: url.to_string(),
            headers: BTreeMap::new(),
        }
    }

    #[test]
    fn empty_log_yields_null_fields() {
        let record = CaptureLog::new().record(CapturePolicy::Last, "http://localhost/app#list");
        assert_eq!(record.request, None);
        assert_eq!(record.response, None);
        assert_eq!(record.dialog, None);
        assert_eq!(record.matched_requests, 0);

        let json = serde_json::to_value(&record).expect("serialize");
        assert!(json["request"].is_null());
        assert!(json["response"].is_null());
        assert!(json["dialog"].is_null());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn last_policy_keeps_latest_exchange() {
        let mut log = CaptureLog::new();
        log.push_request(put("http://h/api/docs/1/pdf"));
        log.push_request(put("http://h/api/docs/2/pdf"));
        let first = log.push_response(500, "http://h/api/docs/1/pdf".to_string());
        let second = log.push_response(200, "http://h/api/docs/2/pdf".to_string());
        log.set_response_body(first, "boom".to_string());
        log.set_response_body(second, "{\"ok\":true}".to_string());

        let record = log.record(CapturePolicy::Last, "http://h/app");
        assert_eq!(record.request, Some(put("http://h/api/docs/2/pdf")));
        let response = record.response.expect("response");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{\"ok\":true}");
        assert_eq!(record.matched_requests, 2);
        assert_eq!(record.matched_responses, 2);
    }

    #[test]
    fn first_policy_keeps_earliest_exchange() {
        let mut log = CaptureLog::new();
        log.push_request(put("http://h/api/docs/1/pdf"));
        log.push_request(put("http://h/api/docs/2/pdf"));
        log.push_response(500, "http://h/api/docs/1/pdf".to_string());
        log.push_response(200, "http://h/api/docs/2/pdf".to_string());

        let record = log.record(CapturePolicy::First, "http://h/app");
        assert_eq!(record.request, Some(put("http://h/api/docs/1/pdf")));
        assert_eq!(record.response.map(|r| r.status), Some(500));
    }

    #[test]
    fn unfilled_body_stays_empty() {
        let mut log = CaptureLog::new();
        log.push_response(200, "http://h/api/docs/1/pdf".to_string());
        let record = log.record(CapturePolicy::Last, "http://h/app");
        assert_eq!(record.response.map(|r| r.body), Some(String::new()));
    }

    #[test]
    fn dialog_serializes_with_type_key() {
        let mut log = CaptureLog::new();
        log.push_dialog(DialogRecord {
            kind: "confirm".to_string(),
            message: "¿Reemplazar el documento?".to_string(),
        });
        let json = serde_json::to_value(log.record(CapturePolicy::Last, "http://h/app"))
            .expect("serialize");
        assert_eq!(json["dialog"]["type"], "confirm");
        assert_eq!(json["dialog"]["message"], "¿Reemplazar el documento?");
    }
}
