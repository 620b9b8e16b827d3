//! The "Process" button on the detail pane.
//!
//! A click snapshots the selected message and company URL, builds the path the
//! processing service expects and POSTs it. Only one request may be in flight.

use crate::config::DateEncoding;
use crate::error::ApiError;
use crate::models::{Message, MessageId};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

/// Date segment of the process path.
///
/// `Legacy` is month(2) day(2) month(1) year(2) month(1); the month really does
/// appear three times. The processing endpoint matches on this exact string.
/// 2024-06-01 encodes as `060162466`. Older integration notes quote
/// `0610162461` for that date, which does not follow this layout.
pub fn encode_date(date: NaiveDate, encoding: DateEncoding) -> String {
    match encoding {
        DateEncoding::Legacy => {
            let month = date.month();
            format!(
                "{:02}{:02}{}{:02}{}",
                month,
                date.day(),
                month,
                date.year().rem_euclid(100),
                month
            )
        }
        DateEncoding::Iso => date.format("%Y%m%d").to_string(),
    }
}

pub fn build_path(
    base_url: &str,
    date: NaiveDate,
    message_id: MessageId,
    encoding: DateEncoding,
) -> String {
    format!(
        "{}/outlook/email/{}/{}",
        base_url.trim_end_matches('/'),
        encode_date(date, encoding),
        message_id
    )
}

/// Everything needed to perform one process call, captured at click time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub endpoint: String,
    pub path: String,
    pub message_id: MessageId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProcessState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct ProcessAction {
    state: ProcessState,
    encoding: DateEncoding,
    endpoint_override: Option<String>,
}

impl ProcessAction {
    pub fn new(encoding: DateEncoding, endpoint_override: Option<String>) -> Self {
        Self {
            state: ProcessState::Idle,
            encoding,
            endpoint_override,
        }
    }

    /// Starts an attempt. Returns `None` while a previous call is still pending
    /// (the button is disabled) or when the attempt fails validation, in which
    /// case the error banner is already set.
    pub fn begin(
        &mut self,
        message: &Message,
        company_base_url: Option<&str>,
        today: NaiveDate,
    ) -> Option<ProcessRequest> {
        if self.is_in_flight() {
            return None;
        }

        let Some(base_url) = company_base_url.filter(|u| !u.trim().is_empty()) else {
            self.state = ProcessState::Failed(ApiError::MissingUrl.to_string());
            return None;
        };

        let path = build_path(base_url, today, message.id, self.encoding);
        let endpoint = self
            .endpoint_override
            .clone()
            .unwrap_or_else(|| format!("{}/", base_url.trim_end_matches('/')));

        debug!(message_id = message.id, %path, "Process started");
        self.state = ProcessState::InFlight;
        Some(ProcessRequest {
            endpoint,
            path,
            message_id: message.id,
        })
    }

    /// Settles the pending call for `message_id`. When `current` is a different
    /// message the user has moved on, so no banner is shown.
    pub fn finish(
        &mut self,
        message_id: MessageId,
        current: Option<MessageId>,
        result: Result<(), ApiError>,
    ) {
        if !self.is_in_flight() {
            return;
        }
        if current != Some(message_id) {
            debug!(message_id, ?current, ?result, "Dropping process result for another message");
            self.state = ProcessState::Idle;
            return;
        }
        self.state = match result {
            Ok(()) => ProcessState::Succeeded,
            Err(e) => {
                warn!("Process failed: {}", e);
                ProcessState::Failed(e.to_string())
            }
        };
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == ProcessState::InFlight
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    /// Drops a settled banner, e.g. when another message is opened.
    pub fn reset(&mut self) {
        if !self.is_in_flight() {
            self.state = ProcessState::Idle;
        }
    }
}
