use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::body::SerializedBody;
use super::http::HttpMethod;
use crate::constants::QUEUED_REQUEST_PREFIX;
use crate::errors::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueEntryStatus {
    /// Waiting for (re)delivery.
    Pending,
    /// Terminal. Kept until the user retries or discards it.
    Failed,
}

impl QueueEntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueEntryStatus::Pending => "pending",
            QueueEntryStatus::Failed => "failed",
        }
    }
}

impl FromStr for QueueEntryStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueEntryStatus::Pending),
            "failed" => Ok(QueueEntryStatus::Failed),
            other => Err(StorageError::MalformedRecord {
                details: format!("unknown queue entry status: {other}"),
            }),
        }
    }
}

/// Lease a sweep holds on an entry while transmitting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// A mutation captured while offline, waiting for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedRequest {
    pub id: String,
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    pub body: SerializedBody,
    pub attempts: u32,
    pub max_attempts: u32,
    pub status: QueueEntryStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub available_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation: Option<Reservation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_id: Option<String>,
}

impl QueuedRequest {
    /// A fresh pending entry, due immediately.
    pub fn new(
        method: HttpMethod,
        url: impl Into<String>,
        headers: BTreeMap<String, String>,
        body: SerializedBody,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("{QUEUED_REQUEST_PREFIX}-{}", uuid::Uuid::new_v4()),
            method,
            url: url.into(),
            headers,
            body,
            attempts: 0,
            max_attempts,
            status: QueueEntryStatus::Pending,
            created_at: now,
            updated_at: now,
            available_at: now,
            last_error: None,
            reservation: None,
            offline_id: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == QueueEntryStatus::Failed
    }

    /// Pending and past its backoff.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_failed() && self.available_at <= now
    }

    pub fn is_reserved(&self, now: DateTime<Utc>) -> bool {
        self.reservation.as_ref().is_some_and(|r| r.is_active(now))
    }
}

/// Partial update merged by `QueueStore::update_queued`.
///
/// The nested options on `last_error` and `reservation` distinguish
/// "leave alone" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueuedRequestPatch {
    pub attempts: Option<u32>,
    pub last_error: Option<Option<String>>,
    pub available_at: Option<DateTime<Utc>>,
    pub reservation: Option<Option<Reservation>>,
    pub status: Option<QueueEntryStatus>,
    pub url: Option<String>,
}

impl QueuedRequestPatch {
    /// Apply onto `entry`, stamping `updated_at`.
    pub fn apply(&self, entry: &mut QueuedRequest, now: DateTime<Utc>) {
        if let Some(attempts) = self.attempts {
            entry.attempts = attempts;
        }
        if let Some(last_error) = &self.last_error {
            entry.last_error = last_error.clone();
        }
        if let Some(available_at) = self.available_at {
            entry.available_at = available_at;
        }
        if let Some(reservation) = &self.reservation {
            entry.reservation = reservation.clone();
        }
        if let Some(status) = self.status {
            entry.status = status;
        }
        if let Some(url) = &self.url {
            entry.url = url.clone();
        }
        entry.updated_at = now;
    }
}
