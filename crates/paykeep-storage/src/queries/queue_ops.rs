//! Enqueue, list, patch, lease and delete queued requests.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use paykeep_core::errors::PaykeepResult;
use paykeep_core::models::{
    FormEntry, HttpMethod, QueueCounts, QueueEntryStatus, QueuedRequest, QueuedRequestPatch,
    Reservation, SerializedBody,
};

use super::{from_millis, in_transaction, to_millis};
use crate::{malformed, sqlite_err};

const SELECT_COLUMNS: &str = "id, method, url, headers, body_type, body_json, attempts,
    max_attempts, status, created_at, updated_at, available_at, last_error,
    reservation_token, reservation_expires_at, offline_id";

/// Insert a request and its form parts.
pub fn enqueue(conn: &Connection, request: &QueuedRequest) -> PaykeepResult<()> {
    in_transaction(conn, "enqueue", |conn| {
        let headers =
            serde_json::to_string(&request.headers).map_err(|e| malformed(e.to_string()))?;
        let body_json = match &request.body {
            SerializedBody::Json { value } => {
                Some(serde_json::to_string(value).map_err(|e| malformed(e.to_string()))?)
            }
            _ => None,
        };
        let (token, expires) = match &request.reservation {
            Some(r) => (Some(r.token.as_str()), Some(to_millis(r.expires_at))),
            None => (None, None),
        };

        conn.execute(
            "INSERT INTO request_queue (
                id, seq, method, url, headers, body_type, body_json, attempts,
                max_attempts, status, created_at, updated_at, available_at,
                last_error, reservation_token, reservation_expires_at, offline_id
             ) VALUES (
                ?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM request_queue),
                ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16
             )",
            params![
                request.id,
                request.method.as_str(),
                request.url,
                headers,
                request.body.kind(),
                body_json,
                request.attempts,
                request.max_attempts,
                request.status.as_str(),
                to_millis(request.created_at),
                to_millis(request.updated_at),
                to_millis(request.available_at),
                request.last_error,
                token,
                expires,
                request.offline_id,
            ],
        )
        .map_err(sqlite_err)?;

        if let SerializedBody::FormData { entries } = &request.body {
            insert_parts(conn, &request.id, entries)?;
        }
        Ok(())
    })
}

fn insert_parts(conn: &Connection, request_id: &str, entries: &[FormEntry]) -> PaykeepResult<()> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO request_queue_parts (
                request_id, position, kind, name, value, file_name, mime_type,
                last_modified, blob
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .map_err(sqlite_err)?;

    for (position, entry) in entries.iter().enumerate() {
        match entry {
            FormEntry::Text { name, value } => stmt.execute(params![
                request_id,
                position as i64,
                "text",
                name,
                value,
                None::<String>,
                None::<String>,
                None::<i64>,
                None::<Vec<u8>>,
            ]),
            FormEntry::File {
                name,
                file_name,
                mime_type,
                last_modified,
                blob,
            } => stmt.execute(params![
                request_id,
                position as i64,
                "file",
                name,
                None::<String>,
                file_name,
                mime_type,
                last_modified,
                blob,
            ]),
        }
        .map_err(sqlite_err)?;
    }
    Ok(())
}

fn load_parts(conn: &Connection, request_id: &str) -> PaykeepResult<Vec<FormEntry>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT kind, name, value, file_name, mime_type, last_modified, blob
             FROM request_queue_parts WHERE request_id = ?1 ORDER BY position",
        )
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map(params![request_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<i64>>(5)?,
                row.get::<_, Option<Vec<u8>>>(6)?,
            ))
        })
        .map_err(sqlite_err)?;

    let mut entries = Vec::new();
    for row in rows {
        let (kind, name, value, file_name, mime_type, last_modified, blob) =
            row.map_err(sqlite_err)?;
        let entry = match kind.as_str() {
            "text" => FormEntry::Text {
                name,
                value: value.unwrap_or_default(),
            },
            "file" => FormEntry::File {
                name,
                file_name: file_name.unwrap_or_default(),
                mime_type: mime_type.unwrap_or_default(),
                last_modified: last_modified.unwrap_or_default(),
                blob: blob.unwrap_or_default(),
            },
            other => {
                return Err(malformed(format!(
                    "request {request_id}: unknown form part kind {other}"
                )))
            }
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// Raw row before the body is reassembled.
struct QueueRow {
    id: String,
    method: String,
    url: String,
    headers: String,
    body_type: String,
    body_json: Option<String>,
    attempts: u32,
    max_attempts: u32,
    status: String,
    created_at: i64,
    updated_at: i64,
    available_at: i64,
    last_error: Option<String>,
    reservation_token: Option<String>,
    reservation_expires_at: Option<i64>,
    offline_id: Option<String>,
}

impl QueueRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            method: row.get(1)?,
            url: row.get(2)?,
            headers: row.get(3)?,
            body_type: row.get(4)?,
            body_json: row.get(5)?,
            attempts: row.get(6)?,
            max_attempts: row.get(7)?,
            status: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            available_at: row.get(11)?,
            last_error: row.get(12)?,
            reservation_token: row.get(13)?,
            reservation_expires_at: row.get(14)?,
            offline_id: row.get(15)?,
        })
    }

    fn into_request(self, conn: &Connection) -> PaykeepResult<QueuedRequest> {
        let method: HttpMethod = self.method.parse()?;
        let headers: BTreeMap<String, String> = serde_json::from_str(&self.headers)
            .map_err(|e| malformed(format!("request {}: headers: {e}", self.id)))?;
        let body = match self.body_type.as_str() {
            "none" => SerializedBody::None,
            "json" => {
                let raw = self.body_json.as_deref().unwrap_or("null");
                let value = serde_json::from_str(raw)
                    .map_err(|e| malformed(format!("request {}: body: {e}", self.id)))?;
                SerializedBody::Json { value }
            }
            "formData" => SerializedBody::FormData {
                entries: load_parts(conn, &self.id)?,
            },
            other => {
                return Err(malformed(format!(
                    "request {}: unknown body type {other}",
                    self.id
                )))
            }
        };
        let reservation = match (self.reservation_token, self.reservation_expires_at) {
            (Some(token), Some(expires)) => Some(Reservation {
                token,
                expires_at: from_millis(expires)?,
            }),
            _ => None,
        };

        Ok(QueuedRequest {
            method,
            url: self.url,
            headers,
            body,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            status: self.status.parse()?,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
            available_at: from_millis(self.available_at)?,
            last_error: self.last_error,
            reservation,
            offline_id: self.offline_id,
            id: self.id,
        })
    }
}

/// All entries, oldest first (creation time, then insertion order).
pub fn list_queued(conn: &Connection) -> PaykeepResult<Vec<QueuedRequest>> {
    let rows = {
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {SELECT_COLUMNS} FROM request_queue ORDER BY created_at, seq"
            ))
            .map_err(sqlite_err)?;
        let mapped = stmt
            .query_map([], QueueRow::from_row)
            .map_err(sqlite_err)?;
        mapped
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sqlite_err)?
    };
    rows.into_iter().map(|row| row.into_request(conn)).collect()
}

pub fn get_queued(conn: &Connection, id: &str) -> PaykeepResult<Option<QueuedRequest>> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM request_queue WHERE id = ?1"),
            params![id],
            QueueRow::from_row,
        )
        .optional()
        .map_err(sqlite_err)?;
    row.map(|r| r.into_request(conn)).transpose()
}

/// Merge `patch` into the stored entry. `None` when it no longer exists.
pub fn update_queued(
    conn: &Connection,
    id: &str,
    patch: &QueuedRequestPatch,
    now: DateTime<Utc>,
) -> PaykeepResult<Option<QueuedRequest>> {
    in_transaction(conn, "update_queued", |conn| {
        let Some(mut entry) = get_queued(conn, id)? else {
            return Ok(None);
        };
        patch.apply(&mut entry, now);
        let (token, expires) = match &entry.reservation {
            Some(r) => (Some(r.token.clone()), Some(to_millis(r.expires_at))),
            None => (None, None),
        };
        conn.execute(
            "UPDATE request_queue SET
                url = ?2, attempts = ?3, status = ?4, updated_at = ?5,
                available_at = ?6, last_error = ?7, reservation_token = ?8,
                reservation_expires_at = ?9
             WHERE id = ?1",
            params![
                id,
                entry.url,
                entry.attempts,
                entry.status.as_str(),
                to_millis(entry.updated_at),
                to_millis(entry.available_at),
                entry.last_error,
                token,
                expires,
            ],
        )
        .map_err(sqlite_err)?;
        Ok(Some(entry))
    })
}

/// Delete one entry (parts cascade). `false` if it was already gone.
pub fn delete_queued(conn: &Connection, id: &str) -> PaykeepResult<bool> {
    let deleted = conn
        .execute("DELETE FROM request_queue WHERE id = ?1", params![id])
        .map_err(sqlite_err)?;
    Ok(deleted > 0)
}

pub fn clear_queue(conn: &Connection) -> PaykeepResult<usize> {
    conn.execute("DELETE FROM request_queue", [])
        .map_err(sqlite_err)
}

pub fn clear_failed(conn: &Connection) -> PaykeepResult<usize> {
    conn.execute(
        "DELETE FROM request_queue WHERE status = ?1",
        params![QueueEntryStatus::Failed.as_str()],
    )
    .map_err(sqlite_err)
}

/// Take the lease on a pending entry. Succeeds when nobody holds it, the
/// current lease has expired, or `token` already holds it.
pub fn try_reserve(
    conn: &Connection,
    id: &str,
    token: &str,
    now: DateTime<Utc>,
    ttl: Duration,
) -> PaykeepResult<bool> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    let expires = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
    let updated = conn
        .execute(
            "UPDATE request_queue
             SET reservation_token = ?2, reservation_expires_at = ?3, updated_at = ?4
             WHERE id = ?1
               AND status = 'pending'
               AND (reservation_token IS NULL
                    OR reservation_expires_at <= ?4
                    OR reservation_token = ?2)",
            params![id, token, to_millis(expires), to_millis(now)],
        )
        .map_err(sqlite_err)?;
    Ok(updated == 1)
}

pub fn release_reservation(conn: &Connection, id: &str, token: &str) -> PaykeepResult<bool> {
    let updated = conn
        .execute(
            "UPDATE request_queue
             SET reservation_token = NULL, reservation_expires_at = NULL
             WHERE id = ?1 AND reservation_token = ?2",
            params![id, token],
        )
        .map_err(sqlite_err)?;
    Ok(updated == 1)
}

pub fn queue_counts(conn: &Connection) -> PaykeepResult<QueueCounts> {
    let mut stmt = conn
        .prepare_cached("SELECT status, COUNT(*) FROM request_queue GROUP BY status")
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(sqlite_err)?;

    let mut counts = QueueCounts::default();
    for row in rows {
        let (status, count) = row.map_err(sqlite_err)?;
        match status.parse()? {
            QueueEntryStatus::Pending => counts.pending = count as usize,
            QueueEntryStatus::Failed => counts.failed = count as usize,
        }
    }
    Ok(counts)
}

pub fn next_available_at(conn: &Connection) -> PaykeepResult<Option<DateTime<Utc>>> {
    let ms: Option<i64> = conn
        .query_row(
            "SELECT MIN(available_at) FROM request_queue WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )
        .map_err(sqlite_err)?;
    ms.map(from_millis).transpose()
}

/// Replace the path segment `from` with `to` in every queued URL.
/// Returns the number of entries rewritten.
pub fn rewrite_queued_urls(
    conn: &Connection,
    from: &str,
    to: &str,
    now: DateTime<Utc>,
) -> PaykeepResult<usize> {
    in_transaction(conn, "rewrite_queued_urls", |conn| {
        let rows: Vec<(String, String)> = {
            let mut stmt = conn
                .prepare_cached("SELECT id, url FROM request_queue")
                .map_err(sqlite_err)?;
            let mapped = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(sqlite_err)?;
            mapped
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(sqlite_err)?
        };

        let mut rewritten = 0;
        for (id, url) in rows {
            if let Some(new_url) = replace_path_segment(&url, from, to) {
                conn.execute(
                    "UPDATE request_queue SET url = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id, new_url, to_millis(now)],
                )
                .map_err(sqlite_err)?;
                rewritten += 1;
            }
        }
        Ok(rewritten)
    })
}

/// Replace whole path segments equal to `from`. The query string and
/// fragment are left alone. `None` when nothing matched.
pub fn replace_path_segment(url: &str, from: &str, to: &str) -> Option<String> {
    if from.is_empty() {
        return None;
    }
    let split = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
    let (path, tail) = url.split_at(split);

    let mut changed = false;
    let segments: Vec<&str> = path
        .split('/')
        .map(|segment| {
            if segment == from {
                changed = true;
                to
            } else {
                segment
            }
        })
        .collect();

    changed.then(|| format!("{}{tail}", segments.join("/")))
}

#[cfg(test)]
mod tests {
    use super::replace_path_segment;

    #[test]
    fn replaces_whole_segments_only() {
        assert_eq!(
            replace_path_segment("/payments/payment-abc/complete", "payment-abc", "42").as_deref(),
            Some("/payments/42/complete")
        );
        assert_eq!(
            replace_path_segment("/payments/payment-abcd", "payment-abc", "42"),
            None
        );
    }

    #[test]
    fn leaves_query_string_untouched() {
        assert_eq!(
            replace_path_segment("http://h/api/files/upload/payment/p1?ref=p1", "p1", "9").as_deref(),
            Some("http://h/api/files/upload/payment/9?ref=p1")
        );
    }

    #[test]
    fn empty_needle_never_matches() {
        assert_eq!(replace_path_segment("/a//b", "", "x"), None);
    }
}
