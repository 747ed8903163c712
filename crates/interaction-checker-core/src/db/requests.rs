//! Addition requests and lookup logs.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::{Database, DbError, DbResult};
use crate::backend::{LookupLog, RequestKind};
use crate::resolver::normalize_token;

/// A stored "add substance" request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRequest {
    pub request_id: String,
    pub substance_name: String,
    pub normalized_name: String,
    pub kind: RequestKind,
    /// How many times this name has been requested
    pub request_count: u32,
    pub status: String,
}

impl Database {
    /// Record a request to add a substance. A repeat request for the same
    /// normalized name bumps the existing row's count and keeps its id.
    pub fn record_addition_request(&self, raw_name: &str, kind: RequestKind) -> DbResult<StoredRequest> {
        let normalized = normalize_token(raw_name);
        if normalized.is_empty() {
            return Err(DbError::Constraint("raw_name must be a non-empty string".into()));
        }

        self.conn.execute(
            r#"
            INSERT INTO interaction_requests (request_id, substance_name, normalized_name, kind)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(normalized_name) DO UPDATE SET
                request_count = request_count + 1,
                kind = CASE WHEN interaction_requests.kind = 'unknown' THEN excluded.kind
                            ELSE interaction_requests.kind END,
                updated_at = datetime('now')
            "#,
            params![
                uuid::Uuid::new_v4().to_string(),
                raw_name.trim(),
                normalized.as_str(),
                kind_to_string(kind),
            ],
        )?;

        self.get_request_by_name(normalized.as_str())?
            .ok_or_else(|| DbError::NotFound(format!("request for {normalized}")))
    }

    fn get_request_by_name(&self, normalized_name: &str) -> DbResult<Option<StoredRequest>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT request_id, substance_name, normalized_name, kind, request_count, status
            FROM interaction_requests
            WHERE normalized_name = ?
            "#,
        )?;
        let mut rows = stmt.query_map([normalized_name], RequestRow::from_row)?;
        rows.next().transpose()?.map(StoredRequest::try_from).transpose()
    }

    /// Pending requests, most requested first.
    pub fn list_addition_requests(&self) -> DbResult<Vec<StoredRequest>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT request_id, substance_name, normalized_name, kind, request_count, status
            FROM interaction_requests
            ORDER BY request_count DESC, created_at ASC, normalized_name ASC
            "#,
        )?;
        let rows = stmt.query_map([], RequestRow::from_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?.try_into()?);
        }
        Ok(requests)
    }

    /// Append a lookup log entry.
    pub fn insert_lookup_log(&self, log: &LookupLog) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO lookup_logs (
                mode, inputs, normalized_inputs, resolved_substance_ids,
                unresolved_inputs, results_summary, has_results, logged_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                log.mode,
                serde_json::to_string(&log.inputs)?,
                serde_json::to_string(&log.normalized_inputs)?,
                serde_json::to_string(&log.resolved_substance_ids)?,
                serde_json::to_string(&log.unresolved_inputs)?,
                serde_json::to_string(&log.results_summary)?,
                log.has_results,
                log.logged_at,
            ],
        )?;
        Ok(())
    }

    pub fn count_lookup_logs(&self) -> DbResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM lookup_logs", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn kind_to_string(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Supplement => "supplement",
        RequestKind::Medication => "medication",
        RequestKind::Unknown => "unknown",
    }
}

fn string_to_kind(s: &str) -> RequestKind {
    match s {
        "supplement" => RequestKind::Supplement,
        "medication" => RequestKind::Medication,
        _ => RequestKind::Unknown,
    }
}

/// Intermediate row struct for database mapping.
struct RequestRow {
    request_id: String,
    substance_name: String,
    normalized_name: String,
    kind: String,
    request_count: i64,
    status: String,
}

impl RequestRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            request_id: row.get(0)?,
            substance_name: row.get(1)?,
            normalized_name: row.get(2)?,
            kind: row.get(3)?,
            request_count: row.get(4)?,
            status: row.get(5)?,
        })
    }
}

impl TryFrom<RequestRow> for StoredRequest {
    type Error = DbError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let request_count = u32::try_from(row.request_count)
            .map_err(|_| DbError::Constraint(format!("request_count out of range: {}", row.request_count)))?;
        Ok(StoredRequest {
            request_id: row.request_id,
            substance_name: row.substance_name,
            normalized_name: row.normalized_name,
            kind: string_to_kind(&row.kind),
            request_count,
            status: row.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckSummary;

    #[test]
    fn test_duplicate_requests_increment_count() {
        let db = Database::open_in_memory().unwrap();

        let first = db.record_addition_request("Xyzzyx123", RequestKind::Unknown).unwrap();
        assert_eq!(first.request_count, 1);

        let second = db
            .record_addition_request("  XYZZYX123 ", RequestKind::Supplement)
            .unwrap();
        assert_eq!(second.request_id, first.request_id);
        assert_eq!(second.request_count, 2);
        // Unknown kind is upgraded by a later, more specific request
        assert_eq!(second.kind, RequestKind::Supplement);
        // Original spelling kept
        assert_eq!(second.substance_name, "Xyzzyx123");
    }

    #[test]
    fn test_list_orders_by_count() {
        let db = Database::open_in_memory().unwrap();
        db.record_addition_request("Ashwagandha", RequestKind::Supplement).unwrap();
        db.record_addition_request("Berberine", RequestKind::Supplement).unwrap();
        db.record_addition_request("berberine", RequestKind::Supplement).unwrap();

        let requests = db.list_addition_requests().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].normalized_name, "berberine");
        assert_eq!(requests[0].status, "pending");
    }

    #[test]
    fn test_empty_name_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.record_addition_request(" !! ", RequestKind::Unknown),
            Err(DbError::Constraint(_))
        ));
    }

    #[test]
    fn test_lookup_log() {
        let db = Database::open_in_memory().unwrap();
        let log = LookupLog {
            inputs: vec!["Vitamin K".into(), "Warfarin".into()],
            normalized_inputs: vec!["vitamin k".into(), "warfarin".into()],
            resolved_substance_ids: vec!["S_VITK".into(), "S_WARF".into()],
            unresolved_inputs: vec![],
            results_summary: CheckSummary::default(),
            has_results: false,
            mode: "stack".into(),
            logged_at: "2024-01-01T00:00:00Z".into(),
        };
        db.insert_lookup_log(&log).unwrap();
        assert_eq!(db.count_lookup_logs().unwrap(), 1);
    }
}
