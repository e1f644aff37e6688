//! Dead Letter Queue (DLQ) for poison messages.
//!
//! Keeps every message the ingestion pipeline could not decode or validate,
//! with its original queue position and the rejection reason, so operators
//! can inspect, fix upstream, and resolve or discard entries.
//!
//! A message that is redelivered (its commit was lost) lands on the same row:
//! the entry is keyed by `(topic, partition, offset)` and only its occurrence
//! counter and `last_failed_at` move.

use chrono::{DateTime, Utc};
use orderflow_core::dead_letter::{DeadLetter, DeadLetterError, DeadLetterFuture, DeadLetterSink, PoisonKind};
use orderflow_core::store::StoreError;
use sqlx::{PgPool, Row};

/// Status of a poison message in the Dead Letter Queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DLQStatus {
    /// Waiting for investigation
    Pending,
    /// The upstream problem was fixed and the order republished
    Resolved,
    /// Permanently dropped
    Discarded,
}

impl DLQStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Discarded => "discarded",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns error if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "discarded" => Ok(Self::Discarded),
            _ => Err(StoreError::Serialization(format!("Invalid DLQ status: {s}"))),
        }
    }
}

/// An entry in the Dead Letter Queue.
#[derive(Debug, Clone)]
pub struct PoisonMessage {
    /// Unique identifier for this DLQ entry
    pub id: i64,
    /// Source topic
    pub topic: String,
    /// Source partition
    pub partition: i32,
    /// Source offset
    pub offset: i64,
    /// Message key, if any
    pub key: Option<Vec<u8>>,
    /// Raw payload as received
    pub payload: Vec<u8>,
    /// Failure class
    pub kind: PoisonKind,
    /// Rejection detail
    pub reason: String,
    /// How many times this message was rejected
    pub occurrences: i32,
    /// First rejection
    pub first_failed_at: DateTime<Utc>,
    /// Most recent rejection
    pub last_failed_at: DateTime<Utc>,
    /// Current status
    pub status: DLQStatus,
    /// When the entry was resolved or discarded
    pub resolved_at: Option<DateTime<Utc>>,
    /// Who resolved it
    pub resolved_by: Option<String>,
    /// Resolution notes
    pub resolution_notes: Option<String>,
}

/// `PostgreSQL`-based Dead Letter Queue for poison messages.
///
/// # Example
///
/// ```no_run
/// use orderflow_postgres::{DeadLetterQueue, DLQStatus};
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let dlq = DeadLetterQueue::new(pool);
///
/// let pending = dlq.list_pending(100).await?;
/// println!("Pending poison messages: {}", pending.len());
///
/// if let Some(entry) = pending.first() {
///     dlq.mark_discarded(entry.id, "test payload from staging").await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DeadLetterQueue {
    pool: PgPool,
}

impl DeadLetterQueue {
    /// Create a new Dead Letter Queue with the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a rejected message, or bump the counter if it is already stored.
    ///
    /// # Returns
    ///
    /// The ID of the DLQ entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the insert fails.
    pub async fn add_entry(&self, letter: &DeadLetter) -> Result<i64, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO poison_messages (
                topic, message_partition, message_offset, message_key, payload,
                kind, reason, first_failed_at, last_failed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (topic, message_partition, message_offset) DO UPDATE
            SET occurrences    = poison_messages.occurrences + 1,
                reason         = EXCLUDED.reason,
                last_failed_at = EXCLUDED.last_failed_at
            RETURNING id
            ",
        )
        .bind(&letter.message.topic)
        .bind(letter.message.partition)
        .bind(letter.message.offset)
        .bind(letter.message.key.as_deref())
        .bind(&letter.message.payload)
        .bind(letter.kind.as_str())
        .bind(&letter.reason)
        .bind(letter.failed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Persistence(e.to_string()))?;

        tracing::warn!(
            dlq_id = id,
            topic = %letter.message.topic,
            partition = letter.message.partition,
            offset = letter.message.offset,
            kind = letter.kind.as_str(),
            reason = %letter.reason,
            "Poison message added to Dead Letter Queue"
        );

        metrics::counter!("orderflow_dlq_added_total", "kind" => letter.kind.as_str())
            .increment(1);

        Ok(id)
    }

    /// List pending entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the query fails.
    pub async fn list_pending(&self, limit: usize) -> Result<Vec<PoisonMessage>, StoreError> {
        self.list_by_status(DLQStatus::Pending, limit).await
    }

    /// List entries by status, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the query fails, or
    /// [`StoreError::Serialization`] if a row holds an unknown status or kind.
    pub async fn list_by_status(
        &self,
        status: DLQStatus,
        limit: usize,
    ) -> Result<Vec<PoisonMessage>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r"
            SELECT id, topic, message_partition, message_offset, message_key, payload,
                   kind, reason, occurrences, first_failed_at, last_failed_at,
                   status, resolved_at, resolved_by, resolution_notes
            FROM poison_messages
            WHERE status = $1
            ORDER BY first_failed_at ASC
            LIMIT $2
            ",
        )
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Persistence(e.to_string()))?;

        rows.iter().map(Self::row_to_poison_message).collect()
    }

    /// Mark an entry as resolved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the update fails.
    pub async fn mark_resolved(
        &self,
        id: i64,
        resolved_by: &str,
        notes: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE poison_messages
            SET status = 'resolved',
                resolved_at = NOW(),
                resolved_by = $1,
                resolution_notes = $2
            WHERE id = $3
            ",
        )
        .bind(resolved_by)
        .bind(notes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Persistence(e.to_string()))?;

        tracing::info!(dlq_id = id, resolved_by = resolved_by, "DLQ entry marked as resolved");

        metrics::counter!("orderflow_dlq_resolved_total").increment(1);

        Ok(())
    }

    /// Mark an entry as permanently discarded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the update fails.
    pub async fn mark_discarded(&self, id: i64, reason: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE poison_messages
            SET status = 'discarded',
                resolved_at = NOW(),
                resolution_notes = $1
            WHERE id = $2
            ",
        )
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Persistence(e.to_string()))?;

        tracing::warn!(dlq_id = id, reason = reason, "DLQ entry marked as discarded");

        metrics::counter!("orderflow_dlq_discarded_total").increment(1);

        Ok(())
    }

    /// Count pending entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the query fails.
    pub async fn count_pending(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*)
            FROM poison_messages
            WHERE status = 'pending'
            ",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Persistence(e.to_string()))?;

        Ok(count)
    }

    /// Convert a database row to a `PoisonMessage`.
    fn row_to_poison_message(row: &sqlx::postgres::PgRow) -> Result<PoisonMessage, StoreError> {
        let status_str: String = row.get("status");
        let status = DLQStatus::parse(&status_str)?;

        let kind_str: String = row.get("kind");
        let kind = PoisonKind::parse(&kind_str)
            .ok_or_else(|| StoreError::Serialization(format!("Invalid poison kind: {kind_str}")))?;

        Ok(PoisonMessage {
            id: row.get("id"),
            topic: row.get("topic"),
            partition: row.get("message_partition"),
            offset: row.get("message_offset"),
            key: row.get("message_key"),
            payload: row.get("payload"),
            kind,
            reason: row.get("reason"),
            occurrences: row.get("occurrences"),
            first_failed_at: row.get("first_failed_at"),
            last_failed_at: row.get("last_failed_at"),
            status,
            resolved_at: row.get("resolved_at"),
            resolved_by: row.get("resolved_by"),
            resolution_notes: row.get("resolution_notes"),
        })
    }
}

impl DeadLetterSink for DeadLetterQueue {
    fn record(&self, letter: DeadLetter) -> DeadLetterFuture<'_> {
        Box::pin(async move {
            self.add_entry(&letter)
                .await
                .map(|_| ())
                .map_err(|e| DeadLetterError::WriteFailed(e.to_string()))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn dlq_status_roundtrip() {
        for status in &[DLQStatus::Pending, DLQStatus::Resolved, DLQStatus::Discarded] {
            let s = status.as_str();
            let parsed = DLQStatus::parse(s).expect("valid status should parse");
            assert_eq!(*status, parsed);
        }
    }

    #[test]
    fn dlq_status_invalid() {
        assert!(DLQStatus::parse("processing").is_err());
    }
}
