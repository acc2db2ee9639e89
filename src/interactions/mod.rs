//! Append-only log of answered questions and the user's feedback
//! Rows are inserted, never updated or deleted

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Stored timestamp format (local time)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// User verdict on an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feedback {
    #[serde(rename = "thumbs_up")]
    Positive,
    #[serde(rename = "thumbs_down")]
    Negative,
}

impl Feedback {
    /// Label persisted in the `feedback` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Positive => "thumbs_up",
            Feedback::Negative => "thumbs_down",
        }
    }

    /// Decode a stored label. Only the exact persisted labels are accepted;
    /// the lenient `FromStr` is for user input.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "thumbs_up" => Some(Feedback::Positive),
            "thumbs_down" => Some(Feedback::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feedback {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thumbs_up" | "up" | "positive" | "y" | "yes" | "+" => Ok(Feedback::Positive),
            "thumbs_down" | "down" | "negative" | "n" | "no" | "-" => Ok(Feedback::Negative),
            other => Err(anyhow::anyhow!("Unknown feedback label: {}", other)),
        }
    }
}

/// One stored interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionLogEntry {
    pub id: i64,
    pub user_query: String,
    pub response: String,
    pub feedback: Option<Feedback>,
    pub timestamp: String,
}

/// Row counts by feedback label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub positive: i64,
    pub negative: i64,
    pub none: i64,
}

impl FeedbackSummary {
    pub fn total(&self) -> i64 {
        self.positive + self.negative + self.none
    }
}

/// Writer (and reader) for the `logs` table
#[derive(Debug, Clone)]
pub struct InteractionLogger {
    pool: SqlitePool,
}

impl InteractionLogger {
    /// Create new logger over an already-migrated database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one interaction stamped with the current local time.
    /// Returns the storage-assigned id.
    pub async fn record(
        &self,
        user_query: &str,
        response: &str,
        feedback: Option<Feedback>,
    ) -> Result<i64> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();

        let result = sqlx::query(
            r#"
            INSERT INTO logs (user_query, response, feedback, timestamp)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_query)
        .bind(response)
        .bind(feedback.map(|f| f.as_str()))
        .bind(timestamp.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to append interaction log entry")?;

        let id = result.last_insert_rowid();
        info!(
            id,
            feedback = feedback.map(|f| f.as_str()).unwrap_or("none"),
            "Logged interaction"
        );
        Ok(id)
    }

    /// Number of stored interactions
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM logs")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count interaction log entries")?;
        Ok(count)
    }

    /// Most recent interactions, newest first
    pub async fn recent(&self, limit: u32) -> Result<Vec<InteractionLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_query, response, feedback, timestamp
            FROM logs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to read interaction log")?;

        rows.into_iter()
            .map(|row| -> Result<InteractionLogEntry> {
                let feedback: Option<String> = row.try_get("feedback")?;
                Ok(InteractionLogEntry {
                    id: row.try_get("id")?,
                    user_query: row.try_get::<Option<String>, _>("user_query")?.unwrap_or_default(),
                    response: row.try_get::<Option<String>, _>("response")?.unwrap_or_default(),
                    // Labels written by other tools are shown as no feedback
                    feedback: feedback.as_deref().and_then(Feedback::from_label),
                    timestamp: row.try_get::<Option<String>, _>("timestamp")?.unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Count rows per feedback label
    pub async fn feedback_summary(&self) -> Result<FeedbackSummary> {
        let rows = sqlx::query("SELECT feedback, COUNT(*) AS n FROM logs GROUP BY feedback")
            .fetch_all(&self.pool)
            .await
            .context("Failed to summarize feedback")?;

        let mut summary = FeedbackSummary::default();
        for row in rows {
            let label: Option<String> = row.try_get("feedback")?;
            let n: i64 = row.try_get("n")?;
            match label.as_deref().and_then(Feedback::from_label) {
                Some(Feedback::Positive) => summary.positive += n,
                Some(Feedback::Negative) => summary.negative += n,
                None => summary.none += n,
            }
        }

        Ok(summary)
    }
}
