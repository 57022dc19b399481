//! API usage tracking
//!
//! Append-only per-day log of request metadata for offline analytics.
//! Never read synchronously by request handling; a failed append is a
//! lost data point, not a failed request.

use chrono::{DateTime, NaiveDate, Utc};
use compass_cache::CacheFacade;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USAGE_NS: &str = "usage:";

/// One request's worth of usage metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUsageRecord {
    pub method: String,
    pub path: String,
    pub identity: String,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
}

/// Rolling per-day usage log
#[derive(Debug, Clone)]
pub struct UsageTracker {
    cache: CacheFacade,
    retention: Duration,
}

impl UsageTracker {
    /// Week-long retention by default
    pub fn new(cache: CacheFacade) -> Self {
        Self {
            cache,
            retention: Duration::from_secs(7 * 24 * 3600),
        }
    }

    fn day_key(date: NaiveDate) -> String {
        format!("{}{}", USAGE_NS, date.format("%Y-%m-%d"))
    }

    /// Append a usage record to today's list
    pub async fn record(&self, method: &str, path: &str, identity: &str, status: u16) {
        let record = ApiUsageRecord {
            method: method.to_string(),
            path: path.to_string(),
            identity: identity.to_string(),
            status,
            timestamp: Utc::now(),
        };

        let key = Self::day_key(record.timestamp.date_naive());
        if let Err(err) = self.cache.push(&key, &record, Some(self.retention)).await {
            tracing::warn!(key, error = %err, "usage record dropped");
        }
    }

    /// All records for a day (analytics/offline use)
    pub async fn records_for(&self, date: NaiveDate) -> Vec<ApiUsageRecord> {
        match self.cache.range(&Self::day_key(date), 0, -1).await {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "usage log read failed");
                Vec::new()
            }
        }
    }
}
