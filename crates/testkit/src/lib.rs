use chrono::{DateTime, Duration, TimeZone, Utc};
use logdock_core::ids::new_record_id;
use logdock_core::model::log::{LogLevel, LogRecord};
use serde_json::{Map, Value, json};

pub fn base_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
}

/// The canonical database-failure record, as a caller would post it.
pub fn sample_candidate() -> Value {
    json!({
        "level": "error",
        "message": "Database connection failed",
        "resourceId": "db-server-01",
        "timestamp": "2024-01-01T10:00:00Z",
        "traceId": "trace-001",
        "spanId": "span-001",
        "commit": "abc123",
        "metadata": {"retryCount": 3}
    })
}

pub fn candidate(level: &str, message: &str, resource_id: &str, timestamp: &str) -> Value {
    json!({
        "level": level,
        "message": message,
        "resourceId": resource_id,
        "timestamp": timestamp,
        "traceId": "trace-001",
        "spanId": "span-001",
        "commit": "abc123",
        "metadata": {}
    })
}

pub fn record(
    level: LogLevel,
    message: &str,
    resource_id: &str,
    timestamp: DateTime<Utc>,
) -> LogRecord {
    LogRecord {
        id: new_record_id(),
        level,
        message: message.to_string(),
        resource_id: resource_id.to_string(),
        timestamp,
        trace_id: "trace-001".to_string(),
        span_id: "span-001".to_string(),
        commit: "abc123".to_string(),
        metadata: Map::new(),
        ingested_at: Utc::now(),
    }
}

/// A small mixed set: two services, all four levels, one-minute spacing.
pub fn sample_records() -> Vec<LogRecord> {
    let base = base_ts();
    vec![
        record(LogLevel::Error, "Database connection failed", "db-server-01", base),
        record(
            LogLevel::Warn,
            "Slow query detected",
            "db-server-01",
            base + Duration::minutes(1),
        ),
        record(
            LogLevel::Info,
            "Request handled",
            "api-gateway",
            base + Duration::minutes(2),
        ),
        record(
            LogLevel::Error,
            "Upstream timeout",
            "api-gateway",
            base + Duration::minutes(3),
        ),
        record(
            LogLevel::Debug,
            "cache miss for key=user:42",
            "api-gateway",
            base + Duration::minutes(4),
        ),
    ]
}
