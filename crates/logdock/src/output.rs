use chrono::SecondsFormat;
use logdock_core::model::log::{LogLevel, LogRecord};
use logdock_core::query::{QueryResponse, StatusResponse};
use owo_colors::OwoColorize;

pub fn print_query_human(v: &QueryResponse) {
    for row in &v.records {
        println!("{}", format_record(row));
    }
    println!("-- {} matches --", v.total_matches);
}

pub fn print_status_human(v: &StatusResponse) {
    println!("data={}", v.data_path);
    println!("data_size_bytes={}", v.data_size_bytes);
    println!("logs={} cap={}", v.logs_count, v.retention_cap);
    println!("subscribers={}", v.subscribers);
    println!(
        "oldest={} newest={}",
        v.oldest_ts
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| "-".to_string()),
        v.newest_ts
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| "-".to_string())
    );
}

pub fn print_live_record(record: &LogRecord, total: usize) {
    let level = match record.level {
        LogLevel::Error => "ERROR".red().to_string(),
        LogLevel::Warn => "WARN".yellow().to_string(),
        LogLevel::Info => "INFO".green().to_string(),
        LogLevel::Debug => "DEBUG".bright_black().to_string(),
    };

    println!(
        "{} {} {} | {} (total={total})",
        record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        record.resource_id.cyan(),
        level,
        record.message
    );
}

pub fn format_record(row: &LogRecord) -> String {
    let ts = row.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
    let metadata = if row.metadata.is_empty() {
        String::new()
    } else {
        format!(" {}", serde_json::Value::Object(row.metadata.clone()))
    };
    format!(
        "{ts} {} {} trace={} span={} commit={} | {}{metadata}",
        row.resource_id,
        row.level.as_str().to_ascii_uppercase(),
        row.trace_id,
        row.span_id,
        row.commit,
        row.message,
    )
}
