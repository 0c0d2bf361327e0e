use uuid::Uuid;

/// Time-ordered UUID (v7). Unique even when many records land in the same
/// millisecond, and sorts roughly by creation time.
pub fn new_record_id() -> String {
    Uuid::now_v7().to_string()
}

pub fn new_subscriber_id() -> Uuid {
    Uuid::new_v4()
}
