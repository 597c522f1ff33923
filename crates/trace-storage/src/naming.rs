//! Session Log Naming

use chrono::{DateTime, Utc};

/// Log file name for a session started at `at`: `candump-YYYYMMDD-HHMMSS.log`
pub fn log_file_name(at: &DateTime<Utc>) -> String {
    at.format("candump-%Y%m%d-%H%M%S.log").to_string()
}
