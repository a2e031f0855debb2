// src/collector/sys.rs
//! Host identity for the reporting envelope: timestamp and hostname.

use sysinfo::System;

/// Function to generate a timestamp in epoch time.
pub fn get_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Function to extract hostname of the system.
pub fn get_hostname() -> String {
    System::host_name()
        .unwrap_or_else(|| "unknown".to_string())
        .replace('"', "\\\"")
}
