// src/collector/mod.rs

pub mod passenger;
pub mod sys;

pub use sys::{get_hostname, get_timestamp};

pub use passenger::{
    PassengerCollector, PassengerSnapshot, parse_memory_stats, parse_status,
};
