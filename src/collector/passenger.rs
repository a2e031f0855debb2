// src/collector/passenger.rs
//! Phusion Passenger pool and memory metrics, scraped from the
//! passenger-status and passenger-memory-stats command line tools.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::process::Command;

/// Default status command. Swap in something like
/// `"rvmsudo passenger-status"` via [`PassengerCollector::with_commands`]
/// when the tool needs elevation.
pub const PASSENGER_STATUS_CMD: &str = "passenger-status";

/// Default memory stats command, same elevation caveat as
/// [`PASSENGER_STATUS_CMD`].
pub const PASSENGER_MEMORY_STATS_CMD: &str = "passenger-memory-stats";

// Both tools colourize their output when stdout looks like a terminal.
static ANSI_COLOURS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B\[[0-9;]*[mK]").unwrap());

static STATUS_MAX: Lazy<Regex> = Lazy::new(|| Regex::new(r"max += (\d+)").unwrap());
static STATUS_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"count += (\d+)").unwrap());
static STATUS_ACTIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"active += (\d+)").unwrap());
static STATUS_INACTIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"inactive += (\d+)").unwrap());
static STATUS_WAITING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Waiting on global queue: (\d+)").unwrap());

static PASSENGER_SECTION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-+ Passenger processes -+").unwrap());
static SECTION_PROCESSES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^### Processes: (\d+)").unwrap());
static SECTION_TOTAL_RSS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^### Total private dirty RSS: (\d+(?:\.\d+)?) MB").unwrap());

/// One scrape's worth of metrics, every field independently optional.
/// A `None` means the source line was missing or unparseable; it
/// serializes as an explicit `null` so the receiving agent sees the
/// field name either way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassengerSnapshot {
    pub max_application_instances: Option<u64>,
    pub count_application_instances: Option<u64>,
    pub active_application_instances: Option<u64>,
    pub inactive_application_instances: Option<u64>,
    pub waiting_on_global_queue: Option<u64>,
    pub passenger_watchdog_rss_mb: Option<f64>,
    pub passenger_helper_agent_rss_mb: Option<f64>,
    pub passenger_spawn_server_rss_mb: Option<f64>,
    pub passenger_logging_agent_rss_mb: Option<f64>,
    pub processes: Option<u64>,
    pub total_private_dirty_rss_mb: Option<f64>,
}

/// Runs the two Passenger reporting tools and turns their text output
/// into a [`PassengerSnapshot`]. The command strings are fixed at
/// construction and never change afterwards.
#[derive(Debug, Clone)]
pub struct PassengerCollector {
    status_cmd: String,
    memory_stats_cmd: String,
}

impl Default for PassengerCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl PassengerCollector {
    /// Collector using the default command names from `$PATH`.
    pub fn new() -> Self {
        Self::with_commands(PASSENGER_STATUS_CMD, PASSENGER_MEMORY_STATS_CMD)
    }

    /// Collector with explicit command lines, e.g. carrying an
    /// `rvmsudo` prefix. The strings run through the shell.
    pub fn with_commands(
        status_cmd: impl Into<String>,
        memory_stats_cmd: impl Into<String>,
    ) -> Self {
        Self {
            status_cmd: status_cmd.into(),
            memory_stats_cmd: memory_stats_cmd.into(),
        }
    }

    /// Function to scrape both tools and merge the results. Never
    /// fails: a command that cannot be spawned or exits non-zero, or a
    /// line that does not match, just leaves its fields `None`.
    pub fn collect(&self) -> PassengerSnapshot {
        let mut snapshot = PassengerSnapshot::default();

        if let Some(out) = run_command(&self.status_cmd) {
            parse_status(&out, &mut snapshot);
        }
        if let Some(out) = run_command(&self.memory_stats_cmd) {
            parse_memory_stats(&out, &mut snapshot);
        }

        snapshot
    }
}

/// Run a command line through the shell with stderr folded into stdout,
/// colour codes stripped. `None` on spawn failure or non-zero exit.
fn run_command(command_line: &str) -> Option<String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(format!("{command_line} 2>&1"))
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout);
    Some(ANSI_COLOURS.replace_all(&text, "").into_owned())
}

/// Function to extract the pool counters from passenger-status output.
/// Eg,
///
/// ```text
/// max      = 40
/// count    = 40
/// active   = 0
/// inactive = 40
/// Waiting on global queue: 0
/// ```
pub fn parse_status(output: &str, snapshot: &mut PassengerSnapshot) {
    snapshot.max_application_instances = capture_u64(&STATUS_MAX, output);
    snapshot.count_application_instances = capture_u64(&STATUS_COUNT, output);
    snapshot.active_application_instances = capture_u64(&STATUS_ACTIVE, output);
    snapshot.inactive_application_instances = capture_u64(&STATUS_INACTIVE, output);
    snapshot.waiting_on_global_queue = capture_u64(&STATUS_WAITING, output);
}

/// Function to extract per-agent RSS and the pool totals from
/// passenger-memory-stats output. The agent lines look like
///
/// ```text
/// 20998  22.9 MB   0.3 MB   PassengerWatchdog
/// 21001  126.4 MB  6.8 MB   PassengerHelperAgent
/// ```
///
/// and only the second (private) MB figure is kept.
pub fn parse_memory_stats(output: &str, snapshot: &mut PassengerSnapshot) {
    snapshot.passenger_watchdog_rss_mb = agent_private_rss(output, "PassengerWatchdog");
    snapshot.passenger_helper_agent_rss_mb = agent_private_rss(output, "PassengerHelperAgent");
    snapshot.passenger_spawn_server_rss_mb = agent_private_rss(output, "Passenger spawn server");
    snapshot.passenger_logging_agent_rss_mb = agent_private_rss(output, "PassengerLoggingAgent");

    // The output has one section per supervised web server (Apache,
    // Nginx) ahead of the Passenger one, each with its own "###
    // Processes" and RSS total lines. Skip ahead to the Passenger
    // header before trusting either.
    let mut in_passenger_section = false;
    for line in output.lines() {
        if !in_passenger_section {
            in_passenger_section = PASSENGER_SECTION_HEADER.is_match(line);
            continue;
        }
        if let Some(count) = capture_u64(&SECTION_PROCESSES, line) {
            snapshot.processes = Some(count);
        }
        if let Some(mb) = capture_f64(&SECTION_TOTAL_RSS, line) {
            snapshot.total_private_dirty_rss_mb = Some(mb);
        }
    }
}

/// Private RSS in MB for one named Passenger agent process.
fn agent_private_rss(output: &str, agent: &str) -> Option<f64> {
    let pattern = format!(r"\d+ +\d+(?:\.\d+)? MB +(\d+(?:\.\d+)?) MB +{agent}");
    let re = Regex::new(&pattern).ok()?;
    re.captures(output)?.get(1)?.as_str().parse().ok()
}

fn capture_u64(re: &Regex, text: &str) -> Option<u64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn capture_f64(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}
