// src/main.rs
use clap::Parser;
use passmon::collector::passenger::{PASSENGER_MEMORY_STATS_CMD, PASSENGER_STATUS_CMD};
use passmon::collector::{PassengerCollector, get_hostname, get_timestamp};
use serde_json::json;
use std::time::Duration;
use tokio::net::UdpSocket;

/// Scrape Passenger pool and memory metrics, push them as JSON over UDP.
#[derive(Parser, Debug)]
#[command(name = "passmon", version, about)]
struct Args {
    /// host:port the JSON datagrams are sent to
    #[arg(long, default_value = "127.0.0.1:1555")]
    target: String,

    /// Seconds between scrapes
    #[arg(long, default_value_t = 10)]
    interval: u64,

    /// Status command, e.g. "rvmsudo passenger-status"
    #[arg(long, default_value = PASSENGER_STATUS_CMD)]
    status_cmd: String,

    /// Memory stats command, e.g. "rvmsudo passenger-memory-stats"
    #[arg(long, default_value = PASSENGER_MEMORY_STATS_CMD)]
    memory_stats_cmd: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let collector =
        PassengerCollector::with_commands(args.status_cmd.clone(), args.memory_stats_cmd.clone());

    println!("Sending metrics to UDP {}", args.target);

    // Create UDP socket
    let socket = UdpSocket::bind("0.0.0.0:0").await?;

    loop {
        let report = json!({
            "timestamp": get_timestamp(),
            "hostname": get_hostname(),
            "passenger": collector.collect(),
        });
        let bytes = serde_json::to_vec(&report).unwrap();

        // Send UDP packet
        if let Err(e) = socket.send_to(&bytes, &args.target).await {
            eprintln!("Failed to send UDP packet: {}", e);
        } else {
            println!("Sent metrics to {} ({} bytes)", args.target, &bytes.len());
        }

        tokio::time::sleep(Duration::from_secs(args.interval)).await;
    }
}
