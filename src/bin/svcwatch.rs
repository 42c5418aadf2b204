//! svcwatch - Command-line client for svcwatchd.
//!
//! Connects to the agent's channel socket, issues one protocol command, and
//! prints the response.
//!
//! Usage:
//!   svcwatch ping                      # liveness check
//!   svcwatch status nginx.service      # live status of one service
//!   svcwatch all                       # latest sample for every service
//!   svcwatch history                   # full retained series per service
//!   svcwatch set-interval 2000         # change the sampling interval (ms)

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};

use svcwatch::protocol::{self, Request, Response};

/// Reply wait bound; the agent answers locally and promptly.
const READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Command-line client for the service monitoring agent.
#[derive(Parser)]
#[command(name = "svcwatch", about = "Query the service monitoring agent", version)]
struct Args {
    /// Path of the channel socket.
    #[arg(short, long, default_value = "/run/svcwatch.sock")]
    socket: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the agent is alive.
    Ping,
    /// Live status and metrics for one service.
    Status {
        /// Service name, e.g. nginx.service
        service: String,
    },
    /// Latest sample for every observed service.
    All,
    /// Full retained metric series per service.
    History,
    /// Set the monitoring interval in milliseconds (minimum 500).
    SetInterval {
        interval_ms: u64,
    },
}

fn main() {
    let args = Args::parse();

    let request = match &args.command {
        Command::Ping => Request::ping(),
        Command::Status { service } => Request::status(service),
        Command::All => Request::all_status(),
        Command::History => Request::history(),
        Command::SetInterval { interval_ms } => Request::set_interval(*interval_ms),
    };

    let response = match roundtrip(&args.socket, &request) {
        Ok(response) => response,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Is svcwatchd running and serving {}?", args.socket);
            std::process::exit(1);
        }
    };

    if let Response::Error { error } = &response {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }

    print_response(&response);
}

/// Sends one request line and reads one response line.
fn roundtrip(socket: &str, request: &Request) -> Result<Response, String> {
    let stream = UnixStream::connect(socket).map_err(|e| format!("connect failed: {}", e))?;
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(|e| format!("cannot set read timeout: {}", e))?;

    let line = protocol::encode(request).map_err(|e| format!("encode failed: {}", e))?;

    let mut writer = stream.try_clone().map_err(|e| format!("clone failed: {}", e))?;
    writer
        .write_all(line.as_bytes())
        .and_then(|_| writer.write_all(b"\n"))
        .and_then(|_| writer.flush())
        .map_err(|e| format!("write failed: {}", e))?;

    let mut reply = String::new();
    BufReader::new(stream)
        .read_line(&mut reply)
        .map_err(|e| format!("read failed: {}", e))?;
    if reply.is_empty() {
        return Err("agent closed the connection".to_string());
    }

    protocol::decode(&reply).map_err(|e| format!("invalid response: {}", e))
}

fn print_response(response: &Response) {
    match response {
        Response::Ack { status } => println!("{}", status),
        Response::Status {
            status,
            cpu,
            memory_mb,
            uptime_seconds,
            executable_path,
        } => {
            println!("status:  {}", status);
            println!("cpu:     {:.1}%", cpu);
            println!("memory:  {:.1} MB", memory_mb);
            println!("uptime:  {}", format_uptime(*uptime_seconds));
            if !executable_path.is_empty() {
                println!("exec:    {}", executable_path);
            }
        }
        Response::AllStatus { services, .. } => {
            println!(
                "{} services as of {}",
                services.len(),
                Local::now().format("%H:%M:%S")
            );
            println!("{:<40} {:>7} {:>10}", "SERVICE", "CPU%", "MEM MB");
            for svc in services {
                println!("{:<40} {:>7.1} {:>10.1}", svc.name, svc.cpu, svc.memory_mb);
            }
        }
        Response::History { services, .. } => {
            println!(
                "history for {} services as of {}",
                services.len(),
                Local::now().format("%H:%M:%S")
            );
            for svc in services {
                let avg_cpu = mean(&svc.cpu);
                let peak_cpu = svc.cpu.iter().cloned().fold(0.0, f64::max);
                let last_mem = svc.memory_mb.last().copied().unwrap_or(0.0);
                println!(
                    "{:<40} {:>5} samples  cpu avg {:>5.1}% peak {:>5.1}%  mem {:>8.1} MB",
                    svc.name,
                    svc.cpu.len(),
                    avg_cpu,
                    peak_cpu,
                    last_mem
                );
            }
        }
        // Handled before printing
        Response::Error { error } => eprintln!("Error: {}", error),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else {
        format!("{}m {}s", minutes, secs)
    }
}
