//! Lightweight CLI client for djsync-server over TCP

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "djs")]
#[command(about = "DJ Sync CLI")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Sync {
        /// Library root; uses server default if not specified
        #[arg(short, long)]
        drive: Option<String>,
    },

    Status,
    List,

    Inspect {
        /// Crate file, absolute or relative to the library root
        path: String,
    },

    Map,
}

#[derive(Serialize)]
struct Request {
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    drive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

/// One line from the server: a streamed event or the final response
#[derive(Deserialize)]
struct Line {
    event: Option<String>,
    value: Option<f64>,
    level: Option<String>,
    success: Option<bool>,
    message: Option<String>,
    data: Option<serde_json::Value>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let request = match cli.command {
        Commands::Sync { drive } => Request {
            method: "sync".into(),
            drive,
            path: None,
        },
        Commands::Status => Request {
            method: "status".into(),
            drive: None,
            path: None,
        },
        Commands::List => Request {
            method: "list_crates".into(),
            drive: None,
            path: None,
        },
        Commands::Inspect { path } => Request {
            method: "inspect".into(),
            drive: None,
            path: Some(path),
        },
        Commands::Map => Request {
            method: "map_stats".into(),
            drive: None,
            path: None,
        },
    };

    let mut stream = TcpStream::connect(&cli.server)
        .map_err(|e| format!("Cannot connect to server at {}: {}", cli.server, e))?;

    let request_json = serde_json::to_string(&request)?;
    writeln!(stream, "{}", request_json)?;
    stream.flush()?;

    let mut reader = BufReader::new(&stream);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err("Server closed the connection".into());
        }

        let parsed: Line = serde_json::from_str(&line)?;
        match parsed.event.as_deref() {
            Some("progress") => {
                println!("[{:5.1}%]", parsed.value.unwrap_or(0.0) * 100.0);
            }
            Some("log") => {
                let level = parsed.level.as_deref().unwrap_or("info");
                let message = parsed.message.as_deref().unwrap_or("");
                if level == "error" {
                    eprintln!("  {:5} {}", level, message);
                } else {
                    println!("  {:5} {}", level, message);
                }
            }
            Some(_) => {}
            None => return finish(parsed, &request.method),
        }
    }
}

fn finish(response: Line, method: &str) -> Result<(), Box<dyn std::error::Error>> {
    if response.success.unwrap_or(false) {
        if let Some(msg) = response.message {
            println!("✓ {}", msg);
        }

        if let Some(data) = response.data {
            print_data(&data, method);
        }
    } else {
        if let Some(msg) = response.message {
            eprintln!("✗ {}", msg);
        }
        if let Some(data) = response.data {
            print_data(&data, method);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn print_data(data: &serde_json::Value, method: &str) {
    match method {
        "list_crates" => {
            if let Some(crates) = data.get("crates").and_then(|c| c.as_array()) {
                println!("\nCrates:");
                for krate in crates {
                    let path = krate.get("path").and_then(|v| v.as_str()).unwrap_or("?");
                    match krate.get("name").and_then(|v| v.as_str()) {
                        Some(name) => {
                            let tracks = krate.get("track_count").and_then(|v| v.as_u64()).unwrap_or(0);
                            println!("  {} ({} tracks)", name, tracks);
                        }
                        None => {
                            let error = krate.get("error").and_then(|v| v.as_str()).unwrap_or("?");
                            println!("  {} [unreadable: {}]", path, error);
                        }
                    }
                }
            }
        }
        "inspect" => {
            if let Some(stats) = data.get("stats") {
                let version = stats.get("version").and_then(|v| v.as_str()).unwrap_or("-");
                let records = stats.get("record_count").and_then(|v| v.as_u64()).unwrap_or(0);
                let tracks = stats.get("track_count").and_then(|v| v.as_u64()).unwrap_or(0);
                println!("  Version: {}", version);
                println!("  Records: {}", records);
                println!("  Tracks: {}", tracks);
            }
            for (key, label) in [("errors", "error"), ("warnings", "warning")] {
                if let Some(items) = data.get(key).and_then(|v| v.as_array()) {
                    for item in items {
                        println!("  {}: {}", label, item.as_str().unwrap_or("?"));
                    }
                }
            }
        }
        "map_stats" => {
            let stats = data.get("stats").unwrap_or(data);
            let entries = stats.get("entry_count").and_then(|v| v.as_u64()).unwrap_or(0);
            let downloaded = stats.get("downloaded").and_then(|v| v.as_u64()).unwrap_or(0);
            let custom = stats.get("custom_urls").and_then(|v| v.as_u64()).unwrap_or(0);
            println!("  Entries: {}", entries);
            println!("  Downloaded: {}", downloaded);
            println!("  Custom URLs: {}", custom);
        }
        _ => {
            // Pretty print JSON for other methods
            println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
        }
    }
}
