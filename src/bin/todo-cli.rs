use std::net::IpAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use todo_backend::config::load_config;

#[derive(Parser)]
#[command(name = "todo-cli")]
#[command(about = "Management CLI for the todo backend admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081", env = "TODO_ADMIN_URL")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION", env = "TODO_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Status,
    /// Query the security audit log
    Audit {
        #[arg(long)]
        event: Option<String>,
        #[arg(long)]
        ip: Option<IpAddr>,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Security summary (events, top IPs, blocks)
    Summary,
    /// Raw security state: blocks, failed attempts, recent events
    Security,
    /// Block an IP address
    Block {
        ip: IpAddr,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Unblock an IP address
    Unblock { ip: IpAddr },
    /// Run security cleanup now
    Cleanup,
    /// Performance report (timers, responses, alerts)
    Performance,
    /// Clear recorded performance metrics
    ResetPerformance,
    /// Validate a configuration file without starting the server
    CheckConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let base = cli.url.trim_end_matches('/');

    let request = match cli.command {
        Commands::CheckConfig { path } => return check_config(&path),
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Audit {
            event,
            ip,
            limit,
            offset,
        } => {
            let mut query: Vec<(&str, String)> =
                vec![("limit", limit.to_string()), ("offset", offset.to_string())];
            if let Some(event) = event {
                query.push(("event", event));
            }
            if let Some(ip) = ip {
                query.push(("ip", ip.to_string()));
            }
            client
                .get(format!("{}/admin/security/audit", base))
                .query(&query)
        }
        Commands::Summary => client.get(format!("{}/admin/security/summary", base)),
        Commands::Security => client.get(format!("{}/admin/security/metrics", base)),
        Commands::Block { ip, reason } => client
            .post(format!("{}/admin/security/block", base))
            .json(&json!({ "ip": ip, "reason": reason })),
        Commands::Unblock { ip } => client
            .post(format!("{}/admin/security/unblock", base))
            .json(&json!({ "ip": ip })),
        Commands::Cleanup => client.post(format!("{}/admin/security/cleanup", base)),
        Commands::Performance => client.get(format!("{}/admin/performance", base)),
        Commands::ResetPerformance => client.post(format!("{}/admin/performance/reset", base)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match load_config(path) {
        Ok(_) => {
            println!("{}: OK", path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
