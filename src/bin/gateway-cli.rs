use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the data gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "DATA_GATEWAY_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version and uptime
    Status,
    /// Show per-upstream queue and circuit breaker state
    Health,
    /// Flush every cached value
    Flush,
    /// Drop one key (live and stale tiers)
    Invalidate {
        /// Cache key, e.g. `defillama:tvl:{"protocol":"aave"}`
        key: String,
    },
    /// Show when the warm-up job last completed
    LastRefresh,
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

    let (method, segments) = match &cli.command {
        Commands::Status => (Method::GET, vec!["admin", "status"]),
        Commands::Health => (Method::GET, vec!["admin", "health"]),
        Commands::Flush => (Method::POST, vec!["admin", "cache", "flush"]),
        Commands::Invalidate { key } => (Method::DELETE, vec!["admin", "cache", key.as_str()]),
        Commands::LastRefresh => (Method::GET, vec!["admin", "last-refresh"]),
    };

    // Segments are percent-encoded, so keys containing `/` or `{` survive.
    let mut url = reqwest::Url::parse(&cli.url)?;
    url.path_segments_mut()
        .map_err(|_| "admin URL cannot be a base")?
        .pop_if_empty()
        .extend(segments);

    let res = client.request(method, url).headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if status == StatusCode::UNAUTHORIZED {
        eprintln!("Error: admin API rejected the key");
        return Ok(());
    }
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
