use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hermes_client::{ReqwestTransport, build_client, build_client_with_base_url};
use hermes_core::client::ScrapeClient;
use hermes_core::config::Config;
use hermes_core::datasets::{DEFAULT_DATASET_IDS, Platform};
use hermes_core::job::ScrapeRequest;
use hermes_core::proxy::{ProxySessionParams, create_proxy_session};
use hermes_core::tools::{RedditScanParams, ScanParams, lookup_profile, scan_post, scan_reddit};

#[derive(Parser)]
#[command(name = "hermes", version, about = "Bright Data social media scraper")]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bright Data API key (overrides the config file)
    #[arg(long, global = true, env = "BRIGHTDATA_API_KEY", value_parser = non_blank)]
    api_key: Option<String>,

    /// Session timeout in milliseconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(5_000..=300_000))]
    timeout_ms: Option<u64>,

    /// Datasets API base URL (for testing against a local server)
    #[arg(long, global = true, env = "BRIGHTDATA_BASE_URL", hide = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a post, or recent posts from a profile
    Scan {
        /// Post or profile URL
        #[arg(short, long)]
        url: String,

        /// Platform (auto-detected from the URL when omitted)
        #[arg(short, long)]
        platform: Option<Platform>,

        /// Number of posts to collect when scanning a profile
        #[arg(short, long)]
        num_of_posts: Option<u32>,

        /// Only include posts on or after this date (MM-DD-YYYY)
        #[arg(long)]
        start_date: Option<String>,

        /// Only include posts on or before this date (MM-DD-YYYY)
        #[arg(long)]
        end_date: Option<String>,

        /// Post type filter, e.g. "Post" or "Reel"
        #[arg(long)]
        post_type: Option<String>,
    },

    /// Scrape a public profile
    Profile {
        /// Profile URL
        #[arg(short, long)]
        url: String,

        /// Platform (auto-detected from the URL when omitted)
        #[arg(short, long)]
        platform: Option<Platform>,
    },

    /// Scrape a Reddit post together with its top comments
    Reddit {
        /// Reddit post URL
        #[arg(short, long)]
        url: String,

        /// Skip fetching comments
        #[arg(long, default_value_t = false)]
        no_comments: bool,

        /// Maximum number of comments to keep
        #[arg(long, default_value_t = hermes_core::tools::DEFAULT_MAX_COMMENTS)]
        max_comments: usize,
    },

    /// Issue sticky proxy-session credentials for browser automation
    ProxySession {
        /// Session id to reuse (a random one is generated when omitted)
        #[arg(short, long)]
        session_id: Option<String>,

        /// Two-letter country code for geo-targeted exits
        #[arg(long)]
        country: Option<String>,

        /// Bright Data customer id (overrides the config file)
        #[arg(long, env = "BRIGHTDATA_CUSTOMER_ID")]
        customer_id: Option<String>,

        /// Scraping Browser zone name (overrides the config file)
        #[arg(long, env = "BRIGHTDATA_PROXY_ZONE")]
        proxy_zone: Option<String>,

        /// Zone password (overrides the config file)
        #[arg(long, env = "BRIGHTDATA_PROXY_PASSWORD")]
        proxy_password: Option<String>,
    },

    /// Run a raw dataset scrape with caller-provided input rows
    Scrape {
        /// Dataset key (see `hermes datasets`) or a raw gd_ dataset id
        #[arg(short, long)]
        dataset: String,

        /// Inline JSON array of input rows, or @path/to/rows.json
        #[arg(short, long)]
        input: String,
    },

    /// List the built-in dataset registry
    Datasets,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            ref url,
            platform,
            num_of_posts,
            ref start_date,
            ref end_date,
            ref post_type,
        } => {
            let client = connect_client(&cli)?;
            let params = ScanParams {
                url: url.clone(),
                platform,
                num_of_posts,
                start_date: start_date.clone(),
                end_date: end_date.clone(),
                post_type: post_type.clone(),
            };
            cmd_scan(&client, &params).await?;
        }
        Commands::Profile { ref url, platform } => {
            let client = connect_client(&cli)?;
            cmd_profile(&client, url, platform).await?;
        }
        Commands::Reddit {
            ref url,
            no_comments,
            max_comments,
        } => {
            let client = connect_client(&cli)?;
            let params = RedditScanParams {
                url: url.clone(),
                include_comments: !no_comments,
                max_comments,
            };
            cmd_reddit(&client, &params).await?;
        }
        Commands::ProxySession {
            ref session_id,
            ref country,
            ref customer_id,
            ref proxy_zone,
            ref proxy_password,
        } => {
            let mut config = load_config(&cli)?;
            if let Some(id) = customer_id {
                config = config.with_customer_id(id);
            }
            if let Some(zone) = proxy_zone {
                config = config.with_proxy_zone(zone);
            }
            if let Some(password) = proxy_password {
                config = config.with_proxy_password(password);
            }
            cmd_proxy_session(&config, session_id.as_deref(), country.as_deref())?;
        }
        Commands::Scrape {
            ref dataset,
            ref input,
        } => {
            let client = connect_client(&cli)?;
            cmd_scrape(&client, dataset, input).await?;
        }
        Commands::Datasets => cmd_datasets(),
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["hermes_core=info", "hermes_client=info", "hermes_cli=info"] {
        filter = filter.add_directive(directive.parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Rejects blank values fed through flags or env vars.
fn non_blank(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err("value must not be blank".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Builds the config from the file and flag layers: the config file (when
/// given) is the base, individual flags override it.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match (&cli.config, &cli.api_key) {
        (Some(path), _) => {
            let mut config = Config::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            if let Some(key) = &cli.api_key {
                config.api_key = key.clone();
            }
            config
        }
        (None, Some(key)) => Config::new(key),
        (None, None) => anyhow::bail!(
            "an API key is required: pass --api-key, set BRIGHTDATA_API_KEY, or use --config"
        ),
    };

    if let Some(ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }

    Ok(config)
}

fn connect_client(cli: &Cli) -> Result<ScrapeClient<ReqwestTransport>> {
    let config = load_config(cli)?;
    let client = match &cli.base_url {
        Some(base) => build_client_with_base_url(&config, base)?,
        None => build_client(&config)?,
    };
    Ok(client)
}

async fn cmd_scan(client: &ScrapeClient<ReqwestTransport>, params: &ScanParams) -> Result<()> {
    tracing::info!("Scanning {}", params.url);
    match scan_post(client, params).await? {
        Some(scrape) => print_json(&scrape),
        None => {
            println!("No data returned for {}", params.url);
            Ok(())
        }
    }
}

async fn cmd_profile(
    client: &ScrapeClient<ReqwestTransport>,
    url: &str,
    platform: Option<Platform>,
) -> Result<()> {
    tracing::info!("Looking up profile {}", url);
    match lookup_profile(client, url, platform).await? {
        Some(scrape) => print_json(&scrape),
        None => {
            println!("No data returned for {url}");
            Ok(())
        }
    }
}

async fn cmd_reddit(
    client: &ScrapeClient<ReqwestTransport>,
    params: &RedditScanParams,
) -> Result<()> {
    tracing::info!("Scanning Reddit post {}", params.url);
    match scan_reddit(client, params).await? {
        Some(scan) => print_json(&scan),
        None => {
            println!("No data returned for {}", params.url);
            Ok(())
        }
    }
}

fn cmd_proxy_session(
    config: &Config,
    session_id: Option<&str>,
    country: Option<&str>,
) -> Result<()> {
    let mut params = ProxySessionParams::default();
    if let Some(id) = session_id {
        params = params.with_session_id(id);
    }
    if let Some(country) = country {
        params = params.with_country(country);
    }

    let session = create_proxy_session(config, &params)?;
    tracing::info!(session_id = %session.session_id, "Proxy session created");
    print_json(&session)
}

async fn cmd_scrape(
    client: &ScrapeClient<ReqwestTransport>,
    dataset: &str,
    input: &str,
) -> Result<()> {
    let rows = read_rows(input)?;
    tracing::info!("Scraping {} row(s) against {}", rows.len(), dataset);

    let request = ScrapeRequest::new(dataset).with_rows(rows);
    let results = client.submit_and_await(&request).await?;

    if results.is_empty() {
        println!("No data returned for dataset {dataset}");
        return Ok(());
    }
    print_json(&results)
}

fn cmd_datasets() {
    for &(key, id) in DEFAULT_DATASET_IDS {
        println!("{key:<22} {id}");
    }
}

/// Reads input rows from an inline JSON string or an `@file` reference.
/// A single object is treated as a one-row array.
fn read_rows(input: &str) -> Result<Vec<serde_json::Value>> {
    let raw = match input.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("failed to read input file {path}"))?,
        None => input.to_string(),
    };
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("input must be valid JSON")?;
    match value {
        serde_json::Value::Array(rows) => Ok(rows),
        object @ serde_json::Value::Object(_) => Ok(vec![object]),
        _ => anyhow::bail!("input must be a JSON array of row objects"),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
