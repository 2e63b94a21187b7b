//! Pulse Recovery: recovery point tracking for the monitoring dashboard
//!
//! - Stores recovery points reported by Proxmox, Docker, Kubernetes,
//!   TrueNAS and host agents
//! - Serves points, per-subject rollups, daily series and facets over HTTP
//! - Renders the Recovery view in the terminal with `--report`

use actix_web::{web, App, HttpServer};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pulse_recovery::dashboard::client::RecoveryClient;
use pulse_recovery::dashboard::filters::MemoryNavigator;
use pulse_recovery::dashboard::notify::NotificationBus;
use pulse_recovery::dashboard::report::render_report;
use pulse_recovery::dashboard::view::RecoveryView;
use pulse_recovery::store::RecoveryStore;
use pulse_recovery::{api, config, mock};

/// Pulse Recovery: backup and snapshot tracking
#[derive(Parser)]
#[command(name = "pulse-recovery", version, about = "Recovery point tracking service")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = 7655)]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Config file (TOML)
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Recovery store file, overrides the config
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// TLS certificate path (PEM)
    #[arg(long)]
    tls_cert: Option<String>,

    /// TLS private key path (PEM)
    #[arg(long)]
    tls_key: Option<String>,

    /// Serve generated demo points from memory instead of the store file
    #[arg(long)]
    demo: bool,

    /// Print the Recovery view for this query string (e.g. "view=events&provider=docker") and exit
    #[arg(long, value_name = "QUERY")]
    report: Option<String>,

    /// Server to query in report mode; defaults to `api_base` from the config
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Viewer offset in minutes east of UTC for report mode; defaults to the local zone
    #[arg(long, value_name = "MIN", allow_hyphen_values = true)]
    tz_offset: Option<i32>,
}

fn init_logging() {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["pulse_recovery=info", "actix_web=info"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config);

    if let Some(query) = &cli.report {
        return run_report(&cli, &cfg, query).await;
    }

    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let data_file = cli.data_file.clone().unwrap_or_else(|| PathBuf::from(&cfg.data_file));

    info!("");
    info!("  Pulse Recovery v{}", env!("CARGO_PKG_VERSION"));
    info!("  ──────────────────────────────────");
    info!("  Hostname:   {}", hostname);
    info!("  Listen:     {}:{}", cli.bind, cli.port);

    let store = if cli.demo {
        info!("  Mode:       demo (in-memory)");
        let store = RecoveryStore::in_memory(cfg.store_settings());
        match store.upsert_points(mock::demo_points()) {
            Ok(n) => info!("  Demo data:  {} recovery points", n),
            Err(e) => warn!("Failed to seed demo points: {}", e),
        }
        store
    } else {
        info!("  Data file:  {}", data_file.display());
        RecoveryStore::open(&data_file, cfg.store_settings()).map_err(|e| {
            error!("{}", e);
            std::io::Error::other(e)
        })?
    };
    let store = Arc::new(store);
    info!("  Points:     {}", store.len());
    info!("  Retention:  {} days", cfg.retention_days);

    // Background: retention pruning
    if cfg.retention_days > 0 {
        let prune_store = store.clone();
        let interval = Duration::from_secs(cfg.prune_interval_secs.max(60));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let removed = prune_store.prune(chrono::Utc::now());
                if removed > 0 {
                    info!("Pruned {} expired recovery points", removed);
                }
            }
        });
    }

    let app_state = web::Data::new(api::AppState { store, config: cfg });

    // OpenSSL when both paths are given; any failure falls back to HTTP
    let ssl_builder = match (&cli.tls_cert, &cli.tls_key) {
        (Some(cert_path), Some(key_path)) => {
            use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};

            match SslAcceptor::mozilla_intermediate(SslMethod::tls()) {
                Err(e) => {
                    warn!("Failed to create SSL acceptor: {}, falling back to HTTP", e);
                    None
                }
                Ok(mut builder) => {
                    if let Err(e) = builder.set_certificate_chain_file(cert_path) {
                        warn!("Cannot load TLS cert '{}': {}, falling back to HTTP", cert_path, e);
                        None
                    } else if let Err(e) = builder.set_private_key_file(key_path, SslFiletype::PEM) {
                        warn!("Cannot load TLS key '{}': {}, falling back to HTTP", key_path, e);
                        None
                    } else {
                        Some(builder)
                    }
                }
            }
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!("Both --tls-cert and --tls-key are needed for TLS, running HTTP only");
            None
        }
        (None, None) => None,
    };

    let bind = format!("{}:{}", cli.bind, cli.port);
    let server = HttpServer::new(move || App::new().app_data(app_state.clone()).configure(api::configure));

    let server = match ssl_builder {
        Some(ssl_builder) => {
            info!("  TLS enabled");
            info!("     API: https://{}/api/recovery", bind);
            info!("");
            server.bind_openssl(&bind, ssl_builder)
        }
        None => {
            info!("  HTTP mode");
            info!("     API: http://{}/api/recovery", bind);
            info!("");
            server.bind(&bind)
        }
    }
    .map_err(|e| {
        error!("Failed to bind {}: {}", bind, e);
        e
    })?;

    server.run().await
}

/// Fetch the Recovery view once and print it
async fn run_report(cli: &Cli, cfg: &config::RecoveryConfig, query: &str) -> std::io::Result<()> {
    let base = cli.server.as_deref().unwrap_or(&cfg.api_base);
    let tz_offset = cli
        .tz_offset
        .unwrap_or_else(|| chrono::Local::now().offset().local_minus_utc() / 60);

    let client = RecoveryClient::new(base).map_err(|e| {
        error!("Failed to create HTTP client: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let bus = Arc::new(NotificationBus::default());
    let mut view = RecoveryView::new(query, Box::new(MemoryNavigator::default()), bus, tz_offset);
    let now = chrono::Utc::now();
    view.refresh(&client, now).await;

    println!("{}", render_report(&view, now));
    Ok(())
}
