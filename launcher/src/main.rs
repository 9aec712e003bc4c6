use anyhow::{Context, Result};
use bonanza_launcher::{
    config::{
        DEFAULT_GAME_ID, DEFAULT_GAME_NAME, DEFAULT_INITIAL_BALANCE, DEFAULT_INJECT_SCRIPT,
        DEFAULT_LANG, DEFAULT_MAX_BODY_BYTES, DEFAULT_PROXY_TIMEOUT, DEFAULT_SITE_URL,
    },
    inject::search_roots,
    Api, InjectionBundle, Launcher, LauncherConfig,
};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use url::Url;

const DEFAULT_PORT: u16 = 8000;

#[derive(Parser, Debug)]
#[command(author, version, about = "Play a demo slot against a local wallet")]
struct Args {
    /// Starting wallet balance.
    #[arg(long, default_value_t = DEFAULT_INITIAL_BALANCE)]
    balance: f64,

    /// Host interface to bind (default: 127.0.0.1, or 0.0.0.0 when RENDER is set).
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to bind (default: $PORT, then 8000).
    #[arg(short, long)]
    port: Option<u16>,

    /// Script injected into every proxied HTML page. Repeat for several.
    #[arg(long = "inject", default_value = DEFAULT_INJECT_SCRIPT)]
    inject: Vec<PathBuf>,

    /// Frame the game directly instead of through the proxy (debugging).
    #[arg(long, default_value_t = false)]
    direct: bool,

    /// Accepted for compatibility; proxy mode is already the default.
    #[arg(long, default_value_t = false)]
    proxy: bool,

    #[arg(long, default_value_t = DEFAULT_GAME_ID)]
    game_id: u64,

    #[arg(long, default_value = DEFAULT_GAME_NAME)]
    game_name: String,

    /// Casino site that hands out demo links.
    #[arg(long, default_value = DEFAULT_SITE_URL)]
    site_url: String,

    #[arg(long, default_value = DEFAULT_LANG)]
    lang: String,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, default_value_t = false)]
    log_json: bool,

    /// Per-request timeout for proxied upstream fetches, in seconds.
    #[arg(long, default_value_t = DEFAULT_PROXY_TIMEOUT.as_secs())]
    proxy_timeout_secs: u64,

    /// Largest request body accepted from the browser.
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let level = Level::from_str(level).context("Invalid log level")?;
    let builder = tracing_subscriber::fmt().with_max_level(level);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<LauncherConfig> {
    if !args.balance.is_finite() {
        anyhow::bail!("balance must be a finite number");
    }
    if args.proxy_timeout_secs == 0 {
        anyhow::bail!("proxy_timeout_secs must be > 0");
    }
    if args.max_body_bytes == 0 {
        anyhow::bail!("max_body_bytes must be > 0");
    }
    let site_url = Url::parse(&args.site_url)
        .with_context(|| format!("invalid site url {}", args.site_url))?;
    if !matches!(site_url.scheme(), "http" | "https") || site_url.host_str().is_none() {
        anyhow::bail!("site url must be an http(s) url with a host: {}", args.site_url);
    }

    Ok(LauncherConfig {
        initial_balance: args.balance,
        game_id: args.game_id,
        game_name: args.game_name.clone(),
        site_url: args.site_url.clone(),
        lang: args.lang.clone(),
        use_proxy: !args.direct,
        proxy_timeout: Duration::from_secs(args.proxy_timeout_secs),
        max_body_bytes: args.max_body_bytes,
        ..LauncherConfig::default()
    })
}

/// Resolve the listen address, falling back to the hosting environment.
fn bind_addr(args: &Args, render: bool, port_env: Option<&str>) -> Result<SocketAddr> {
    let host = args.host.unwrap_or(if render {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    });
    let port = match (args.port, port_env) {
        (Some(port), _) => port,
        (None, Some(value)) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid PORT value {value:?}"))?,
        (None, None) => DEFAULT_PORT,
    };
    if port == 0 {
        anyhow::bail!("port must be > 0");
    }
    Ok(SocketAddr::new(host, port))
}

/// The address a local browser should open.
fn launcher_url(addr: SocketAddr, use_proxy: bool) -> String {
    let host = if addr.ip().is_unspecified() {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        addr.ip()
    };
    let query = if use_proxy { "?proxy=1" } else { "" };
    format!("http://{}/{query}", SocketAddr::new(host, addr.port()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Create logger
    init_tracing(&args.log_level, args.log_json)?;

    let config = build_config(&args)?;
    let port_env = std::env::var("PORT").ok();
    let addr = bind_addr(
        &args,
        std::env::var_os("RENDER").is_some(),
        port_env.as_deref(),
    )?;

    // Scripts only matter when pages go through the rewriter
    let bundle = if config.use_proxy {
        InjectionBundle::load(&args.inject, &search_roots())
            .context("failed to load inject scripts")?
    } else {
        InjectionBundle::default()
    };
    info!(
        scripts = bundle.sources().len(),
        direct = args.direct,
        site = %config.site_url,
        game_id = config.game_id,
        "starting launcher"
    );

    if args.proxy {
        info!("--proxy is the default and has no effect");
    }

    let use_proxy = config.use_proxy;
    let launcher = Launcher::new(config, bundle).context("failed to build launcher")?;
    let app = Api::new(Arc::new(launcher)).router();

    // Start server
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    info!(url = %launcher_url(addr, use_proxy), "open the launcher in a browser");

    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result.context("axum server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted; shutting down");
        }
    }

    Ok(())
}
