use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use hueport_host::api;
use hueport_host::bridge::{self, WsAppPort};
use hueport_host::config::{Config, StoreBackend};
use hueport_host::relay::Relay;
use hueport_protocol::Envelope;
use hueport_store::{DocumentPath, DocumentStore, FileStore, HttpStore, MemoryStore};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_banner() {
    eprintln!();
    eprintln!(
        "  \x1b[1;36m╔══════════════════════════════════════════════╗\x1b[0m"
    );
    eprintln!("  \x1b[1;36m║\x1b[0m  \x1b[1;96mh u e p o r t\x1b[0m                               \x1b[1;36m║\x1b[0m");
    eprintln!("  \x1b[1;36m║\x1b[0m  \x1b[2;37mBrowser app <-> document store relay\x1b[0m v{VERSION:<6}\x1b[1;36m║\x1b[0m");
    eprintln!(
        "  \x1b[1;36m╚══════════════════════════════════════════════╝\x1b[0m"
    );
    eprintln!();
}

fn print_connection_info(http_port: u16, ws_port: u16, bind: &str) {
    eprintln!(
        "  \x1b[1;32m[http]\x1b[0m   Serving the app at port \x1b[1;96m{http_port}\x1b[0m"
    );
    eprintln!(
        "  \x1b[1;32m[ws]\x1b[0m     Bridge listening at port \x1b[1;96m{ws_port}\x1b[0m"
    );
    eprintln!();
    eprintln!(
        "  \x1b[1;37m>\x1b[0m Open: \x1b[4;96mhttp://{bind}:{http_port}\x1b[0m"
    );
    eprintln!();
    eprintln!("  \x1b[2mPress Ctrl+C to stop\x1b[0m");
    eprintln!();
}

/// Graceful start: Check if port is available
fn check_port_available(bind: &str, port: u16) -> bool {
    TcpListener::bind(format!("{bind}:{port}")).is_ok()
}

/// Graceful start: Find available port starting from default.
/// Scans at most 10 ports and never runs past 65535.
fn find_available_port(bind: &str, start: u16) -> Option<u16> {
    (start..=u16::MAX)
        .take(10)
        .find(|&port| check_port_available(bind, port))
}

/// Startup health checks
fn startup_checks(config: &Config) -> Result<(), String> {
    // The app bundle is optional; the bridge works without static serving
    let app_dir = &config.server.app_dir;
    if app_dir.join("index.html").is_file() {
        eprintln!(
            "  \x1b[1;32m[check]\x1b[0m  Application bundle: {}",
            app_dir.display()
        );
    } else {
        eprintln!(
            "  \x1b[1;33m[warn]\x1b[0m   No index.html under {}, static serving will 404",
            app_dir.display()
        );
    }

    match config.store.backend {
        StoreBackend::Http if config.store.url.is_none() => {
            Err("store.url is required for the http backend".to_string())
        }
        _ => Ok(()),
    }
}

/// Data directory used when the file backend has no configured root
fn default_store_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hueport")
}

/// Serve /config.js with dynamic WS port
async fn serve_config_js(State(state): State<api::AppState>) -> impl IntoResponse {
    let js = format!("window.HUEPORT_CONFIG = {{ wsPort: {} }};", state.ws_port);
    ([(header::CONTENT_TYPE, "application/javascript")], js)
}

/// Build the configured store backend, if any
fn build_store(config: &Config) -> Option<Arc<dyn DocumentStore>> {
    match config.store.backend {
        StoreBackend::None => {
            eprintln!("  \x1b[1;33m[store]\x1b[0m  No backend configured, outbound messages are logged");
            None
        }
        StoreBackend::Memory => {
            eprintln!("  \x1b[1;32m[store]\x1b[0m  Backend: memory (contents vanish on exit)");
            Some(Arc::new(MemoryStore::new()))
        }
        StoreBackend::File => {
            let root = config.store.root.clone().unwrap_or_else(default_store_root);
            eprintln!(
                "  \x1b[1;32m[store]\x1b[0m  Backend: file (root: {})",
                root.display()
            );
            Some(Arc::new(FileStore::new(root)))
        }
        StoreBackend::Http => {
            let url = config.store.url.clone()?;
            eprintln!("  \x1b[1;32m[store]\x1b[0m  Backend: http ({url})");
            Some(Arc::new(HttpStore::new(
                url,
                Duration::from_millis(config.store.poll_ms),
            )))
        }
    }
}

#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging (tracing)
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    // Handle --version and --help
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-v" => {
                println!("hueport {VERSION}");
                return Ok(());
            }
            "--help" | "-h" => {
                println!("hueport - Browser app <-> document store relay");
                println!();
                println!("USAGE:");
                println!("    hueport [COMMAND]");
                println!();
                println!("COMMANDS:");
                println!("    serve            Start the relay host (default)");
                println!();
                println!("GLOBAL OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version");
                println!();
                println!("CONFIG:");
                println!("    ~/.config/hueport/config.toml");
                println!();
                println!("EXAMPLES:");
                println!("    hueport                         Start with the configured store");
                println!("    hueport serve                   Same thing, spelled out");
                return Ok(());
            }
            "serve" => {}
            _ => {}
        }
    }

    print_banner();

    // === LOAD CONFIGURATION ===
    Config::create_default_if_missing();
    let config = Config::load();
    eprintln!(
        "  \x1b[1;32m[config]\x1b[0m Loaded from {}",
        Config::default_config_path().display()
    );

    // === GRACEFUL START ===
    eprintln!("  \x1b[1;33m[init]\x1b[0m   Running startup checks...");

    if let Err(e) = startup_checks(&config) {
        eprintln!("  \x1b[1;31m[error]\x1b[0m  {e}");
        std::process::exit(1);
    }

    // Check HTTP port availability
    let http_port = if check_port_available(&config.server.bind, config.server.http_port) {
        config.server.http_port
    } else {
        eprintln!(
            "  \x1b[1;33m[warn]\x1b[0m   Port {} in use, finding alternative...",
            config.server.http_port
        );
        if let Some(p) =
            find_available_port(&config.server.bind, config.server.http_port.saturating_add(1))
        {
            eprintln!("  \x1b[1;32m[check]\x1b[0m  Using HTTP port {p}");
            p
        } else {
            eprintln!(
                "  \x1b[1;31m[error]\x1b[0m  No available HTTP ports in range {}-{}",
                config.server.http_port,
                config.server.http_port.saturating_add(10)
            );
            std::process::exit(1);
        }
    };

    // Check WS port availability
    let ws_port = if check_port_available(&config.server.bind, config.server.ws_port) {
        config.server.ws_port
    } else {
        eprintln!(
            "  \x1b[1;33m[warn]\x1b[0m   WS Port {} in use, finding alternative...",
            config.server.ws_port
        );
        if let Some(p) =
            find_available_port(&config.server.bind, config.server.ws_port.saturating_add(1))
        {
            eprintln!("  \x1b[1;32m[check]\x1b[0m  Using WS port {p}");
            p
        } else {
            eprintln!(
                "  \x1b[1;31m[error]\x1b[0m  No available WS ports in range {}-{}",
                config.server.ws_port,
                config.server.ws_port.saturating_add(10)
            );
            std::process::exit(1);
        }
    };

    // === WIRE THE RELAY ===
    let store = build_store(&config);
    let doc_path = DocumentPath::new(&config.relay.collection, &config.relay.document);
    eprintln!("  \x1b[1;32m[relay]\x1b[0m  Document: {doc_path}");

    let app_port = Arc::new(WsAppPort::new());

    let startup: Vec<Envelope> = config
        .relay
        .startup
        .iter()
        .cloned()
        .map(Envelope::from)
        .collect();

    let relay = match &store {
        Some(store) => Relay::new(app_port.clone(), store.clone(), doc_path.clone()),
        None => Relay::log_only(app_port.clone()),
    };
    let relay_handle = relay
        .with_startup(startup)
        .with_unknown_tags(config.relay.unknown_tags)
        .spawn();

    print_connection_info(http_port, ws_port, &config.server.bind);

    // === START HTTP SERVER (axum) ===
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app_state = api::AppState {
        store,
        path: doc_path,
        ws_port,
    };

    let app_dir = config.server.app_dir.clone();
    let static_service =
        ServeDir::new(&app_dir).not_found_service(ServeFile::new(app_dir.join("index.html")));

    let app = Router::new()
        .route("/config.js", get(serve_config_js)) // Serve dynamic config
        .nest("/api", api::api_router())
        .fallback_service(static_service)
        .with_state(app_state)
        .layer(cors);

    let http_addr = format!("{}:{}", config.server.bind, http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    let http_server = axum::serve(http_listener, app);

    // === GRACEFUL SHUTDOWN HANDLER ===
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        eprintln!();
        eprintln!("  \x1b[1;33m[down]\x1b[0m   Graceful shutdown initiated...");
        eprintln!("  \x1b[1;32m[done]\x1b[0m   Relay host stopped.");
        eprintln!();
    };

    // Run all servers concurrently with shutdown handler
    tokio::select! {
        result = bridge::serve(app_port, &config.server.bind, ws_port) => {
            result?;
        }
        result = http_server => {
            if let Err(e) = result {
                eprintln!("  \x1b[1;31m[error]\x1b[0m  HTTP server error: {e}");
            }
        }
        result = relay_handle.join() => {
            if let Err(e) = result {
                eprintln!("  \x1b[1;31m[error]\x1b[0m  Relay stopped: {e}");
            }
        }
        () = shutdown_signal => {
            // Shutdown was triggered
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_scan_clamps_at_the_top_of_the_range() {
        // Overflowing past 65535 would panic in debug builds; the scan
        // must instead stop at the last valid port.
        let found = find_available_port("127.0.0.1", u16::MAX - 3);
        if let Some(port) = found {
            assert!(port >= u16::MAX - 3);
        }

        let found = find_available_port("127.0.0.1", u16::MAX);
        if let Some(port) = found {
            assert_eq!(port, u16::MAX);
        }
    }
}
