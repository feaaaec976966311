use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TELEMETRY: OnceLock<()> = OnceLock::new();

const DEFAULT_FILTER: &str = "info,returns_optimizer=info,tower_http=info";

/// Installs the global subscriber once. JSON lines by default; set
/// `LOG_FORMAT=compact` for human-readable output during local runs.
pub fn init() {
    TELEMETRY.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let registry = tracing_subscriber::registry().with(env_filter);
        let result = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("compact") => registry
                .with(tracing_subscriber::fmt::layer().compact())
                .try_init(),
            _ => registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init(),
        };
        if let Err(err) = result {
            eprintln!("tracing subscriber already installed: {err}");
        }
    });
}
