use std::sync::OnceLock;

use supports_color::Stream;
use tracing_subscriber::EnvFilter;

static ANSI_ENABLED: OnceLock<bool> = OnceLock::new();

/// Installs the global fmt subscriber. The filter comes from `RUST_LOG`
/// and defaults to `warn`.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let ansi = colors_enabled();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}

/// Whether stdout should receive ANSI colors, honoring `NO_COLOR` and
/// `FORCE_COLOR`.
pub fn colors_enabled() -> bool {
    *ANSI_ENABLED.get_or_init(detect_ansi)
}

fn detect_ansi() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    supports_color::on_cached(Stream::Stdout).is_some()
}
