//! Process-wide default loader.
//!
//! Built on first use from the environment configuration and never torn
//! down. The driver runs on the Tokio runtime active at that first call, so
//! hosts with several runtimes should build their own loader and hand it to
//! [`install_default`] early.

use std::sync::{Arc, OnceLock};

use lazyload_config::{ConfigPatch, LoaderConfig};
use tracing::info;

use crate::error::Result;
use crate::fetch::{FileTransport, RoutingTransport, Transport};
use crate::loader::{LoadChain, Loader};
use crate::sink::TracingSink;

static DEFAULT: OnceLock<Loader> = OnceLock::new();

/// Installs `loader` as the default. Returns it back if a default already
/// exists.
pub fn install_default(loader: Loader) -> std::result::Result<(), Loader> {
    DEFAULT.set(loader)
}

/// Returns the default loader, building it on first use.
pub fn default_loader() -> Result<Loader> {
    if let Some(loader) = DEFAULT.get() {
        return Ok(loader.clone());
    }

    let (config, source) = LoaderConfig::load_from_env()?;
    info!(?source, "building default loader");
    let loader = Loader::builder(default_transport())
        .config(config)
        .sink(Arc::new(TracingSink))
        .build()?;

    // A concurrent first call may have won; its loader is the default.
    Ok(DEFAULT.get_or_init(|| loader).clone())
}

/// [`Loader::require`] on the default loader.
pub fn require(names: &str) -> Result<LoadChain> {
    Ok(default_loader()?.require(names))
}

/// [`Loader::configure`] on the default loader.
pub fn configure(patch: &ConfigPatch) -> Result<LoaderConfig> {
    Ok(default_loader()?.configure(patch))
}

fn default_transport() -> Arc<dyn Transport> {
    let local: Arc<dyn Transport> = Arc::new(FileTransport::new("."));
    #[cfg(feature = "http")]
    let remote: Arc<dyn Transport> =
        Arc::new(crate::fetch::HttpTransport::default());
    #[cfg(not(feature = "http"))]
    let remote = Arc::clone(&local);
    Arc::new(RoutingTransport::new(remote, local))
}
