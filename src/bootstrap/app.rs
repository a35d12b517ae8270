//! Process-wide setup: statics, tracing, configuration, the container.
use std::path::Path;
use std::sync::Arc;

use ghostseed_configuration::AppConfiguration;
use ghostseed_seeder_core::folders::SeedFolders;
use tracing::instrument;
use tracing_subscriber::EnvFilter;

use crate::container::AppContainer;

/// Environment variable naming the configuration root directory.
pub const CONF_ROOT_ENV_VAR: &str = "GHOSTSEED_CONF_ROOT";

/// Loads the configuration and wires the container.
///
/// # Panics
///
/// Panics when the configuration is missing or fails its integrity checks.
/// Nothing may start with a bad configuration.
#[instrument(skip())]
#[must_use]
pub fn setup() -> (Arc<AppConfiguration>, Arc<AppContainer>) {
    ghostseed_clock::initialize_static();

    init_tracing();

    let conf_root = std::env::var(CONF_ROOT_ENV_VAR).unwrap_or_else(|_| ".".to_string());
    let folders = SeedFolders::new(Path::new(&conf_root));

    let configuration = Arc::new(
        AppConfiguration::load_from_dir(folders.conf_root()).expect("the configuration failed to load"),
    );

    let app_container = Arc::new(AppContainer::initialize(&configuration, &folders));

    tracing::info!("Configuration loaded from {}", folders.conf_root().display());

    (configuration, app_container)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
