//! # Lead-Intake Service
//!
//! Binary entry point for the lead-intake HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Opens the configured storage backend
//! - Starts the HTTP server from lead-intake-api

use anyhow::Context;
use config::{builder::DefaultState, ConfigBuilder};
use lead_intake_api::{
    start_server, LoggingConfig, ServiceConfig, ServiceError, StorageBackend, StorageConfig,
};
use lead_intake_core::{
    InMemoryIntegrationDirectory, InMemoryLeadStore, IntegrationDirectory, LeadStore,
    SqliteStore, StorageError,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable naming an explicit configuration file
const CONFIG_FILE_ENV: &str = "LEAD_INTAKE_CONFIG_FILE";

/// Prefix of configuration environment variables
const ENV_PREFIX: &str = "LEAD_INTAKE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (later sources override earlier ones):
    //  1. /etc/lead-intake/service.yaml   system-wide defaults
    //  2. ./config/service.yaml           deployment-local override
    //  3. Path given by LEAD_INTAKE_CONFIG_FILE
    //  4. Environment variables prefixed LEAD_INTAKE__ with `__` as separator,
    //     e.g. LEAD_INTAKE__SERVER__PORT=9090 sets server.port = 9090
    //
    // Every field has a default, so no configuration at all is valid. A
    // malformed file or an uncoercible variable is a hard error.
    // -------------------------------------------------------------------------
    let explicit_path = std::env::var(CONFIG_FILE_ENV)
        .ok()
        .filter(|p| !p.is_empty());

    let builder = config_sources(explicit_path.as_deref())
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

    let service_config = match load_service_config(builder) {
        Ok(cfg) => cfg,
        Err(message) => {
            init_logging(&LoggingConfig::default());
            error!(error = %message, "Service configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    init_logging(&service_config.logging);
    info!("Starting Lead-Intake Service");
    if let Some(path) = &explicit_path {
        info!(path = %path, "Loaded configuration from explicit path");
    }

    let (directory, leads) = open_storage(&service_config.storage).with_context(|| {
        format!(
            "failed to open storage at {}",
            service_config.storage.database_path.display()
        )
    })?;

    if let Err(e) = start_server(service_config, directory, leads).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
            ServiceError::Metrics(_) => 4,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}

// ============================================================================
// Private helpers
// ============================================================================

/// File sources in precedence order, lowest first
fn config_sources(explicit_path: Option<&str>) -> ConfigBuilder<DefaultState> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/lead-intake/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(path) = explicit_path {
        builder = builder.add_source(
            config::File::with_name(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    builder
}

/// Build, deserialize and validate the service configuration
fn load_service_config(builder: ConfigBuilder<DefaultState>) -> Result<ServiceConfig, String> {
    let config = builder.build().map_err(|e| e.to_string())?;
    let service_config: ServiceConfig = config.try_deserialize().map_err(|e| e.to_string())?;
    service_config.validate().map_err(|e| e.to_string())?;
    Ok(service_config)
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level when set.
fn init_logging(logging: &LoggingConfig) {
    let default_filter = format!(
        "lead_intake_service={level},lead_intake_api={level},lead_intake_core={level},tower_http=info",
        level = logging.level.to_lowercase()
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {e}");
    }
}

type Stores = (Arc<dyn IntegrationDirectory>, Arc<dyn LeadStore>);

/// Open the configured storage backend
fn open_storage(storage: &StorageConfig) -> Result<Stores, StorageError> {
    match storage.backend {
        StorageBackend::Sqlite => {
            let store = SqliteStore::open(&storage.database_path)?;
            info!(path = %storage.database_path.display(), "Opened SQLite storage");
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; leads will be lost on restart");
            Ok((
                Arc::new(InMemoryIntegrationDirectory::new()),
                Arc::new(InMemoryLeadStore::new()),
            ))
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
