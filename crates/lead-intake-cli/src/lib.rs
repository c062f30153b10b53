//! # Lead-Intake CLI
//!
//! Operator tool for the lead-intake SQLite database.
//!
//! This module provides CLI commands for:
//! - Registering integrations and issuing their webhook URLs
//! - Enabling, disabling and deleting integrations
//! - Inspecting recently received leads

use clap::{CommandFactory, Parser, Subcommand};
use lead_intake_core::{
    Integration, IntegrationDirectory, IntegrationId, IntegrationStatus, Lead, LeadIntakeError,
    LeadIntakeResult, LeadStore, NewIntegration, Platform, SqliteStore, StorageError,
    ValidationError,
};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

// ============================================================================
// CLI Structure
// ============================================================================

/// Lead-Intake CLI - administration for ad platform lead webhooks
#[derive(Parser)]
#[command(name = "lead-intake")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage lead webhook integrations and inspect received leads")]
pub struct Cli {
    /// SQLite database file shared with the service
    #[arg(
        short,
        long,
        env = "LEAD_INTAKE_DATABASE",
        default_value = "data/lead-intake.db"
    )]
    pub database: PathBuf,

    /// Public webhook endpoint used when printing integration URLs
    #[arg(long, env = "LEAD_INTAKE_WEBHOOK_URL", default_value = "/api/webhook")]
    pub webhook_url: String,

    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Integration management commands
    Integrations {
        #[command(subcommand)]
        action: IntegrationCommands,
    },

    /// Lead inspection commands
    Leads {
        #[command(subcommand)]
        action: LeadCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

// ============================================================================
// Integration Commands
// ============================================================================

#[derive(Subcommand)]
pub enum IntegrationCommands {
    /// Register a new integration and print its webhook URL
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Source platform: google_ads, facebook or custom
        #[arg(short, long)]
        platform: Platform,
    },

    /// List integrations, newest first
    List {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one integration including its webhook URL
    Show {
        id: IntegrationId,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Accept webhooks for an integration
    Enable { id: IntegrationId },

    /// Reject webhooks for an integration without deleting it
    Disable { id: IntegrationId },

    /// Delete an integration; its token stops working immediately
    Delete { id: IntegrationId },
}

// ============================================================================
// Lead Commands
// ============================================================================

#[derive(Subcommand)]
pub enum LeadCommands {
    /// List the most recent leads
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

// ============================================================================
// CLI Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    LeadIntake(#[from] LeadIntakeError),

    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output encoding failed: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LeadIntake(LeadIntakeError::Configuration { .. }) => 1,
            Self::LeadIntake(LeadIntakeError::Storage(_)) => 2,
            Self::LeadIntake(LeadIntakeError::Validation(_) | LeadIntakeError::Parse(_)) => 4,
            Self::NotFound { .. } => 3,
            Self::InvalidArgument { .. } => 4,
            Self::Io(_) | Self::Output(_) => 5,
        }
    }
}

impl From<StorageError> for CliError {
    fn from(error: StorageError) -> Self {
        Self::LeadIntake(error.into())
    }
}

impl From<ValidationError> for CliError {
    fn from(error: ValidationError) -> Self {
        let arg = match &error {
            ValidationError::Required { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::TooLong { field, .. } => field.clone(),
        };
        Self::InvalidArgument {
            arg,
            message: error.to_string(),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Parse the process arguments and run the selected command
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    initialize_logging(&cli);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(cli, &mut out).await
}

/// Run a parsed command, writing its output to `out`
pub async fn execute(cli: Cli, out: &mut dyn Write) -> Result<(), CliError> {
    match cli.command {
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "lead-intake", out);
            Ok(())
        }
        Commands::Integrations { action } => {
            let store = open_store(&cli.database)?;
            execute_integrations_command(&store, action, &cli.webhook_url, out).await
        }
        Commands::Leads { action } => {
            let store = open_store(&cli.database)?;
            execute_leads_command(&store, action, out).await
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn initialize_logging(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.to_lowercase().into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if cli.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {e}");
    }
}

fn open_store(path: &std::path::Path) -> LeadIntakeResult<SqliteStore> {
    if path.as_os_str().is_empty() {
        return Err(LeadIntakeError::Configuration {
            message: "database path must not be empty".to_string(),
        });
    }
    debug!(path = %path.display(), "Opening database");
    Ok(SqliteStore::open(path)?)
}

async fn execute_integrations_command(
    store: &SqliteStore,
    action: IntegrationCommands,
    webhook_url: &str,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match action {
        IntegrationCommands::Create { name, platform } => {
            let request = NewIntegration::new(name, platform)?;
            let integration = IntegrationDirectory::create(store, request).await?;
            info!(integration_id = %integration.id, platform = %platform, "Created integration");

            writeln!(
                out,
                "Created integration {} ({}, {})",
                integration.id, integration.name, integration.platform
            )?;
            writeln!(out, "Webhook URL: {}", integration.webhook_url(webhook_url))?;
        }
        IntegrationCommands::List { format } => {
            let integrations = store.list().await?;
            match format {
                OutputFormat::Json => {
                    serde_json::to_writer_pretty(&mut *out, &integrations)?;
                    writeln!(out)?;
                }
                OutputFormat::Text => write_integration_table(&integrations, out)?,
            }
        }
        IntegrationCommands::Show { id, format } => {
            let integration = find_integration(store, id).await?;
            match format {
                OutputFormat::Json => {
                    serde_json::to_writer_pretty(&mut *out, &integration)?;
                    writeln!(out)?;
                }
                OutputFormat::Text => {
                    writeln!(out, "ID:             {}", integration.id)?;
                    writeln!(out, "Name:           {}", integration.name)?;
                    writeln!(out, "Platform:       {}", integration.platform)?;
                    writeln!(out, "Status:         {}", integration.status)?;
                    writeln!(out, "Leads received: {}", integration.leads_received)?;
                    writeln!(out, "Last used:      {}", last_used(&integration))?;
                    writeln!(out, "Created:        {}", integration.created_at.to_rfc3339())?;
                    writeln!(out, "Webhook URL:    {}", integration.webhook_url(webhook_url))?;
                }
            }
        }
        IntegrationCommands::Enable { id } => {
            set_status(store, id, IntegrationStatus::Active).await?;
            writeln!(out, "Integration {id} enabled")?;
        }
        IntegrationCommands::Disable { id } => {
            set_status(store, id, IntegrationStatus::Inactive).await?;
            writeln!(out, "Integration {id} disabled")?;
        }
        IntegrationCommands::Delete { id } => {
            if !store.delete(id).await? {
                return Err(integration_not_found(id));
            }
            info!(integration_id = %id, "Deleted integration");
            writeln!(out, "Integration {id} deleted")?;
        }
    }
    Ok(())
}

async fn execute_leads_command(
    store: &SqliteStore,
    action: LeadCommands,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match action {
        LeadCommands::List { limit, format } => {
            if limit == 0 {
                return Err(CliError::InvalidArgument {
                    arg: "limit".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }

            let leads = store.list_recent(limit).await?;
            match format {
                OutputFormat::Json => {
                    serde_json::to_writer_pretty(&mut *out, &leads)?;
                    writeln!(out)?;
                }
                OutputFormat::Text => {
                    let total = store.count().await?;
                    write_lead_table(&leads, out)?;
                    writeln!(out, "Showing {} of {} leads", leads.len(), total)?;
                }
            }
        }
    }
    Ok(())
}

async fn find_integration(store: &SqliteStore, id: IntegrationId) -> Result<Integration, CliError> {
    IntegrationDirectory::get(store, id)
        .await?
        .ok_or_else(|| integration_not_found(id))
}

async fn set_status(
    store: &SqliteStore,
    id: IntegrationId,
    status: IntegrationStatus,
) -> Result<(), CliError> {
    if !store.set_status(id, status).await? {
        return Err(integration_not_found(id));
    }
    info!(integration_id = %id, status = %status, "Changed integration status");
    Ok(())
}

fn integration_not_found(id: IntegrationId) -> CliError {
    CliError::NotFound {
        resource: "Integration".to_string(),
        id: id.to_string(),
    }
}

// ============================================================================
// Text Output
// ============================================================================

fn last_used(integration: &Integration) -> String {
    integration
        .last_used_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string())
}

fn write_integration_table(integrations: &[Integration], out: &mut dyn Write) -> std::io::Result<()> {
    if integrations.is_empty() {
        return writeln!(out, "No integrations");
    }

    writeln!(
        out,
        "{:<6} {:<30} {:<11} {:<9} {:>6}  LAST USED",
        "ID", "NAME", "PLATFORM", "STATUS", "LEADS"
    )?;
    for integration in integrations {
        writeln!(
            out,
            "{:<6} {:<30} {:<11} {:<9} {:>6}  {}",
            integration.id,
            integration.name,
            integration.platform,
            integration.status,
            integration.leads_received,
            last_used(integration)
        )?;
    }
    Ok(())
}

fn write_lead_table(leads: &[Lead], out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        out,
        "{:<6} {:<25} {:<18} {:<30} {:<11} STATUS",
        "ID", "NAME", "PHONE", "EMAIL", "SOURCE"
    )?;
    for lead in leads {
        writeln!(
            out,
            "{:<6} {:<25} {:<18} {:<30} {:<11} {}",
            lead.id, lead.name, lead.phone, lead.email, lead.source, lead.status
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
