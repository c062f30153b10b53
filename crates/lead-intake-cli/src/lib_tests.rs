//! Tests for the lead-intake-cli library module.

use super::*;
use lead_intake_core::{LeadDraft, NewLead, ParseError};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    database: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("leads.db");
        Self {
            _dir: dir,
            database,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, CliError> {
        let mut argv = vec![
            "lead-intake".to_string(),
            "--database".to_string(),
            self.database.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));

        let cli = Cli::try_parse_from(argv).unwrap();
        let mut out = Vec::new();
        execute(cli, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::open(&self.database).unwrap()
    }
}

fn token_from(output: &str) -> String {
    output
        .lines()
        .find_map(|line| line.split("?token=").nth(1))
        .unwrap()
        .trim()
        .to_string()
}

// ============================================================================
// Argument Parsing
// ============================================================================

#[test]
fn test_create_parses_platform_tag() {
    let cli = Cli::try_parse_from([
        "lead-intake",
        "integrations",
        "create",
        "--name",
        "Spring",
        "--platform",
        "google_ads",
    ])
    .unwrap();

    match cli.command {
        Commands::Integrations {
            action: IntegrationCommands::Create { name, platform },
        } => {
            assert_eq!(name, "Spring");
            assert_eq!(platform, Platform::GoogleAds);
        }
        _ => panic!("Expected integrations create"),
    }
}

#[test]
fn test_unknown_platform_is_rejected_by_parser() {
    let result = Cli::try_parse_from([
        "lead-intake",
        "integrations",
        "create",
        "--name",
        "Spring",
        "--platform",
        "linkedin",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_defaults() {
    let cli = Cli::try_parse_from(["lead-intake", "leads", "list"]).unwrap();
    assert_eq!(cli.webhook_url, "/api/webhook");
    match cli.command {
        Commands::Leads {
            action: LeadCommands::List { limit, format },
        } => {
            assert_eq!(limit, 20);
            assert_eq!(format, OutputFormat::Text);
        }
        _ => panic!("Expected leads list"),
    }
}

#[test]
fn test_exit_codes() {
    assert_eq!(
        CliError::from(LeadIntakeError::Configuration {
            message: "x".to_string()
        })
        .exit_code(),
        1
    );
    assert_eq!(
        CliError::from(StorageError::Unavailable {
            message: "x".to_string()
        })
        .exit_code(),
        2
    );
    assert_eq!(integration_not_found(IntegrationId::new(7)).exit_code(), 3);
    assert_eq!(
        CliError::from(ValidationError::Required {
            field: "name".to_string()
        })
        .exit_code(),
        4
    );
    assert_eq!(
        CliError::from(LeadIntakeError::Parse(ParseError::InvalidFormat {
            expected: "google_ads".to_string(),
            actual: "x".to_string()
        }))
        .exit_code(),
        4
    );
}

#[tokio::test]
async fn test_empty_database_path_is_configuration_error() {
    let mut cli = Cli::try_parse_from(["lead-intake", "integrations", "list"]).unwrap();
    cli.database = PathBuf::new();
    let mut out = Vec::new();

    let error = execute(cli, &mut out).await.unwrap_err();

    assert!(matches!(
        error,
        CliError::LeadIntake(LeadIntakeError::Configuration { .. })
    ));
    assert_eq!(error.exit_code(), 1);
}

#[tokio::test]
async fn test_unopenable_database_is_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let cli = Cli::try_parse_from([
        "lead-intake",
        "--database",
        dir.path().to_str().unwrap(),
        "integrations",
        "list",
    ])
    .unwrap();
    let mut out = Vec::new();

    let error = execute(cli, &mut out).await.unwrap_err();

    assert!(matches!(
        error,
        CliError::LeadIntake(LeadIntakeError::Storage(_))
    ));
    assert_eq!(error.exit_code(), 2);
}

// ============================================================================
// Integration Commands
// ============================================================================

#[tokio::test]
async fn test_create_prints_webhook_url_with_token() {
    let ws = Workspace::new();

    let output = ws
        .run(&[
            "--webhook-url",
            "https://crm.example.com/api/webhook",
            "integrations",
            "create",
            "--name",
            "Spring campaign",
            "--platform",
            "facebook",
        ])
        .await
        .unwrap();

    assert!(output.contains("Created integration 1 (Spring campaign, facebook)"));
    assert!(output.contains("Webhook URL: https://crm.example.com/api/webhook?token="));

    let token = token_from(&output);
    assert_eq!(token.len(), 64);
    let found = ws.store().find_active_by_token(&token).await.unwrap();
    assert_eq!(found.map(|i| i.name), Some("Spring campaign".to_string()));
}

#[tokio::test]
async fn test_create_rejects_blank_name() {
    let ws = Workspace::new();

    let error = ws
        .run(&["integrations", "create", "--name", "   ", "--platform", "custom"])
        .await
        .unwrap_err();

    assert!(matches!(error, CliError::InvalidArgument { ref arg, .. } if arg == "name"));
    assert_eq!(error.exit_code(), 4);
}

#[tokio::test]
async fn test_list_formats() {
    let ws = Workspace::new();
    ws.run(&["integrations", "create", "--name", "First", "--platform", "custom"])
        .await
        .unwrap();
    ws.run(&["integrations", "create", "--name", "Second", "--platform", "google_ads"])
        .await
        .unwrap();

    let text = ws.run(&["integrations", "list"]).await.unwrap();
    let first = text.find("First").unwrap();
    let second = text.find("Second").unwrap();
    assert!(second < first, "newest integration should be listed first");
    assert!(text.contains("never"));

    let json = ws
        .run(&["integrations", "list", "--format", "json"])
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let items = value.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["name"], "Second");
    assert_eq!(items[0]["platform"], "google_ads");
    assert_eq!(items[0]["status"], "active");
}

#[tokio::test]
async fn test_list_empty_directory() {
    let ws = Workspace::new();

    let output = ws.run(&["integrations", "list"]).await.unwrap();

    assert_eq!(output.trim(), "No integrations");
}

#[tokio::test]
async fn test_disable_and_enable_toggle_token_acceptance() {
    let ws = Workspace::new();
    let output = ws
        .run(&["integrations", "create", "--name", "Toggle", "--platform", "custom"])
        .await
        .unwrap();
    let token = token_from(&output);

    let disabled = ws.run(&["integrations", "disable", "1"]).await.unwrap();
    assert_eq!(disabled.trim(), "Integration 1 disabled");
    assert!(ws
        .store()
        .find_active_by_token(&token)
        .await
        .unwrap()
        .is_none());

    ws.run(&["integrations", "enable", "1"]).await.unwrap();
    assert!(ws
        .store()
        .find_active_by_token(&token)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_show_includes_url_and_counters() {
    let ws = Workspace::new();
    ws.run(&["integrations", "create", "--name", "Shown", "--platform", "custom"])
        .await
        .unwrap();

    let output = ws.run(&["integrations", "show", "1"]).await.unwrap();

    assert!(output.contains("Name:           Shown"));
    assert!(output.contains("Status:         active"));
    assert!(output.contains("Leads received: 0"));
    assert!(output.contains("Webhook URL:    /api/webhook?token="));
}

#[tokio::test]
async fn test_missing_integration_is_not_found() {
    let ws = Workspace::new();

    for args in [
        ["integrations", "show", "42"],
        ["integrations", "enable", "42"],
        ["integrations", "disable", "42"],
        ["integrations", "delete", "42"],
    ] {
        let error = ws.run(&args).await.unwrap_err();
        assert!(matches!(error, CliError::NotFound { .. }), "{args:?}");
        assert_eq!(error.to_string(), "Integration 42 not found");
    }
}

#[tokio::test]
async fn test_delete_removes_integration() {
    let ws = Workspace::new();
    ws.run(&["integrations", "create", "--name", "Gone", "--platform", "custom"])
        .await
        .unwrap();

    let output = ws.run(&["integrations", "delete", "1"]).await.unwrap();

    assert_eq!(output.trim(), "Integration 1 deleted");
    assert!(ws.store().list().await.unwrap().is_empty());
}

// ============================================================================
// Lead Commands
// ============================================================================

#[tokio::test]
async fn test_leads_list_shows_most_recent() {
    let ws = Workspace::new();
    let store = ws.store();
    for name in ["Ann", "Bob", "Cat"] {
        let draft = LeadDraft::new(name, "", "555").unwrap();
        store
            .insert(NewLead::from_webhook(draft, "custom"))
            .await
            .unwrap();
    }

    let text = ws.run(&["leads", "list", "--limit", "2"]).await.unwrap();
    assert!(text.contains("Cat"));
    assert!(text.contains("Bob"));
    assert!(!text.contains("Ann"));
    assert!(text.contains("Showing 2 of 3 leads"));

    let json = ws
        .run(&["leads", "list", "--format", "json"])
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value[0]["name"], "Cat");
    assert_eq!(value[0]["status"], "New");
    assert_eq!(value[0]["source"], "custom");
}

#[tokio::test]
async fn test_leads_list_rejects_zero_limit() {
    let ws = Workspace::new();

    let error = ws
        .run(&["leads", "list", "--limit", "0"])
        .await
        .unwrap_err();

    assert_eq!(error.exit_code(), 4);
}

#[tokio::test]
async fn test_completions_do_not_touch_database() {
    let ws = Workspace::new();

    let output = ws.run(&["completions", "bash"]).await.unwrap();

    assert!(output.contains("lead-intake"));
    assert!(!ws.database.exists());
}
