use clap::{Parser, Subcommand};
use std::sync::Arc;

use ldap_import::config::AppConfig;
use ldap_import::directory::{DirectoryClient, LdapDirectory};
use ldap_import::extension::ExtensionRegistry;
use ldap_import::logging::init_logging;
use ldap_import::models::{Mode, RecordKind, TargetTable};
use ldap_import::reconcile::{
    CancellationFlag, MissingUserPolicy, Reconciler, RestorePolicy, RunReport, RunStatus,
    SyncContext,
};
use ldap_import::startup::initialize_schemas;

#[derive(Parser, Debug)]
#[command(name = "ldap-import")]
#[command(about = "Imports LDAP / Active Directory users and groups into a local store")]
struct Args {
    /// Configuration file path (default: config.yaml)
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level or filter directive (overrides config file)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the user and group tables
    InitDb,
    /// Check the directory connection and show local record counts
    Status,
    /// Import users or groups of one configuration
    Import {
        #[arg(long)]
        configuration: u32,
        /// be or fe
        #[arg(long, default_value = "be")]
        mode: Mode,
        /// users or groups
        #[arg(long, default_value = "users")]
        kind: RecordKind,
        /// Flags cleared on existing records: both, enable, undelete or nothing
        #[arg(long, default_value = "both")]
        restore: RestorePolicy,
        /// What happens to existing users first: nothing, disable or delete
        #[arg(long, default_value = "nothing")]
        missing: MissingUserPolicy,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let app_config = AppConfig::load_from_file(&args.config)
        .map_err(|e| format!("Failed to load configuration: {}", e))?;
    init_logging(&app_config.logging, args.log_level.as_deref())?;

    println!("🔧 Configuration loaded:");
    println!("   Directory: {}", app_config.directory.url);
    if let Some(db_config) = &app_config.backend.database {
        println!("   Backend: database/{} ({})", db_config.db_type, db_config.url);
    } else {
        println!("   Backend: {}", app_config.backend.backend_type);
    }
    println!("   Configurations: {} configured", app_config.configurations.len());

    match args.command {
        Command::InitDb => {
            initialize_schemas(&app_config).await?;
            for table in TargetTable::all() {
                println!("✅ Initialized table: {}", table);
            }
        }
        Command::Status => {
            if !status(&app_config).await? {
                std::process::exit(1);
            }
        }
        Command::Import {
            configuration,
            mode,
            kind,
            restore,
            missing,
        } => {
            let registry = ExtensionRegistry::with_builtins();
            let context =
                SyncContext::from_config(&app_config, configuration, mode, kind, &registry)?
                    .with_restore_policy(restore)
                    .with_missing_user_policy(missing);

            let backend = initialize_schemas(&app_config).await?;
            let directory = Arc::new(LdapDirectory::new(app_config.directory.clone()));

            let cancel = CancellationFlag::new();
            let signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    println!("⚠️  Cancelling after the current entry...");
                    signal.cancel();
                }
            });

            println!("🚀 Importing {} of configuration {}", context.table, configuration);
            let mut reconciler = Reconciler::new(directory.clone(), backend);
            let report = reconciler.run(&context, &cancel).await;
            if let Err(e) = directory.disconnect().await {
                tracing::warn!(error = %e, "Failed to disconnect from directory");
            }

            print_report(&report, kind);
            if matches!(
                report.status,
                RunStatus::Aborted { .. } | RunStatus::Failed { .. }
            ) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn status(app_config: &AppConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let directory = LdapDirectory::new(app_config.directory.clone());
    let reachable = match directory.connect().await {
        Ok(()) => {
            println!("✅ Directory reachable: {}", app_config.directory.url);
            directory.disconnect().await.is_ok()
        }
        Err(e) => {
            println!("❌ {}", e);
            false
        }
    };

    let backend = initialize_schemas(app_config).await?;
    for configuration in &app_config.configurations {
        println!("  - Configuration {} ({}):", configuration.id, configuration.name);
        for table in TargetTable::all() {
            let count = backend
                .count_for_configuration(table, configuration.id)
                .await?;
            println!("    👥 {}: {} records", table, count);
        }
    }

    Ok(reachable)
}

fn print_report(report: &RunReport, kind: RecordKind) {
    let counters = report.counters.for_kind(kind);
    match &report.status {
        RunStatus::Completed => println!("✅ Import completed"),
        RunStatus::Cancelled => println!("⚠️  Import cancelled"),
        RunStatus::Aborted { reason } => println!("❌ Import aborted: {}", reason),
        RunStatus::Failed { reason } => println!("❌ Import failed: {}", reason),
    }
    println!("   Pages: {}", report.pages_fetched);
    println!(
        "   Entries: {} ({} skipped)",
        report.entries_seen, report.entries_skipped
    );
    println!("   Added: {}  Updated: {}", counters.added, counters.updated);
    if kind == RecordKind::Users {
        println!("   Groups added: {}", report.counters.groups_added);
        println!("   Flagged before import: {}", report.users_flagged);
    }
}
