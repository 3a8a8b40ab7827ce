//! Command-line surface for store maintenance
//!
//! Usage:
//!   hearthbook-admin backup [--output <file>]   Export the store as a bundle
//!   hearthbook-admin restore <file> [--yes]     Restore a bundle or raw store
//!   hearthbook-admin check <file>               Compatibility-check an upload
//!   hearthbook-admin status                     Inspect the live store
//!   hearthbook-admin backups                    List dated safety backups
//!
//! Options:
//!   --env <path>    Config file to read and restore into (default: .env)
//!   --db <path>     Override the store path from configuration
//!   --json          Output in JSON format

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use hearthbook_core::{
    admin_credential_set, latest_generation, list_dated_backups, precedes_or_equals_baseline,
    read_ledger, BackupService, ConfigStore, Error, LiveStore, PreflightReport, RestoreOutcome,
    RestoreService, KEY_DATABASE_PATH,
};

/// CLI command to execute
#[derive(Debug, Clone)]
pub enum CliCommand {
    Backup { output: Option<PathBuf> },
    Restore { input: PathBuf, yes: bool },
    Check { input: PathBuf },
    Status,
    Backups,
}

/// CLI options
#[derive(Debug, Clone)]
pub struct CliOptions {
    pub json: bool,
    pub env_path: PathBuf,
    pub db_path: Option<PathBuf>,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            json: false,
            env_path: PathBuf::from(".env"),
            db_path: None,
        }
    }
}

/// Parse CLI arguments and return command + options
pub fn parse_args(args: &[String]) -> Result<(CliCommand, CliOptions), String> {
    let mut options = CliOptions::default();
    let mut command: Option<CliCommand> = None;
    let mut output: Option<PathBuf> = None;
    let mut yes = false;

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--json" => options.json = true,
            "--yes" | "-y" => yes = true,
            "--verbose" | "-v" => {}
            "--env" => {
                i += 1;
                if i >= args.len() {
                    return Err("--env requires a path".to_string());
                }
                options.env_path = PathBuf::from(&args[i]);
            }
            "--db" => {
                i += 1;
                if i >= args.len() {
                    return Err("--db requires a path".to_string());
                }
                options.db_path = Some(PathBuf::from(&args[i]));
            }
            "--output" | "-o" => {
                i += 1;
                if i >= args.len() {
                    return Err("--output requires a path".to_string());
                }
                output = Some(PathBuf::from(&args[i]));
            }
            "backup" => command = Some(CliCommand::Backup { output: None }),
            "restore" => {
                i += 1;
                if i >= args.len() {
                    return Err("restore requires a backup file".to_string());
                }
                command = Some(CliCommand::Restore {
                    input: PathBuf::from(&args[i]),
                    yes: false,
                });
            }
            "check" => {
                i += 1;
                if i >= args.len() {
                    return Err("check requires a backup file".to_string());
                }
                command = Some(CliCommand::Check {
                    input: PathBuf::from(&args[i]),
                });
            }
            "status" => command = Some(CliCommand::Status),
            "backups" => command = Some(CliCommand::Backups),
            _ => {
                if !arg.starts_with('-') && command.is_none() {
                    return Err(format!("Unknown command: {}", arg));
                }
            }
        }
        i += 1;
    }

    // Apply flag values to the parsed command
    let command = match command {
        Some(CliCommand::Backup { .. }) => CliCommand::Backup { output },
        Some(CliCommand::Restore { input, .. }) => CliCommand::Restore { input, yes },
        Some(cmd) => cmd,
        None => {
            return Err(
                "No command specified. Use: backup, restore <file>, check <file>, status, or backups"
                    .to_string(),
            )
        }
    };

    Ok((command, options))
}

/// Run CLI command
pub fn run(command: CliCommand, options: CliOptions) -> anyhow::Result<()> {
    let config = Arc::new(ConfigStore::load(&options.env_path)?);
    if let Some(ref db_path) = options.db_path {
        config.set(KEY_DATABASE_PATH, &db_path.to_string_lossy());
    }
    let store = Arc::new(LiveStore::new(config.database_path()));

    match command {
        CliCommand::Backup { output } => run_backup(config, store, output, &options),
        CliCommand::Restore { input, yes } => run_restore(config, store, &input, yes, &options),
        CliCommand::Check { input } => run_check(config, store, &input, &options),
        CliCommand::Status => run_status(config, store, &options),
        CliCommand::Backups => run_backups(store, &options),
    }
}

fn run_backup(
    config: Arc<ConfigStore>,
    store: Arc<LiveStore>,
    output: Option<PathBuf>,
    options: &CliOptions,
) -> anyhow::Result<()> {
    let service = BackupService::new(config, store);
    let export = service.export(Utc::now().date_naive())?;

    let dest = output.unwrap_or_else(|| PathBuf::from(&export.report.suggested_filename));
    std::fs::write(&dest, &export.bytes)?;

    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "written": dest.to_string_lossy(),
                "report": export.report,
            })
        );
    } else {
        println!("Backup written to {}", dest.display());
        println!("  Bundle size: {} bytes", export.report.bundle_size);
        println!("  Store size:  {} bytes", export.report.store_size);
        println!(
            "  Config:      {}",
            if export.report.config_included {
                "included"
            } else {
                "not present"
            }
        );
        println!("  SHA-256:     {}", export.report.sha256);
    }

    Ok(())
}

fn run_restore(
    config: Arc<ConfigStore>,
    store: Arc<LiveStore>,
    input: &PathBuf,
    yes: bool,
    options: &CliOptions,
) -> anyhow::Result<()> {
    let upload = std::fs::read(input)?;
    let upload_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    let service = RestoreService::new(config, store);

    if !yes {
        let report = service.preflight(&upload, &upload_name)?;
        print_preflight(&report, options);
        if !options.json {
            println!();
            println!("Dry run only. Rerun with --yes to apply this restore.");
        }
        return Ok(());
    }

    tracing::info!("Applying restore from {}", input.display());
    match service.restore(&upload, &upload_name, Utc::now().date_naive()) {
        Ok(outcome) => {
            print_outcome(&outcome, options);
            Ok(())
        }
        Err(e) => {
            if let Error::RestoreFailed {
                backup: Some(ref backup),
                ..
            } = e
            {
                eprintln!("The previous store was preserved at {}", backup.display());
            }
            Err(e.into())
        }
    }
}

fn run_check(
    config: Arc<ConfigStore>,
    store: Arc<LiveStore>,
    input: &PathBuf,
    options: &CliOptions,
) -> anyhow::Result<()> {
    let upload = std::fs::read(input)?;
    let upload_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();

    let service = RestoreService::new(config, store);
    let report = service.preflight(&upload, &upload_name)?;
    print_preflight(&report, options);

    Ok(())
}

fn run_status(
    config: Arc<ConfigStore>,
    store: Arc<LiveStore>,
    options: &CliOptions,
) -> anyhow::Result<()> {
    let store_path = store.path().to_path_buf();

    if !store_path.exists() {
        if options.json {
            println!(
                "{}",
                serde_json::json!({
                    "store": store_path.to_string_lossy(),
                    "exists": false,
                })
            );
        } else {
            println!("Store:  {} (missing)", store_path.display());
            println!("Config: {}", config.path().display());
        }
        return Ok(());
    }

    let (ledger, credential_set) = store.with_connection(|conn| {
        Ok((read_ledger(conn)?, admin_credential_set(conn)?))
    })?;
    let latest = latest_generation(&ledger);
    let older = latest
        .as_deref()
        .map(precedes_or_equals_baseline)
        .unwrap_or(false);

    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "store": store_path.to_string_lossy(),
                "exists": true,
                "config": config.path().to_string_lossy(),
                "applied_changes": ledger.len(),
                "latest_generation": latest,
                "older_than_baseline": older,
                "admin_credential_set": credential_set,
            })
        );
    } else {
        println!("Store:  {}", store_path.display());
        println!("Config: {}", config.path().display());
        println!("  Applied changes:   {}", ledger.len());
        match latest {
            Some(generation) => println!("  Latest generation: {}", generation),
            None => println!("  Latest generation: none"),
        }
        println!(
            "  Credential scheme: {}",
            if older {
                "predates baseline (a restore of this store would reset the admin password)"
            } else {
                "current"
            }
        );
        println!(
            "  Admin credential:  {}",
            if credential_set { "set" } else { "not set" }
        );
    }

    Ok(())
}

fn run_backups(store: Arc<LiveStore>, options: &CliOptions) -> anyhow::Result<()> {
    let backups = list_dated_backups(store.path())?;

    if options.json {
        println!("{}", serde_json::json!({ "backups": backups }));
    } else if backups.is_empty() {
        println!("No dated backups found next to {}", store.path().display());
    } else {
        println!("Dated backups for {}:", store.path().display());
        for backup in &backups {
            println!("  {} ({} bytes)", backup.path.display(), backup.size_bytes);
        }
    }

    Ok(())
}

fn print_preflight(report: &PreflightReport, options: &CliOptions) {
    if options.json {
        println!("{}", serde_json::json!({ "preflight": report }));
    } else {
        println!("Upload check:");
        match report.latest_generation {
            Some(ref generation) => println!("  Store generation: {}", generation),
            None => println!("  Store generation: none (fresh store)"),
        }
        println!(
            "  Config snapshot:  {}",
            if report.config_included {
                "included"
            } else {
                "none"
            }
        );
        if report.older_than_baseline {
            println!("  This store predates the current credential scheme.");
            println!("  Restoring it will clear the admin password.");
        } else {
            println!("  Compatible with the current credential scheme.");
        }
    }
}

fn print_outcome(outcome: &RestoreOutcome, options: &CliOptions) {
    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "success": true,
                "outcome": outcome,
            })
        );
    } else {
        println!("Restore complete.");
        match outcome.latest_generation {
            Some(ref generation) => println!("  Store generation: {}", generation),
            None => println!("  Store generation: none (fresh store)"),
        }
        if outcome.admin_reset_required {
            println!("  Admin credentials were reset; set a new password on next login.");
        }
        if let Some(count) = outcome.config_applied {
            println!("  Config values reloaded: {}", count);
        }
        if let Some(ref path) = outcome.store_backup {
            println!("  Previous store backed up to {}", path.display());
        }
        if let Some(ref path) = outcome.config_backup {
            println!("  Previous config backed up to {}", path.display());
        }
    }
}

/// Print CLI help
pub fn print_help() {
    println!("hearthbook-admin v{}", env!("CARGO_PKG_VERSION"));
    println!("Back up, restore, and check the Hearthbook store");
    println!();
    println!("USAGE:");
    println!("    hearthbook-admin <command> [options]");
    println!();
    println!("COMMANDS:");
    println!("    backup                      Export the store as a backup bundle");
    println!("    restore <file>              Restore a bundle or legacy raw store");
    println!("    check <file>                Compatibility-check an upload");
    println!("    status                      Inspect the live store");
    println!("    backups                     List dated safety backups");
    println!();
    println!("OPTIONS:");
    println!("    --env <path>                Config file to use (default: .env)");
    println!("    --db <path>                 Override the store path");
    println!("    --output <file>, -o         Where to write the backup bundle");
    println!("    --yes, -y                   Apply the restore (default is a dry run)");
    println!("    --json                      Output in JSON format");
    println!("    --verbose, -v               Log at info level");
    println!();
    println!("EXAMPLES:");
    println!("    hearthbook-admin backup");
    println!("    hearthbook-admin backup --output /srv/backups/family.zip");
    println!("    hearthbook-admin check hearthbook-backup-2026-03-14.zip");
    println!("    hearthbook-admin restore hearthbook-backup-2026-03-14.zip --yes");
    println!("    hearthbook-admin status --json");
}
