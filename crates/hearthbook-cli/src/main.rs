//! hearthbook-admin - Store maintenance tool for Hearthbook
//!
//! Usage:
//!   hearthbook-admin backup [--output <file>]   Export the store as a bundle
//!   hearthbook-admin restore <file> [--yes]     Restore a bundle or raw store
//!   hearthbook-admin check <file>               Compatibility-check an upload
//!   hearthbook-admin status                     Inspect the live store
//!   hearthbook-admin backups                    List dated safety backups
//!   hearthbook-admin --help                     Show help

use tracing_subscriber::EnvFilter;

mod cli;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        cli::print_help();
        return Ok(());
    }

    init_logging(args.iter().any(|a| a == "--verbose" || a == "-v"));

    match cli::parse_args(&args) {
        Ok((command, options)) => cli::run(command, options),
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            cli::print_help();
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    // Logs go to stderr so --json output on stdout stays parseable
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
