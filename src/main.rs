//! Easel CLI entry point.

use clap::Parser;
use easel::cli::commands;
use easel::cli::commands::sync::Target;
use easel::cli::{Cli, Commands};
use easel::config::{default_actor, SyncContext};
use easel::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    let hidden = matches!(cli.command, Commands::Push { hidden: true, .. });
    let actor = cli.actor.clone().unwrap_or_else(default_actor);
    let ctx = SyncContext::new(cli.dry_run, hidden, actor);

    // Run the command and handle errors
    match run(&cli, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,reqwest=info,hyper=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, ctx: &SyncContext) -> Result<(), Error> {
    let json = cli.json;
    let target = Target {
        db_path: cli.db.as_ref(),
        courses: &cli.courses,
        json,
        quiet: cli.quiet,
    };

    match &cli.command {
        Commands::Login { hostname, token, force } => {
            commands::login::execute(hostname, token, *force, ctx, json)
        }
        Commands::Init { force } => commands::init::execute(cli.db.as_ref(), *force, ctx, json),
        Commands::Course { command } => commands::course::execute(command, cli.db.as_ref(), ctx, json),

        // Sync
        Commands::Push { paths, .. } => commands::sync::execute_push(paths, &target, ctx),
        Commands::Pull { paths } => commands::sync::execute_pull(paths, &target, ctx),
        Commands::Remove { paths } => commands::sync::execute_remove(paths, &target, ctx),

        Commands::Status { forget, history } => commands::status::execute(
            cli.db.as_ref(),
            &cli.courses,
            forget.as_deref(),
            history.as_deref(),
            ctx,
            json,
        ),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
        Commands::Version => commands::version::execute(json),
    }
}
