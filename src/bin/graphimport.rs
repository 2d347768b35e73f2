use std::{error::Error, path::PathBuf, process, time::Instant};

use clap::{Args, Parser, Subcommand};
use graphimport::{
    ConfigOverrides, GraphImportError, ImportConfig, ImportEngine, NodePolicy, SqliteStore,
    safety::run_safety_checks,
    source::{list_fragments, prefetch},
    write_unresolved_keys,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "graphimport",
    version,
    about = "Import graph fragments into an embedded SQLite graph",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(long, global = true, help = "Config file (defaults to ./import.toml when present)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, env = "GRAPHIMPORT_DATABASE", help = "Graph database file")]
    database: Option<PathBuf>,

    #[arg(long, short, global = true, help = "Log every imported item")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Import every *.json fragment of a directory")]
    Import(ImportCmd),
    #[command(about = "Print node and relationship counts")]
    Stats,
    #[command(about = "Run integrity checks; exits with 2 when issues are found")]
    Check,
}

#[derive(Args, Debug)]
struct ImportCmd {
    #[arg(long, value_name = "DIR", help = "Directory holding fragment documents")]
    fragments: Option<PathBuf>,

    #[arg(long, value_enum, help = "Policy for nodes whose key already exists")]
    policy: Option<NodePolicy>,

    #[arg(long, value_name = "FILE", help = "Where to write unresolved relationship keys")]
    report: Option<PathBuf>,

    #[arg(long, help = "Stop at the first fragment that fails")]
    fail_fast: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = ImportConfig::load(cli.config.as_deref())?;
    let mut overrides = ConfigOverrides {
        database: cli.database,
        verbose: cli.verbose,
        ..ConfigOverrides::default()
    };
    if let Command::Import(cmd) = &cli.command {
        overrides.fragments = cmd.fragments.clone();
        overrides.node_policy = cmd.policy;
        overrides.report = cmd.report.clone();
        overrides.fail_fast = cmd.fail_fast;
    }
    config.apply(overrides);
    config.validate()?;
    init_tracing(config.verbose)?;

    match cli.command {
        Command::Import(_) => import(&config),
        Command::Stats => {
            let store = SqliteStore::open_read_only(&config.database)?;
            println!(
                "nodes={} relationships={}",
                store.node_count()?,
                store.relationship_count()?
            );
            Ok(())
        }
        Command::Check => {
            let store = SqliteStore::open_read_only(&config.database)?;
            let report = run_safety_checks(&store)?;
            println!("{report}");
            if report.has_issues() {
                process::exit(2);
            }
            Ok(())
        }
    }
}

fn import(config: &ImportConfig) -> Result<(), Box<dyn Error>> {
    let dir = config
        .fragments
        .as_ref()
        .ok_or_else(|| GraphImportError::config("no fragment directory given"))?;
    let paths = list_fragments(dir)?;
    info!(
        fragments = paths.len(),
        database = %config.database.display(),
        policy = %config.node_policy,
        "starting import"
    );

    let store = SqliteStore::open_with_config(&config.database, &config.sqlite)?;
    let mut engine = ImportEngine::with_policy(store, config.node_policy);
    let started = Instant::now();
    let mut failed = 0usize;
    for (path, fragment) in prefetch(paths, config.prefetch) {
        let outcome = fragment.and_then(|graph| engine.import_graph(&graph));
        match outcome {
            Ok(report) => {
                if report.has_failures() {
                    warn!(
                        path = %path.display(),
                        node_failures = report.node_failures.len(),
                        schema_failures = report.schema_failures.len(),
                        "fragment imported with failures"
                    );
                }
                info!(path = %path.display(), "done");
            }
            Err(err) if config.fail_fast => {
                return Err(format!("{}: {err}", path.display()).into());
            }
            Err(err) => {
                failed += 1;
                error!(path = %path.display(), error = %err, "fragment skipped");
            }
        }
    }

    let statistics = engine.statistics();
    println!("{statistics}");
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        failed_fragments = failed,
        "import finished"
    );
    if statistics.pending_relationship_keys > 0 {
        write_unresolved_keys(&config.report, &engine.unresolved_keys())?;
        println!(
            "Please find the list of the unknown relationship keys at: {}",
            config.report.display()
        );
    }
    Ok(())
}

fn init_tracing(verbose: bool) -> Result<(), Box<dyn Error>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| err as Box<dyn Error>)
}
