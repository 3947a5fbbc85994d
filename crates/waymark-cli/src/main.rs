//! `waymark` – map viewing and robot navigation from the terminal.
//!
//! Two subcommands:
//!
//! - `waymark view <MAP_DIR>` loads a recorded map bundle, reconstructs
//!   waypoint positions, and exports an interactive 3D HTML view.
//! - `waymark chat <MAP_DIR>` drops into the chat REPL over a simulated
//!   robot: `/connect`, `/goto <place>`, `/status`, `/disconnect`.
//!
//! Both read `~/.waymark/config.toml` (hostname, velocity limit, named
//! locations) with `WAYMARK_*` environment overrides.

mod config;
mod repl;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};
use waymark_session::{SessionConfig, SessionRegistry, SimRobot};
use waymark_viewer::{SceneOptions, build_figure, export_html};

#[derive(Parser)]
#[command(name = "waymark", version, about = "Topological map viewer and robot navigator")]
struct Cli {
    /// Raise the log filter to debug.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a recorded map to an interactive HTML view.
    View {
        /// Map bundle directory (contains graph.json); falls back to
        /// `map_path` from the config file.
        map_dir: Option<PathBuf>,

        /// Position waypoints from anchoring instead of edge traversal.
        #[arg(short = 'a', long)]
        anchoring: bool,

        /// Output HTML file (defaults to <MAP_DIR>.html).
        #[arg(long)]
        export: Option<PathBuf>,

        /// Short codes or names to highlight (repeatable).
        #[arg(long = "highlight")]
        highlight: Vec<String>,

        /// Hide edge lines.
        #[arg(long)]
        no_edges: bool,

        /// Hide fiducial markers.
        #[arg(long)]
        no_fiducials: bool,

        /// Label every waypoint with its short code.
        #[arg(long)]
        show_labels: bool,

        /// Render recorded point clouds (slower, larger output).
        #[arg(long)]
        show_point_clouds: bool,

        /// Figure title.
        #[arg(long)]
        title: Option<String>,
    },

    /// Interactive chat REPL over a simulated robot.
    Chat {
        /// Map bundle directory (contains graph.json); falls back to
        /// `map_path` from the config file.
        map_dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = match config::load() {
        Ok(Some(c)) => {
            info!(path = %config::config_path().display(), "config loaded");
            c
        }
        Ok(None) => {
            // First run: persist the defaults so there is a file to edit.
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  Default config written to {}",
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            config::Config::default()
        }
    };

    let result = match cli.command {
        Commands::View {
            map_dir,
            anchoring,
            export,
            highlight,
            no_edges,
            no_fiducials,
            show_labels,
            show_point_clouds,
            title,
        } => run_view(
            &cfg,
            map_dir,
            ViewArgs {
                anchoring,
                export,
                highlight,
                no_edges,
                no_fiducials,
                show_labels,
                show_point_clouds,
                title,
            },
        ),
        Commands::Chat { map_dir } => run_chat(&cfg, map_dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise tracing-subscriber using RUST_LOG (defaults to "info"; -v
/// raises it to "debug").  Set WAYMARK_LOG_FORMAT=json to emit
/// newline-delimited JSON logs suitable for log aggregators.  User-facing
/// output still uses println! for UX consistency.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if std::env::var("WAYMARK_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// view
// ─────────────────────────────────────────────────────────────────────────────

struct ViewArgs {
    anchoring: bool,
    export: Option<PathBuf>,
    highlight: Vec<String>,
    no_edges: bool,
    no_fiducials: bool,
    show_labels: bool,
    show_point_clouds: bool,
    title: Option<String>,
}

fn run_view(cfg: &config::Config, map_dir: Option<PathBuf>, args: ViewArgs) -> Result<(), String> {
    let map_dir = resolve_map_dir(map_dir, cfg)?;
    let map_dir = map_dir.as_path();
    let map = waymark_map::load_map(map_dir).map_err(|e| e.to_string())?;

    let title = args.title.unwrap_or_else(|| {
        map_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Recorded map".to_string())
    });
    let options = SceneOptions {
        title: title.clone(),
        highlights: args.highlight,
        show_edges: !args.no_edges,
        show_fiducials: !args.no_fiducials,
        show_labels: args.show_labels,
        show_point_clouds: args.show_point_clouds,
        use_anchoring: args.anchoring,
        locations: cfg.locations.clone(),
        ..Default::default()
    };

    let figure = build_figure(&map, &options);
    let output = args.export.unwrap_or_else(|| default_export_path(map_dir));
    export_html(&figure, &title, &output).map_err(|e| e.to_string())?;

    println!(
        "  {} Map view written to {}",
        "✓".green().bold(),
        output.display().to_string().bold()
    );
    Ok(())
}

/// The explicit argument wins; otherwise fall back to `map_path` from the
/// config file.
fn resolve_map_dir(arg: Option<PathBuf>, cfg: &config::Config) -> Result<PathBuf, String> {
    if let Some(dir) = arg {
        return Ok(dir);
    }
    if !cfg.map_path.is_empty() {
        return Ok(PathBuf::from(&cfg.map_path));
    }
    Err(format!(
        "no map directory given and map_path is not set in {}",
        config::config_path().display()
    ))
}

/// `<MAP_DIR>.html` next to the map bundle.
fn default_export_path(map_dir: &Path) -> PathBuf {
    let stem = map_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "map".to_string());
    map_dir.with_file_name(format!("{stem}.html"))
}

// ─────────────────────────────────────────────────────────────────────────────
// chat
// ─────────────────────────────────────────────────────────────────────────────

fn run_chat(cfg: &config::Config, map_dir: Option<PathBuf>) -> Result<(), String> {
    let map_dir = resolve_map_dir(map_dir, cfg)?;
    let map = waymark_map::load_map(&map_dir).map_err(|e| e.to_string())?;

    if !cfg.username.is_empty() && !cfg.password.is_empty() {
        info!(username = %cfg.username, "robot credentials loaded from config");
    }

    let session_config = SessionConfig {
        hostname: cfg.hostname.clone(),
        velocity_limit: cfg.velocity_limit,
        locations: cfg.locations.clone(),
        ..Default::default()
    };
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(SimRobot::new()),
        map,
        session_config,
    ));

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;

    // Ctrl-C sets the shutdown flag; the REPL notices it and disconnects
    // every session before exiting.
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – disconnecting and releasing the lease …"
                .yellow()
                .bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    println!();
    println!(
        "  Chatting with a simulated robot at {}.  Type {} for commands.",
        cfg.hostname.bold(),
        "/help".bold().cyan()
    );
    println!();

    repl::run(&runtime, registry, shutdown);
    Ok(())
}
