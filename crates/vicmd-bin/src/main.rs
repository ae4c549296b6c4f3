//! vicmd entrypoint: an item list driven by vi-style keys and ex commands.
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

mod app;
mod bindings;
mod commands;
mod host;
mod terminal;

use app::App;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "vicmd", version, about = "vi-style keys and ex commands over a list")]
struct Args {
    /// Items to show. A sample list is used when omitted.
    items: Vec<String>,
    /// Configuration file path (overrides discovery of `vicmd.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Run the lines of a script instead of the interactive loop. Lines
    /// starting with `:` are commands, others are keys in `<Key>` notation.
    #[arg(long = "script")]
    script: Option<PathBuf>,
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("vicmd.log");
    if log_path.exists() {
        let _ = fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, "vicmd.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(nb_writer)
        .try_init()
        .ok()
        .map(|()| guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn sample_items() -> Vec<String> {
    [
        "Cargo.toml",
        "README.md",
        "src",
        "target",
        "tests",
        "bin",
        "docs",
        "notes.txt",
    ]
    .map(String::from)
    .to_vec()
}

fn run_script(app: &mut App, path: &Path) -> Result<()> {
    let file =
        fs::File::open(path).with_context(|| format!("opening script {}", path.display()))?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        app.host.status.clear();
        app.run_script_line(&line);
        for out in app.host.output.drain(..) {
            println!("{out}");
        }
        if !app.host.status.is_empty() {
            println!("{}", app.host.status);
        }
        if app.host.quit {
            break;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let _log_guard = configure_logging();
    install_panic_hook();

    let args = Args::parse();
    info!(target: "runtime", "startup");

    let config = core_config::load_from(args.config.clone())?;
    let items = if args.items.is_empty() {
        sample_items()
    } else {
        args.items
    };
    let mut app = App::new(items)?;
    app.apply_config(&config);

    match args.script.as_deref() {
        Some(path) => run_script(&mut app, path)?,
        None => terminal::run(&mut app)?,
    }
    info!(target: "runtime", "exit");
    Ok(())
}
