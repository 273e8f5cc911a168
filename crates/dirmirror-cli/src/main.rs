//! dirmirror - keep a destination directory identical to a source directory
//!
//! Files missing from the destination are copied, files missing from the source
//! are removed, files whose size differs are copied again, and directories left
//! without files are pruned.

mod display;
mod json_output;
mod progress;

use anyhow::{Context, Result};
use clap::Parser;
use dirmirror_config::{RunContext, Settings, SettingsLoader, TaskListLoader};
use dirmirror_sync::{ProgressReporter, RunSummary, SyncEngine};
use dirmirror_types::{Concurrency, Error, ErrorKind};
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Process exit codes, stable for scripting callers
mod exit_code {
    /// Run completed; per-item failures may have been reported
    pub const SUCCESS: i32 = 0;
    /// A task's source directory does not exist or is not a directory
    pub const SOURCE_MISSING: i32 = 1;
    /// The task list is not a JSON array of `{from, to}` objects
    pub const MALFORMED_TASK_LIST: i32 = 2;
    /// The task list contains no tasks
    pub const EMPTY_TASK_LIST: i32 = 3;
    /// Anything else that stopped the run or a task
    pub const FAILURE: i32 = 4;
}

/// dirmirror - mirror one directory tree onto another
#[derive(Parser, Debug)]
#[command(
    name = "dirmirror",
    version = env!("CARGO_PKG_VERSION"),
    about = "Mirror a source directory tree onto a destination directory tree",
    long_about = "dirmirror copies files missing from the destination, re-copies files whose\n\
                  size differs, removes files missing from the source and prunes directories\n\
                  left empty.\n\n\
                  With SOURCE and DESTINATION a single task runs. Without them the task list\n\
                  (syncConfig.json in the working directory) is used; a template is written\n\
                  when it does not exist."
)]
struct Cli {
    /// Source directory
    #[arg(requires = "destination")]
    source: Option<String>,

    /// Destination directory, created when missing
    #[arg(requires = "source")]
    destination: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Settings file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum filesystem operations in flight per phase
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Exit without waiting for enter
    #[arg(long)]
    no_wait: bool,

    /// Do not draw progress bars
    #[arg(long)]
    no_progress: bool,

    /// Print the run result as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    log_json: bool,

    /// Write the default settings to PATH and exit
    #[arg(long, value_name = "PATH")]
    init_settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        display::display_error(&format!("Failed to initialise logging: {:#}", e));
        std::process::exit(exit_code::FAILURE);
    }

    info!("dirmirror v{} starting", env!("CARGO_PKG_VERSION"));

    let mut wait_for_enter = !cli.no_wait && !cli.json;
    let code = match prepare(&cli) {
        Ok((context, settings)) => {
            wait_for_enter &= settings.ui.wait_for_enter;
            match run(&cli, &context, &settings).await {
                Ok(code) => code,
                Err(e) => report_failure(&cli, &e),
            }
        }
        Err(e) => report_failure(&cli, &e),
    };

    if wait_for_enter && cli.init_settings.is_none() {
        display::wait_for_enter();
    }

    std::process::exit(code);
}

fn init_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    if cli.log_json {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

/// Snapshot the process context and load layered settings
fn prepare(cli: &Cli) -> Result<(RunContext, Settings)> {
    let context = RunContext::from_process().context("Cannot determine the working directory")?;

    let mut settings = match &cli.config {
        Some(path) => SettingsLoader::load_from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => SettingsLoader::load_default(&context.working_dir)
            .context("Failed to load settings")?,
    };

    if let Some(jobs) = cli.jobs {
        settings.engine.max_concurrency = Concurrency::new(jobs).map_err(anyhow::Error::msg)?;
    }
    if cli.no_progress || cli.quiet || cli.json {
        settings.ui.progress = false;
    }

    Ok((context, settings))
}

async fn run(cli: &Cli, context: &RunContext, settings: &Settings) -> Result<i32> {
    if let Some(path) = &cli.init_settings {
        SettingsLoader::generate_default_settings(path)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        display::display_success(&format!("Default settings written to {}", path.display()));
        return Ok(exit_code::SUCCESS);
    }

    let engine = SyncEngine::new(context, &settings.engine);

    let tasks = match (&cli.source, &cli.destination) {
        (Some(source), Some(destination)) => vec![engine.task_from_paths(source, destination).await],
        _ => {
            let task_file = context.task_file(settings);
            let list = TaskListLoader::load_or_create(&task_file).map_err(Error::from)?;
            if list.template_created && !cli.quiet {
                display::display_info(&format!(
                    "Created {}, fill in the from/to paths and run again",
                    task_file.display()
                ));
            }
            list.validate().map_err(Error::from)?;
            engine.tasks_from_entries(&list.entries).await
        }
    };

    let (engine, renderer) = if settings.ui.progress {
        let (reporter, event_rx) = ProgressReporter::channel();
        let renderer = tokio::spawn(progress::ProgressRenderer::new().run(event_rx));
        (engine.with_progress(reporter), Some(renderer))
    } else {
        (engine, None)
    };

    let result = engine.sync_all(tasks).await;

    // Closing the last sender ends the renderer
    drop(engine);
    if let Some(renderer) = renderer {
        finish_renderer(renderer).await;
    }

    let summary = result?;
    let code = summary_exit_code(&summary);

    if cli.json {
        let output = json_output::RunResultJson::from_summary(context, &summary, code);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !cli.quiet {
        display::print_summary(&summary);
    }

    Ok(code)
}

/// Wait for the progress renderer; returns false if it panicked or was cancelled
async fn finish_renderer(renderer: JoinHandle<()>) -> bool {
    match renderer.await {
        Ok(()) => true,
        Err(e) => {
            warn!("Progress renderer stopped abnormally: {}", e);
            false
        }
    }
}

fn summary_exit_code(summary: &RunSummary) -> i32 {
    if summary.failed_tasks.is_empty() {
        exit_code::SUCCESS
    } else {
        exit_code::FAILURE
    }
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<Error>().map(Error::kind) {
        Some(ErrorKind::SourceMissing) => exit_code::SOURCE_MISSING,
        Some(ErrorKind::MalformedTaskList) => exit_code::MALFORMED_TASK_LIST,
        Some(ErrorKind::EmptyTaskList) => exit_code::EMPTY_TASK_LIST,
        _ => exit_code::FAILURE,
    }
}

fn report_failure(cli: &Cli, e: &anyhow::Error) -> i32 {
    let code = exit_code_for(e);
    error!("{:#}", e);

    if cli.json {
        let output = json_output::RunResultJson::from_error(e, code);
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(_) => display::display_error(&format!("{:#}", e)),
        }
    } else {
        display::display_error(&format!("{:#}", e));
    }

    code
}
