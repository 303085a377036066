//! Command dispatch for the `reqdeck` binary

use clap::Parser;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command, LogFormat, RunArgs, SendArgs};
use crate::config::Config;
use crate::errors::{ReqdeckError, Result};
use crate::http::RequestExecutor;
use crate::models::{load_collection_file, load_variables_file, Request};
use crate::output;
use crate::runner::CollectionRunner;
use crate::signals;
use crate::status::ExitStatus;
use crate::variables::VariableStore;

/// Environment variable holding the log filter directives
pub const LOG_ENV: &str = "REQDECK_LOG";

/// Main entry point for the CLI.
///
/// Parses arguments, installs logging, loads configuration, and dispatches
/// to the subcommand on a multi-threaded tokio runtime.
pub fn run(args: Vec<String>) -> ExitStatus {
    let parsed = match Args::try_parse_from(&args) {
        Ok(args) => args,
        Err(e) => {
            e.print().ok();
            return if e.kind() == clap::error::ErrorKind::DisplayHelp
                || e.kind() == clap::error::ErrorKind::DisplayVersion
            {
                ExitStatus::Success
            } else {
                ExitStatus::Error
            };
        }
    };

    init_logging(parsed.log_format);

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Falling back to default configuration");
            eprintln!("Warning: Failed to load config: {}", e);
            Config::default()
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("reqdeck: error: Failed to start async runtime: {}", e);
            return ExitStatus::Error;
        }
    };

    let result = runtime.block_on(async {
        match parsed.command {
            Command::Run(args) => run_collection(args, &config).await,
            Command::Send(args) => send_request(args, &config).await,
        }
    });

    match result {
        Ok(status) => status,
        Err(e) => {
            eprintln!("reqdeck: error: {}", e);
            ExitStatus::Error
        }
    }
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = installed {
        eprintln!("Warning: Failed to install logger: {}", e);
    }
}

async fn run_collection(args: RunArgs, config: &Config) -> Result<ExitStatus> {
    let file = load_collection_file(&args.file)?;

    let mut variables = VariableStore::new();
    variables.import(file.variables);
    if let Some(path) = &args.vars {
        variables.import(load_variables_file(path)?);
    }

    let mut options = config.runner;
    if let Some(mode) = args.mode {
        options.mode = mode;
    }
    if let Some(delay) = args.delay {
        options.delay = delay.into();
    }

    let mut executor_options = config.executor_options();
    if let Some(timeout) = args.timeout {
        executor_options.timeout = timeout.into();
    }
    let executor = RequestExecutor::with_options(executor_options)?;

    let name = file.collection.name.clone();
    let runner = CollectionRunner::new(
        file.collection,
        executor,
        Arc::new(RwLock::new(variables)),
        options,
    );

    if signals::was_interrupted() {
        return Ok(ExitStatus::Interrupted);
    }
    signals::set_active_run(&runner);
    let summary = runner.start().await;
    signals::clear_active_run();
    let summary = summary?;

    info!(
        collection = %name,
        completed = summary.completed,
        failed = summary.failed,
        "Run finished"
    );

    if args.json {
        print!("{}", output::format_run_results_json(&name, &summary));
    } else {
        print!("{}", output::format_run_results(&name, &summary));
    }

    if signals::was_interrupted() {
        return Ok(ExitStatus::Interrupted);
    }
    Ok(ExitStatus::from_summary(&summary))
}

async fn send_request(args: SendArgs, config: &Config) -> Result<ExitStatus> {
    let mut executor_options = config.executor_options();
    if let Some(timeout) = args.timeout {
        executor_options.timeout = timeout.into();
    }
    let executor = RequestExecutor::with_options(executor_options)?;

    let mut request = Request::new(0, args.method, &args.url);
    for (name, value) in &args.headers {
        request = request.with_header(name, value);
    }
    if let Some(body) = &args.body {
        request = request.with_body(body.as_str());
    }
    if let Some(path) = &args.pre {
        let script = read_script(&executor, path).await?;
        request = request.with_pre_request_script(&script);
    }
    if let Some(path) = &args.post {
        let script = read_script(&executor, path).await?;
        request = request.with_post_request_script(&script);
    }

    let mut variables = VariableStore::new();
    if let Some(path) = &args.vars {
        variables.import(load_variables_file(path)?);
    }

    let result = executor.execute(&request, &variables.snapshot()).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", output::format_request_result(&result));
    }

    Ok(if signals::was_interrupted() {
        ExitStatus::Interrupted
    } else if result.is_failed() {
        ExitStatus::Error
    } else if result.failed_assertions() > 0 {
        ExitStatus::AssertionFailed
    } else {
        ExitStatus::Success
    })
}

/// Read a script file and reject it up front when it does not compile
async fn read_script(executor: &RequestExecutor, path: &Path) -> Result<String> {
    let script = std::fs::read_to_string(path)?;
    executor.sandbox().validate(&script).await.map_err(|e| {
        ReqdeckError::Argument(format!("{}: {}", path.display(), e))
    })?;
    Ok(script)
}
