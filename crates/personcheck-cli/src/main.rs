//! personcheck CLI - conformance test harness for the persons API

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use personcheck_core::verdict::TOOL_ERROR_EXIT;
use personcheck_core::{Config, SchemaDocument, VerdictPolicy, VerdictStatus};
use personcheck_runner::{HarnessContext, Suite};

const CONFIG_FILE: &str = "personcheck.toml";

const DEFAULT_FILTER: &str = "warn,personcheck=info,personcheck_core=info,personcheck_runner=info";
const DEBUG_FILTER: &str = "info,personcheck=debug,personcheck_core=debug,personcheck_runner=debug";

#[derive(Parser)]
#[command(name = "personcheck")]
#[command(about = "Conformance test harness for the persons API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Strict mode (warnings fail the run). Use --strict false to disable.
    #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scenarios against the configured API
    Run {
        /// Config file (TOML by extension, JSON otherwise)
        #[arg(short, long)]
        config: PathBuf,

        /// OpenAPI 3.0 or Swagger 2.0 document (YAML or JSON)
        #[arg(long)]
        openapi: PathBuf,

        /// Debug logging (overridden by RUST_LOG)
        #[arg(long)]
        debug: bool,

        /// Scenarios to run in parallel
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,

        /// Run only these scenarios (repeatable)
        #[arg(long)]
        only: Vec<String>,

        /// Show the plan and validate config without sending requests
        #[arg(long)]
        dry_run: bool,
    },

    /// Write an example config file
    Init,

    /// Export JSON Schema of the run report
    Schema,

    /// List built-in scenarios
    Scenarios,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(tool_error_code())
        }
    }
}

fn tool_error_code() -> u8 {
    u8::try_from(TOOL_ERROR_EXIT).unwrap_or(3)
}

/// Log to stderr so `--output json` stays parseable.
fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { DEBUG_FILTER } else { DEFAULT_FILTER }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run {
            config,
            openapi,
            debug,
            jobs,
            only,
            dry_run,
        } => {
            init_logging(debug);
            run_suite(&RunArgs {
                config: &config,
                openapi: &openapi,
                jobs,
                only: &only,
                dry_run,
                output: cli.output,
                strict: cli.strict,
            })
        }

        Commands::Init => {
            if Path::new(CONFIG_FILE).exists() {
                eprintln!("{CONFIG_FILE} already exists");
                return Ok(1);
            }

            std::fs::write(CONFIG_FILE, Config::example())
                .with_context(|| format!("Cannot write {CONFIG_FILE}"))?;
            println!("Created {CONFIG_FILE}");
            println!("\nEdit the file to configure:");
            println!("  - hostname, version, api: the API under test");
            println!("  - client_id / client_secret / token_api_url: credentials");
            println!("  - test_cases: OSU IDs of the fixture persons");
            println!("  - query_params: values to probe per endpoint");
            println!("\nThen: personcheck run --config {CONFIG_FILE} --openapi openapi.yaml");
            Ok(0)
        }

        Commands::Schema => {
            let schema = personcheck_core::report::generate_schema()?;
            println!("{schema}");
            Ok(0)
        }

        Commands::Scenarios => {
            for name in Suite::persons().names() {
                println!("{name}");
            }
            Ok(0)
        }
    }
}

struct RunArgs<'a> {
    config: &'a Path,
    openapi: &'a Path,
    jobs: usize,
    only: &'a [String],
    dry_run: bool,
    output: OutputFormat,
    strict: bool,
}

fn run_suite(args: &RunArgs<'_>) -> Result<i32> {
    let cfg = Config::load(args.config)?;
    let doc = SchemaDocument::load(args.openapi)?;
    let suite = Suite::persons();

    // Dry run: show plan and exit
    if args.dry_run {
        let plan = suite.plan(&cfg, &doc, args.only)?;
        match args.output {
            OutputFormat::Terminal => println!("{}", plan.to_terminal()),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
            OutputFormat::Silent => {}
        }
        return Ok(if plan.has_errors() { 1 } else { 0 });
    }

    let schemas = suite.required_schemas(args.only)?;
    let ctx = HarnessContext::connect(cfg, &doc, schemas)?;

    let start = Instant::now();
    let report = suite.run(&ctx, args.jobs, args.only)?;
    let duration = start.elapsed().as_secs_f64();
    tracing::info!(
        checks = report.total_checks,
        failures = report.failure_count,
        duration,
        "run finished"
    );

    let policy = if args.strict {
        VerdictPolicy::default()
    } else {
        VerdictPolicy::lenient()
    };
    let failures: Vec<_> = report.failures().cloned().collect();
    let mut verdict = policy.verdict(&failures, report.total_checks);

    // A scenario that panicked verified nothing reliable
    if report.aborted() > 0 {
        verdict.status = VerdictStatus::Fail;
        verdict.exit_code = TOOL_ERROR_EXIT;
        verdict.reason = format!("{} ({} scenarios aborted)", verdict.reason, report.aborted());
    }

    match args.output {
        OutputFormat::Terminal => {
            println!("{}", report.to_terminal());
            println!("\n{}: {}", verdict.status, verdict.reason);
            println!("  Duration: {duration:.1}s");
            println!("  Exit code: {}", verdict.exit_code);
        }
        OutputFormat::Json => {
            let json_output = serde_json::json!({
                "verdict": {
                    "status": verdict.status.to_string(),
                    "exit_code": verdict.exit_code,
                    "reason": verdict.reason,
                },
                "duration_secs": duration,
                "report": report,
            });
            println!("{}", serde_json::to_string_pretty(&json_output)?);
        }
        OutputFormat::Silent => {}
    }

    Ok(verdict.exit_code)
}
