//! CLI entry (§4.13) — intentionally thin: read, load, dispatch to
//! `lint` or `run`, exit code. The subsystems all live in the library.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use scenario_runner::browser::fantoccini_adapter::FantocciniBrowser;
use scenario_runner::config::RunnerConfig;
use scenario_runner::handlers;
use scenario_runner::lint::{self, LintSeverity};
use scenario_runner::registry::StepRegistry;
use scenario_runner::runner::Runner;
use scenario_runner::schema::{self, Scenario};

#[derive(Parser)]
#[command(name = "scenario-runner", about = "Declarative browser scenario runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Executes a scenario and writes its artifacts/report.
    Run {
        scenario: PathBuf,
        #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
        webdriver_url: String,
    },
    /// Validates and lints a scenario without executing it.
    Lint { scenario: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    scenario_runner::telemetry::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Lint { scenario } => run_lint(&scenario),
        Command::Run { scenario, webdriver_url } => run_scenario(&scenario, &webdriver_url).await,
    }
}

fn load_scenario(path: &PathBuf) -> Result<Scenario, ExitCode> {
    let bytes = std::fs::read(path).map_err(|e| {
        eprintln!("failed to read {}: {e}", path.display());
        ExitCode::FAILURE
    })?;
    schema::load(&bytes).map_err(|issues| {
        for issue in issues {
            eprintln!("{issue}");
        }
        ExitCode::FAILURE
    })
}

fn run_lint(path: &PathBuf) -> ExitCode {
    let scenario = match load_scenario(path) {
        Ok(scenario) => scenario,
        Err(code) => return code,
    };

    let issues = lint::lint(&scenario);
    if issues.is_empty() {
        println!("no issues found");
        return ExitCode::SUCCESS;
    }
    for issue in &issues {
        println!("{}:{} [{:?}/{}] {}", issue.step_name, issue.line_number, issue.severity, issue.rule, issue.message);
    }
    if issues.iter().any(|i| i.severity == LintSeverity::Error) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run_scenario(path: &PathBuf, webdriver_url: &str) -> ExitCode {
    let scenario = match load_scenario(path) {
        Ok(scenario) => scenario,
        Err(code) => return code,
    };

    let config = RunnerConfig::from_env();
    let browser = FantocciniBrowser::new(webdriver_url);
    let mut registry = StepRegistry::new();
    handlers::register_builtin(&mut registry);

    let runner = Runner::new(&browser, &registry, &config);
    match runner.run(&scenario).await {
        Ok(report) => {
            println!(
                "{}: {:?} ({} passed, {} failed, {} skipped)",
                report.title, report.status, report.summary.passed, report.summary.failed, report.summary.skipped
            );
            if report.summary.failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("scenario run failed: {e}");
            ExitCode::FAILURE
        }
    }
}
