//! E2E test harness entry point
//!
//! This binary drives the external Gradio search UI from YAML specs.
//! Run with: cargo test --test e2e -- --base-url http://127.0.0.1:7860

use clap::Parser;
use tracing_subscriber::EnvFilter;

use airbnb_search_e2e::cli::Args;
use airbnb_search_e2e::{E2eResult, TestRunner};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async_main(args));

    match result {
        Ok(success) => {
            if success {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let config = args.runner_config()?;
    let mut runner = TestRunner::with_config(config);

    runner.start_app().await?;

    let results = if let Some(name) = args.name {
        let result = runner.run_test(&name).await?;
        airbnb_search_e2e::runner::TestSuiteResult {
            started_at: chrono::Utc::now().to_rfc3339(),
            total: 1,
            passed: if result.success { 1 } else { 0 },
            failed: if result.success { 0 } else { 1 },
            skipped: 0,
            duration_ms: result.duration_ms,
            results: vec![result],
        }
    } else if let Some(tag) = args.tag {
        runner.run_tagged(&tag).await?
    } else {
        runner.run_all().await?
    };

    if args.update_baselines {
        runner.update_baselines()?;
    }

    runner.write_results(&results)?;

    Ok(results.failed == 0)
}
