//! Command-line interface for the E2E harness binary

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::error::E2eResult;
use crate::gradio::{AppConfig, LaunchConfig};
use crate::runner::RunnerConfig;
use crate::script::{BrowserKind, PlaywrightConfig};
use crate::snapshot::SnapshotConfig;

#[derive(Parser, Debug)]
#[command(name = "airbnb-search-e2e")]
#[command(about = "E2E test runner for the Airbnb Apartment Search UI")]
pub struct Args {
    /// Path to test specs directory
    #[arg(short, long, default_value = "specs")]
    pub specs: PathBuf,

    /// Run only tests matching this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Run only a specific test by name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Base URL of a running deployment (7860 and 8002 are the two known ports)
    #[arg(long, default_value = "http://127.0.0.1:7860")]
    pub base_url: String,

    /// Launch the app instead of attaching, e.g. --app-command "python app.py"
    #[arg(long)]
    pub app_command: Option<String>,

    /// Port for a launched app (0 = pick a free one)
    #[arg(long, default_value = "0")]
    pub port: u16,

    /// Seconds to wait for the app to become ready
    #[arg(long, default_value = "30")]
    pub startup_timeout: u64,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    pub browser: String,

    /// Run in headless mode (pass --headless false for a headed browser)
    #[arg(long, default_value = "true", action = ArgAction::Set, num_args = 1)]
    pub headless: bool,

    /// Viewport width
    #[arg(long, default_value = "1280")]
    pub viewport_width: u32,

    /// Viewport height
    #[arg(long, default_value = "720")]
    pub viewport_height: u32,

    /// Visual diff threshold (percentage)
    #[arg(long, default_value = "0.5")]
    pub visual_threshold: f64,

    /// Update visual baselines instead of comparing
    #[arg(long)]
    pub update_baselines: bool,

    /// Output directory for results
    #[arg(short, long, default_value = "test-results")]
    pub output: PathBuf,
}

impl Args {
    /// Turn parsed arguments into a runner configuration
    pub fn runner_config(&self) -> E2eResult<RunnerConfig> {
        let browser: BrowserKind = self.browser.parse()?;

        let launch = match &self.app_command {
            Some(line) => Some(LaunchConfig::from_command_line(line)?),
            None => None,
        };

        Ok(RunnerConfig {
            app: AppConfig {
                base_url: if launch.is_some() {
                    None
                } else {
                    Some(self.base_url.clone())
                },
                launch,
                port: if self.port == 0 { None } else { Some(self.port) },
                startup_timeout: Duration::from_secs(self.startup_timeout),
            },
            playwright: PlaywrightConfig {
                viewport_width: self.viewport_width,
                viewport_height: self.viewport_height,
                browser,
                headless: self.headless,
                ..Default::default()
            },
            snapshot: SnapshotConfig {
                threshold: self.visual_threshold,
                auto_update: self.update_baselines,
                ..Default::default()
            },
            specs_dir: self.specs.clone(),
            output_dir: self.output.clone(),
        })
    }
}
