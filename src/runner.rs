//! Main test runner that orchestrates the app, Playwright, and snapshots

use std::path::{Path, PathBuf};
use std::time::Instant;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{E2eError, E2eResult};
use crate::gradio::{AppConfig, AppHandle};
use crate::script::{PlaywrightConfig, PlaywrightSession, StepResult};
use crate::snapshot::{SnapshotConfig, SnapshotStore};
use crate::spec::TestSpec;

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub snapshots: Vec<SnapshotResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResult {
    pub name: String,
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_image_path: Option<String>,
}

/// Result of running the whole suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub app: AppConfig,
    pub playwright: PlaywrightConfig,
    pub snapshot: SnapshotConfig,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            playwright: PlaywrightConfig::default(),
            snapshot: SnapshotConfig::default(),
            specs_dir: PathBuf::from("specs"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Main E2E test runner
pub struct TestRunner {
    app_config: AppConfig,
    playwright_config: PlaywrightConfig,
    snapshot_config: SnapshotConfig,
    app: Option<AppHandle>,
    specs_dir: PathBuf,
    output_dir: PathBuf,
}

impl TestRunner {
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            app_config: config.app,
            playwright_config: config.playwright,
            snapshot_config: config.snapshot,
            app: None,
            specs_dir: config.specs_dir,
            output_dir: config.output_dir,
        }
    }

    /// Attach to (or launch) the app under test
    pub async fn start_app(&mut self) -> E2eResult<()> {
        if self.app.is_some() {
            return Ok(());
        }

        let app = AppHandle::connect(self.app_config.clone()).await?;
        self.playwright_config.base_url = app.base_url().to_string();
        self.app = Some(app);
        Ok(())
    }

    /// Stop a launched app
    pub fn stop_app(&mut self) -> E2eResult<()> {
        if let Some(mut app) = self.app.take() {
            app.stop()?;
        }
        Ok(())
    }

    /// Run all specs in the specs directory
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        self.run_specs(&specs).await
    }

    /// Run specs matching a tag; non-matching specs count as skipped
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        let (matching, skipped) = split_by_tag(specs, tag);
        self.run_specs_inner(&matching, skipped).await
    }

    /// Run a specific spec by name
    pub async fn run_test(&mut self, name: &str) -> E2eResult<TestResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::Spec(format!("test not found: {}", name)))?;

        self.start_app().await?;
        self.run_spec(&spec).await
    }

    /// Run a list of specs sequentially, each in a fresh browser session
    pub async fn run_specs(&mut self, specs: &[TestSpec]) -> E2eResult<TestSuiteResult> {
        self.run_specs_inner(specs, 0).await
    }

    async fn run_specs_inner(
        &mut self,
        specs: &[TestSpec],
        skipped: usize,
    ) -> E2eResult<TestSuiteResult> {
        let start = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        self.start_app().await?;

        info!("Running {} test(s) against {}", specs.len(), self.playwright_config.base_url);

        for spec in specs {
            match self.run_spec(spec).await {
                Ok(result) => {
                    if result.success {
                        passed += 1;
                        info!("✓ {} ({} ms)", result.name, result.duration_ms);
                    } else {
                        failed += 1;
                        error!(
                            "✗ {} - {}",
                            result.name,
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    results.push(result);
                }
                Err(e) => {
                    failed += 1;
                    error!("✗ {} - {}", spec.name, e);
                    results.push(TestResult {
                        name: spec.name.clone(),
                        success: false,
                        duration_ms: 0,
                        steps: vec![],
                        snapshots: vec![],
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        Ok(TestSuiteResult {
            started_at,
            total: specs.len() + skipped,
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        })
    }

    /// Run a single spec in one browser session
    pub async fn run_spec(&mut self, spec: &TestSpec) -> E2eResult<TestResult> {
        let start = Instant::now();
        debug!("Running test: {}", spec.name);

        let mut pw_config = self.playwright_config.clone();
        pw_config.viewport_width = spec.viewport.width;
        pw_config.viewport_height = spec.viewport.height;

        let session = PlaywrightSession::new(pw_config)?;
        let outcome = session.run(spec).await?;

        let mut test_error = outcome.error.clone();

        // Names of screenshots captured by successful steps
        let screenshots: Vec<String> = outcome
            .steps
            .iter()
            .filter(|s| s.success)
            .filter_map(|s| s.screenshot_path.as_ref())
            .filter_map(|p| p.file_stem())
            .map(|n| n.to_string_lossy().to_string())
            .collect();

        let mut snapshots = Vec::new();
        if spec.visual_regression && test_error.is_none() {
            let store = SnapshotStore::new(self.snapshot_config.clone())?;

            for name in &screenshots {
                match store.compare(name, Some(spec.visual_threshold)) {
                    Ok(diff) => {
                        if !diff.matches {
                            test_error = Some(format!(
                                "visual regression in '{}': {:.2}% pixels differ",
                                name, diff.diff_percent
                            ));
                        }
                        snapshots.push(SnapshotResult {
                            name: name.clone(),
                            matches: diff.matches,
                            diff_percent: diff.diff_percent,
                            diff_image_path: diff
                                .diff_image_path
                                .map(|p| p.to_string_lossy().to_string()),
                        });
                    }
                    Err(E2eError::BaselineNotFound(_)) => {
                        // First run - record on the next run with --update-baselines
                        info!("No baseline for '{}' yet", name);
                    }
                    Err(e) => {
                        test_error = Some(format!("snapshot comparison error: {}", e));
                    }
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let success = test_error.is_none();

        Ok(TestResult {
            name: spec.name.clone(),
            success,
            duration_ms,
            steps: outcome.steps,
            snapshots,
            error: test_error,
        })
    }

    /// Promote all captured screenshots to baselines
    pub fn update_baselines(&self) -> E2eResult<()> {
        let store = SnapshotStore::new(self.snapshot_config.clone())?;
        store.update_all_baselines()
    }

    /// Write the suite result to a JSON report
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }

    /// Directory the runner loads specs from
    pub fn specs_dir(&self) -> &Path {
        &self.specs_dir
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        let _ = self.stop_app();
    }
}

/// Split loaded specs into those carrying the tag and the count left behind
fn split_by_tag(specs: Vec<TestSpec>, tag: &str) -> (Vec<TestSpec>, usize) {
    let total = specs.len();
    let matching: Vec<TestSpec> = specs
        .into_iter()
        .filter(|s| s.tags.iter().any(|t| t == tag))
        .collect();
    let skipped = total - matching.len();
    (matching, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_with_tags(name: &str, tags: &[&str]) -> TestSpec {
        TestSpec::from_yaml(&format!(
            "name: {}\ntags: [{}]\nsteps:\n  - action: navigate\n    url: /\n",
            name,
            tags.join(", ")
        ))
        .unwrap()
    }

    #[test]
    fn test_split_by_tag_counts_skipped() {
        let specs = vec![
            spec_with_tags("a", &["smoke"]),
            spec_with_tags("b", &["slow"]),
            spec_with_tags("c", &["smoke", "search"]),
        ];

        let (matching, skipped) = split_by_tag(specs, "smoke");
        assert_eq!(matching.len(), 2);
        assert_eq!(skipped, 1);

        let names: Vec<&str> = matching.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_split_by_unknown_tag_skips_everything() {
        let specs = vec![spec_with_tags("a", &["smoke"])];
        let (matching, skipped) = split_by_tag(specs, "nightly");
        assert!(matching.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_suite_result_reports_skipped() {
        let suite = TestSuiteResult {
            started_at: "2026-08-23T00:00:00+00:00".to_string(),
            total: 3,
            passed: 2,
            failed: 0,
            skipped: 1,
            duration_ms: 42,
            results: vec![],
        };

        let json = serde_json::to_value(&suite).unwrap();
        assert_eq!(json["skipped"], 1);
        assert_eq!(json["total"], 3);
        assert_eq!(json["passed"], 2);
    }
}
