//! Playwright script generation and execution
//!
//! One Node script is generated per test spec and executed in a single
//! browser session, so page state (a filled textbox, a picked model)
//! survives from step to step. Each step reports progress on stdout as an
//! `E2E_STEP {json}` marker line that the harness parses back into
//! [`StepResult`]s.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::locator::js_escape;
use crate::spec::{TestSpec, TestStep};

const STEP_MARKER: &str = "E2E_STEP ";
const DONE_MARKER: &str = "E2E_DONE ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" => Ok(BrowserKind::Webkit),
            other => Err(E2eError::Spec(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for the Playwright session
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub screenshot_dir: PathBuf,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub browser: BrowserKind,
    pub headless: bool,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7860".to_string(),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            viewport_width: 1280,
            viewport_height: 720,
            browser: BrowserKind::Chromium,
            headless: true,
        }
    }
}

/// Result of executing a test step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// Outcome of running one spec in one browser session
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub steps: Vec<StepResult>,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StepMarker {
    step: usize,
    name: String,
    ok: bool,
    ms: u64,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DoneMarker {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Drives a browser session for one spec at a time
pub struct PlaywrightSession {
    base_url: String,
    screenshot_dir: PathBuf,
    viewport_width: u32,
    viewport_height: u32,
    browser: BrowserKind,
    headless: bool,
}

impl PlaywrightSession {
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        check_playwright_installed()?;
        std::fs::create_dir_all(&config.screenshot_dir)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            screenshot_dir: config.screenshot_dir,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            browser: config.browser,
            headless: config.headless,
        })
    }

    /// Run a whole spec in one browser session
    pub async fn run(&self, spec: &TestSpec) -> E2eResult<SessionOutcome> {
        let script = self.build_script(spec);

        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("spec.js");
        std::fs::write(&script_path, &script)?;

        debug!("Running Playwright script for '{}': {}", spec.name, script_path.display());

        let output = TokioCommand::new("node")
            .arg(&script_path)
            .output()
            .await?;

        let stdout = strip_ansi(&String::from_utf8_lossy(&output.stdout));
        let (steps, done) = self.parse_markers(spec, &stdout);

        if steps.is_empty() && done.is_none() {
            // Script never got far enough to emit a marker
            let stderr = strip_ansi(&String::from_utf8_lossy(&output.stderr));
            return Err(E2eError::Playwright(format!(
                "script produced no output:\nstdout: {}\nstderr: {}",
                stdout, stderr
            )));
        }

        let (success, error) = match done {
            Some(d) => (d.ok, d.error),
            None => (false, Some("script terminated before completion".to_string())),
        };

        Ok(SessionOutcome {
            steps,
            success,
            error,
        })
    }

    fn parse_markers(&self, spec: &TestSpec, stdout: &str) -> (Vec<StepResult>, Option<DoneMarker>) {
        let mut steps = Vec::new();
        let mut done = None;

        for line in stdout.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix(STEP_MARKER) {
                if let Ok(marker) = serde_json::from_str::<StepMarker>(rest) {
                    let screenshot_path = spec
                        .steps
                        .get(marker.step.wrapping_sub(1))
                        .and_then(|s| match s {
                            TestStep::Screenshot { name, .. } => {
                                Some(self.screenshot_file(&spec.name, name))
                            }
                            _ => None,
                        });
                    steps.push(StepResult {
                        success: marker.ok,
                        step_name: marker.name,
                        duration_ms: marker.ms,
                        error: marker.error,
                        screenshot_path,
                    });
                }
            } else if let Some(rest) = line.strip_prefix(DONE_MARKER) {
                if let Ok(marker) = serde_json::from_str::<DoneMarker>(rest) {
                    done = Some(marker);
                }
            }
        }

        (steps, done)
    }

    /// Build the Node script for a whole spec
    pub fn build_script(&self, spec: &TestSpec) -> String {
        let mut script = String::new();

        script.push_str(&format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  const baseUrl = '{base_url}';
  const pageErrors = [];
  page.on('pageerror', (err) => pageErrors.push(String(err)));
  page.on('dialog', async (dialog) => {{
    pageErrors.push('dialog: ' + dialog.message());
    await dialog.dismiss().catch(() => {{}});
  }});

  const step = async (index, name, fn) => {{
    const started = Date.now();
    try {{
      await fn();
      console.log('{step_marker}' + JSON.stringify({{ step: index, name, ok: true, ms: Date.now() - started }}));
    }} catch (err) {{
      const message = err && err.message ? err.message : String(err);
      console.log('{step_marker}' + JSON.stringify({{ step: index, name, ok: false, ms: Date.now() - started, error: message }}));
      throw err;
    }}
  }};

  try {{
"#,
            browser = self.browser.as_str(),
            headless = self.headless,
            width = self.viewport_width,
            height = self.viewport_height,
            base_url = js_escape(&self.base_url),
            step_marker = STEP_MARKER,
        ));

        for (i, test_step) in spec.steps.iter().enumerate() {
            let index = i + 1;
            script.push_str(&format!(
                "    await step({}, '{}', async () => {{\n",
                index,
                js_escape(&test_step.name())
            ));
            for line in self.step_to_js(test_step, index, &spec.name).lines() {
                script.push_str("      ");
                script.push_str(line);
                script.push('\n');
            }
            script.push_str("    });\n");
        }

        if spec.fail_on_page_error {
            script.push_str(
                r#"
    if (pageErrors.length > 0) {
      throw new Error('page errors: ' + pageErrors.join('; '));
    }
"#,
            );
        }

        script.push_str(&format!(
            r#"    console.log('{done_marker}' + JSON.stringify({{ ok: true }}));
  }} catch (error) {{
    const message = error && error.message ? error.message : String(error);
    console.log('{done_marker}' + JSON.stringify({{ ok: false, error: message }}));
    process.exitCode = 1;
  }} finally {{
    await browser.close();
  }}
}})();
"#,
            done_marker = DONE_MARKER,
        ));

        script
    }

    /// Screenshots are keyed by spec name so that two specs can both take a
    /// "landing" shot without comparing against each other's baseline
    fn screenshot_file(&self, spec_name: &str, shot_name: &str) -> PathBuf {
        self.screenshot_dir
            .join(format!("{}-{}.png", spec_name, shot_name))
    }

    /// Convert a step to JavaScript code
    fn step_to_js(&self, step: &TestStep, index: usize, spec_name: &str) -> String {
        match step {
            TestStep::Navigate { url, wait_for } => {
                let mut js = format!(
                    "await page.goto(baseUrl + '{}');\nawait page.waitForLoadState('networkidle');",
                    js_escape(url)
                );
                if let Some(locator) = wait_for {
                    js.push_str(&format!(
                        "\nawait {}.waitFor({{ state: 'visible' }});",
                        locator.to_js()
                    ));
                }
                js
            }
            TestStep::Click { locator, timeout_ms } => {
                let timeout = timeout_ms.unwrap_or(5000);
                format!("await {}.click({{ timeout: {} }});", locator.to_js(), timeout)
            }
            TestStep::DblClick { locator } => {
                format!("await {}.dblclick();", locator.to_js())
            }
            TestStep::Fill {
                locator,
                value,
                clear_first,
            } => {
                let target = locator.to_js();
                if *clear_first {
                    format!(
                        "await {}.fill('');\nawait {}.fill('{}');",
                        target,
                        target,
                        js_escape(value)
                    )
                } else {
                    format!("await {}.fill('{}');", target, js_escape(value))
                }
            }
            TestStep::Type {
                locator,
                text,
                delay_ms,
            } => {
                let delay = delay_ms.unwrap_or(50);
                match locator {
                    Some(l) => format!(
                        "await {}.pressSequentially('{}', {{ delay: {} }});",
                        l.to_js(),
                        js_escape(text),
                        delay
                    ),
                    None => format!(
                        "await page.keyboard.type('{}', {{ delay: {} }});",
                        js_escape(text),
                        delay
                    ),
                }
            }
            TestStep::Press { locator, key } => match locator {
                Some(l) => format!("await {}.press('{}');", l.to_js(), js_escape(key)),
                None => format!("await page.keyboard.press('{}');", js_escape(key)),
            },
            TestStep::Wait {
                locator,
                timeout_ms,
                state,
            } => format!(
                "await {}.waitFor({{ state: '{}', timeout: {} }});",
                locator.to_js(),
                state.as_str(),
                timeout_ms
            ),
            TestStep::Sleep { ms } => format!("await page.waitForTimeout({});", ms),
            TestStep::Assert {
                locator,
                visible,
                enabled,
                text,
                text_contains,
                value,
                count,
            } => {
                let target = locator.to_js();
                let desc = js_escape(&locator.describe());
                let mut checks = Vec::new();

                if let Some(vis) = visible {
                    let state = if *vis { "visible" } else { "hidden" };
                    checks.push(format!(
                        "await {}.waitFor({{ state: '{}', timeout: 5000 }});",
                        target, state
                    ));
                }

                if let Some(en) = enabled {
                    if *en {
                        checks.push(format!(
                            "if (!(await {}.isEnabled())) {{ throw new Error('expected {} to be enabled'); }}",
                            target, desc
                        ));
                    } else {
                        checks.push(format!(
                            "if (!(await {}.isDisabled())) {{ throw new Error('expected {} to be disabled'); }}",
                            target, desc
                        ));
                    }
                }

                if let Some(t) = text {
                    checks.push(format!(
                        "const text{i} = ((await {}.textContent()) || '').trim();\nif (text{i} !== '{}') {{ throw new Error('expected {} to have text \"{}\", got \"' + text{i} + '\"'); }}",
                        target,
                        js_escape(t),
                        desc,
                        js_escape(t),
                        i = index
                    ));
                }

                if let Some(tc) = text_contains {
                    checks.push(format!(
                        "const body{i} = await {}.innerText();\nif (!body{i}.includes('{}')) {{ throw new Error('expected {} to contain \"{}\"'); }}",
                        target,
                        js_escape(tc),
                        desc,
                        js_escape(tc),
                        i = index
                    ));
                }

                if let Some(v) = value {
                    checks.push(format!(
                        "const value{i} = await {}.inputValue();\nif (value{i} !== '{}') {{ throw new Error('expected {} to have value \"{}\", got \"' + value{i} + '\"'); }}",
                        target,
                        js_escape(v),
                        desc,
                        js_escape(v),
                        i = index
                    ));
                }

                if let Some(c) = count {
                    checks.push(format!(
                        "const count{i} = await {}.count();\nif (count{i} !== {c}) {{ throw new Error('expected {c} matches for {}, got ' + count{i}); }}",
                        target,
                        desc,
                        c = c,
                        i = index
                    ));
                }

                checks.join("\n")
            }
            TestStep::Screenshot {
                name,
                locator,
                full_page,
            } => {
                let path = self.screenshot_file(spec_name, name);
                let path_str = js_escape(&path.to_string_lossy());

                match locator {
                    Some(l) => format!(
                        "await {}.screenshot({{ path: '{}' }});",
                        l.to_js(),
                        path_str
                    ),
                    None => format!(
                        "await page.screenshot({{ path: '{}', fullPage: {} }});",
                        path_str, full_page
                    ),
                }
            }
            TestStep::Hover { locator } => format!("await {}.hover();", locator.to_js()),
            TestStep::Focus { locator } => format!("await {}.focus();", locator.to_js()),
            TestStep::Select { locator, option } => {
                // Gradio dropdowns are listboxes: open, then pick the option
                // by its accessible name
                format!(
                    "await {}.dblclick();\nawait page.getByRole('option', {{ name: '{}' }}).click();",
                    locator.to_js(),
                    js_escape(option)
                )
            }
            TestStep::Check { locator } => format!("await {}.check();", locator.to_js()),
            TestStep::Uncheck { locator } => format!("await {}.uncheck();", locator.to_js()),
            TestStep::Log { message } => {
                format!("console.log('[test] {}');", js_escape(message))
            }
        }
    }
}

/// Check if Playwright is installed
fn check_playwright_installed() -> E2eResult<()> {
    let output = Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

/// Remove ANSI escape sequences from node output before marker parsing
fn strip_ansi(s: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| Regex::new("\x1b\\[[0-9;]*[A-Za-z]").unwrap());
    re.replace_all(s, "").to_string()
}
