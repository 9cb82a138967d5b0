//! Gradio app management - attaching to or launching the UI under test
//!
//! The Airbnb search UI is an external Gradio application. The harness
//! normally attaches to a deployment that is already running (the two
//! observed ports are 7860 and 8002), but it can also launch the app
//! itself when given a command, injecting `GRADIO_SERVER_PORT` and
//! `GRADIO_SERVER_NAME` so the app lands on a known address.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Default deployment the recorded flows were captured against
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7860";

/// Handle to the Gradio app under test
pub struct AppHandle {
    /// Child process, present only when the harness launched the app
    child: Option<Child>,
    base_url: String,
    /// Gradio version reported by the config endpoint, if any
    pub gradio_version: Option<String>,
}

/// Shape of the `/config` payload we care about
#[derive(Debug, Deserialize)]
struct GradioConfig {
    #[serde(default)]
    version: Option<String>,
}

impl AppHandle {
    /// Attach to an already-running deployment, or launch one if the
    /// config carries a launch command
    pub async fn connect(config: AppConfig) -> E2eResult<Self> {
        let (child, base_url) = match &config.launch {
            Some(launch) => {
                let port = config.port.unwrap_or_else(find_free_port);
                let base_url = format!("http://127.0.0.1:{}", port);

                info!("Launching app on port {}: {}", port, launch.program.display());

                let mut cmd = Command::new(&launch.program);
                cmd.args(&launch.args)
                    .env("GRADIO_SERVER_NAME", "127.0.0.1")
                    .env("GRADIO_SERVER_PORT", port.to_string())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
                if let Some(dir) = &launch.workdir {
                    cmd.current_dir(dir);
                }

                let child = cmd.spawn().map_err(|e| {
                    E2eError::AppLaunch(format!(
                        "failed to spawn {}: {}",
                        launch.program.display(),
                        e
                    ))
                })?;

                (Some(child), base_url)
            }
            None => {
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
                (None, base_url.trim_end_matches('/').to_string())
            }
        };

        let mut handle = AppHandle {
            child,
            base_url,
            gradio_version: None,
        };

        handle.wait_for_ready(config.startup_timeout).await?;

        info!("Gradio app is ready at {}", handle.base_url);
        Ok(handle)
    }

    /// Poll the Gradio config endpoint until the app answers
    async fn wait_for_ready(&mut self, timeout: Duration) -> E2eResult<()> {
        let config_url = format!("{}/config", self.base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            match client.get(&config_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    match resp.json::<GradioConfig>().await {
                        Ok(cfg) => {
                            if let Some(version) = &cfg.version {
                                info!("Gradio version: {}", version);
                            }
                            self.gradio_version = cfg.version;
                            return Ok(());
                        }
                        Err(e) => warn!("Config endpoint returned non-JSON body: {}", e),
                    }
                }
                Ok(resp) => {
                    warn!("Config endpoint returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for app at {}...", self.base_url);
                    }
                    // Connection refused is expected while the app starts
                    if !e.is_connect() {
                        warn!("Readiness probe error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::AppNotReady(attempts))
    }

    /// Get the base URL for the app under test
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the app if the harness launched it. Attached deployments are
    /// left alone.
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        info!("Stopping launched app (pid: {})", child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        // Force kill if still running
        let _ = child.kill();
        let _ = child.wait();

        Ok(())
    }
}

impl Drop for AppHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for reaching the app under test
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Attach to this URL when no launch command is given
    pub base_url: Option<String>,

    /// Launch the app ourselves instead of attaching
    pub launch: Option<LaunchConfig>,

    /// Fixed port for a launched app (None = find a free one)
    pub port: Option<u16>,

    /// How long to wait for the config endpoint to answer
    pub startup_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            launch: None,
            port: None,
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Command used to launch the Gradio app
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
}

impl LaunchConfig {
    /// Split a shell-ish command line ("python app.py") into program and args
    pub fn from_command_line(line: &str) -> E2eResult<Self> {
        let mut parts = line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| E2eError::AppLaunch("empty app command".to_string()))?;

        Ok(Self {
            program: PathBuf::from(program),
            args: parts.map(String::from).collect(),
            workdir: None,
        })
    }
}

/// Find a free port to use
fn find_free_port() -> u16 {
    use std::net::TcpListener;

    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to find free port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_free_port() {
        let port1 = find_free_port();
        let port2 = find_free_port();

        assert!(port1 > 1024);
        assert!(port2 > 1024);
    }

    #[test]
    fn test_launch_config_from_command_line() {
        let launch = LaunchConfig::from_command_line("python app.py --share").unwrap();
        assert_eq!(launch.program, PathBuf::from("python"));
        assert_eq!(launch.args, vec!["app.py", "--share"]);
    }

    #[test]
    fn test_empty_command_line_rejected() {
        assert!(LaunchConfig::from_command_line("   ").is_err());
    }

    #[test]
    fn test_attach_url_default() {
        let config = AppConfig::default();
        assert!(config.base_url.is_none());
        assert!(config.launch.is_none());
    }
}
