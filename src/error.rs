//! Error types for the E2E harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("App failed to launch: {0}")]
    AppLaunch(String),

    #[error("Gradio app not ready after {0} attempts")]
    AppNotReady(usize),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Test spec error: {0}")]
    Spec(String),

    #[error("Baseline not found: {0}")]
    BaselineNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type E2eResult<T> = Result<T, E2eError>;
