//! E2E test harness for the Airbnb Apartment Search Gradio UI
//!
//! This crate drives a browser against an externally-running Gradio
//! deployment (the "Airbnb Apartment Search" assistant) from Rust:
//! - Attaches to a running app, or launches one, and waits for readiness
//! - Parses declarative YAML test specs into interaction steps
//! - Generates a Playwright script per spec and runs it with Node in a
//!   single browser session
//! - Compares screenshots against baselines for visual regression
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── start_app() -> AppHandle  (attach or launch Gradio)  │
//! │    ├── run_spec(spec) -> TestResult  (one browser session)  │
//! │    └── SnapshotStore::compare(actual, baseline) -> Diff     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSpec (YAML)                                            │
//! │    ├── name, description, tags, fail_on_page_error          │
//! │    └── steps: [Step]                                        │
//! │          ├── navigate { url }                               │
//! │          ├── fill { locator: {label: Search Query}, value } │
//! │          ├── select { locator: {role, name}, option }       │
//! │          ├── assert { locator, visible?, text?, value? }    │
//! │          └── screenshot { name }                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod cli;
pub mod error;
pub mod gradio;
pub mod locator;
pub mod runner;
pub mod script;
pub mod snapshot;
pub mod spec;

pub use error::{E2eError, E2eResult};
pub use locator::Locator;
pub use runner::TestRunner;
pub use spec::{TestSpec, TestStep};
