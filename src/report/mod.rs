//! Report assembly and rendering.

pub mod generator;
pub mod views;

pub use generator::{generate_json_report, generate_markdown_report, write_report};
pub use views::{build_report, ReportContext, ViewRequest};
