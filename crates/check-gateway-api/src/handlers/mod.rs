//! Route handlers.

pub mod report;
pub mod webhook;

pub use report::{handle_report, report_readiness, ReportOutcome};
pub use webhook::{handle_github_webhook, WebhookOutcome};
