//! Result presentation
//!
//! Renders the final color-coded result table and the per-status summary.

mod report;

pub use report::{count_statuses, print_report, render_report, ReportOptions, StatusCounts};
