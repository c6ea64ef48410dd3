//! Result table rendering
//!
//! Failures sort first so they are visible without scrolling; within a
//! status group the order is alphabetical. URLs and error messages are
//! truncated to the terminal width unless truncation is disabled.

use crate::store::{LinkResult, LinkStatus};

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_RED: &str = "\x1b[31m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_YELLOW: &str = "\x1b[33m";
const COLOR_MAGENTA: &str = "\x1b[35m";
const COLOR_DIM: &str = "\x1b[2m";

/// Width of the status column, sized for "BOT BLOCKED"
const STATUS_WIDTH: usize = 12;

/// Fallback terminal width when none is configured
const DEFAULT_WIDTH: usize = 120;

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Terminal width; 0 means the default
    pub width: usize,
    /// Never truncate URLs or error messages
    pub no_truncate: bool,
}

/// Counts of results by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub live: usize,
    pub dead: usize,
    pub timeout: usize,
    pub bot_blocked: usize,
}

pub fn count_statuses(results: &[LinkResult]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for result in results {
        match result.status {
            LinkStatus::Live => counts.live += 1,
            LinkStatus::Dead => counts.dead += 1,
            LinkStatus::Timeout => counts.timeout += 1,
            LinkStatus::BotBlocked => counts.bot_blocked += 1,
        }
    }
    counts
}

fn status_color(status: LinkStatus) -> &'static str {
    match status {
        LinkStatus::Live => COLOR_GREEN,
        LinkStatus::Dead => COLOR_RED,
        LinkStatus::Timeout => COLOR_YELLOW,
        LinkStatus::BotBlocked => COLOR_MAGENTA,
    }
}

fn status_rank(status: LinkStatus) -> u8 {
    match status {
        LinkStatus::Dead => 0,
        LinkStatus::Timeout => 1,
        LinkStatus::BotBlocked => 2,
        LinkStatus::Live => 3,
    }
}

/// Truncates `text` to at most `max` characters, ellipsis included.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let truncated: String = text.chars().take(keep).collect();
    format!("{}...", truncated)
}

/// Renders the full report as a string.
pub fn render_report(results: &[LinkResult], opts: &ReportOptions) -> String {
    let width = if opts.width > 0 { opts.width } else { DEFAULT_WIDTH };

    let mut sorted: Vec<&LinkResult> = results.iter().collect();
    sorted.sort_by(|a, b| {
        status_rank(a.status)
            .cmp(&status_rank(b.status))
            .then_with(|| a.url.cmp(&b.url))
    });

    // split the remaining width between URL and error, favoring the URL
    let usable = width.saturating_sub(STATUS_WIDTH + 2).max(20);
    let url_width = (usable * 2 / 3).max(10);
    let error_width = usable.saturating_sub(url_width);

    let mut out = String::new();
    for result in &sorted {
        let url = if opts.no_truncate {
            result.url.clone()
        } else {
            truncate(&result.url, url_width)
        };
        let error = if opts.no_truncate {
            result.error.clone()
        } else {
            truncate(&result.error, error_width)
        };

        out.push_str(&format!(
            "{}{:<width$}{} {:<url_width$} {}{}{}\n",
            status_color(result.status),
            result.status.to_string(),
            COLOR_RESET,
            url,
            COLOR_DIM,
            error,
            COLOR_RESET,
            width = STATUS_WIDTH,
            url_width = if opts.no_truncate { 0 } else { url_width },
        ));
    }

    let counts = count_statuses(results);
    out.push_str(&format!(
        "\n{} live, {} dead, {} timed out, {} bot blocked ({} total)\n",
        counts.live,
        counts.dead,
        counts.timeout,
        counts.bot_blocked,
        results.len()
    ));

    out
}

/// Prints the report to stdout.
pub fn print_report(results: &[LinkResult], opts: &ReportOptions) {
    print!("{}", render_report(results, opts));
}
