//! Error taxonomy for the daily pipeline.
//!
//! Each pipeline stage has its own error type so that a failure can be
//! attributed to the stage that produced it. Every error is fatal to the
//! content item being processed: nothing is retried within a run, and
//! recovery is simply the next scheduled invocation.
//!
//! | Stage | Error | Typical causes |
//! |-------|-------|----------------|
//! | Scheduler | [`ScheduleError`] | unparseable `--date` override |
//! | Fetcher | [`FetchError`] | source unreachable, empty feed, no usable body |
//! | Analyzer | [`AnalysisError`] | API failure, non-conforming response |
//! | Publisher | [`PublishError`] | workspace schema or page creation failure |

use thiserror::Error;

/// Errors from phase computation.
///
/// The scheduler itself is a total function over valid dates; the only
/// failure mode is an invalid date or phase override supplied at the CLI.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("invalid date override {input:?}: {reason}")]
    InvalidDate { input: String, reason: String },

    #[error("phase index {0} is out of range for the rotation table")]
    PhaseOutOfRange(usize),
}

/// Errors from article scraping or podcast feed parsing.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("feed {url} could not be parsed: {reason}")]
    MalformedFeed { url: String, reason: String },

    #[error("no eligible entry found in {source}")]
    NoEligibleEntry { source: String },
}

/// Errors from the language-model analysis stage.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("completion endpoint returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model response did not match the expected format: {reason}")]
    Unparseable { reason: String },
}

/// Errors from the Notion publishing stage.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("workspace request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("workspace API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("database has no title property; cannot create pages")]
    NoTitleProperty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let e = FetchError::NoEligibleEntry {
            source: "https://feeds.feedburner.com/hoyhablamos".to_string(),
        };
        assert!(e.to_string().contains("no eligible entry"));
        assert!(e.to_string().contains("hoyhablamos"));
    }

    #[test]
    fn test_analysis_error_display() {
        let e = AnalysisError::Unparseable {
            reason: "missing grammar level".to_string(),
        };
        assert!(e.to_string().contains("expected format"));
    }

    #[test]
    fn test_schedule_error_display() {
        let e = ScheduleError::InvalidDate {
            input: "2025-13-40".to_string(),
            reason: "month out of range".to_string(),
        };
        assert!(e.to_string().contains("2025-13-40"));
    }
}
