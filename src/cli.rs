//! Command-line interface definitions for Español Diario.
//!
//! This module defines the CLI arguments and options using the `clap`
//! crate. The trigger is normally a scheduler with no arguments at all;
//! the flags exist for manual runs (replaying a date, forcing a phase,
//! dry-running without workspace writes). Credentials always come from the
//! environment.

use clap::Parser;

/// Command-line arguments for the daily pipeline.
///
/// # Examples
///
/// ```sh
/// # The scheduled invocation: everything derived from today's date
/// espanol_diario
///
/// # Replay a specific date deterministically
/// espanol_diario --date 2025-09-18
///
/// # Force the C1 opinion phase and keep the workspace untouched
/// espanol_diario --phase 2 --skip-publish
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Date to compute the learning phase for (YYYY-MM-DD); defaults to today
    #[arg(short, long)]
    pub date: Option<String>,

    /// Force a rotation phase index instead of deriving it from the date
    #[arg(short, long)]
    pub phase: Option<usize>,

    /// Fetch and analyze, but do not write workspace pages
    #[arg(long)]
    pub skip_publish: bool,

    /// API key for the chat-completions endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// Notion integration token (required unless --skip-publish)
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    pub notion_token: Option<String>,

    /// Notion database that receives the study pages
    #[arg(long, env = "NOTION_DATABASE_ID")]
    pub notion_database_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(&["espanol_diario", "--openai-api-key", "sk-test"]);
        assert!(cli.date.is_none());
        assert!(cli.phase.is_none());
        assert!(!cli.skip_publish);
        assert_eq!(cli.openai_api_key, "sk-test");
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from(&[
            "espanol_diario",
            "--openai-api-key",
            "sk-test",
            "--date",
            "2025-09-18",
            "--phase",
            "2",
            "--skip-publish",
        ]);
        assert_eq!(cli.date.as_deref(), Some("2025-09-18"));
        assert_eq!(cli.phase, Some(2));
        assert!(cli.skip_publish);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(&[
            "espanol_diario",
            "--openai-api-key",
            "sk-test",
            "-d",
            "2025-07-01",
            "-p",
            "0",
        ]);
        assert_eq!(cli.date.as_deref(), Some("2025-07-01"));
        assert_eq!(cli.phase, Some(0));
    }
}
