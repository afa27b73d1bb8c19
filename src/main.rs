//! # Español Diario
//!
//! A daily pipeline that collects Spanish learning material, analyzes it
//! with an LLM, and files structured study notes into a Notion database.
//!
//! ## Features
//!
//! - Derives the day's difficulty phase, reading source, and podcast feed
//!   from a fixed rotation table (pure function of the date)
//! - Scrapes one article from the phase's source (20minutos or El País)
//! - Picks one episode from the day's podcast feed (RSS), resolving an
//!   Apple Podcasts episode link via the iTunes Search API
//! - Grades both texts on the CEFR scale and extracts grammar points
//!   (articles) or colloquial expressions (podcasts)
//! - Creates one Notion page per item with typed properties and a study memo
//!
//! ## Usage
//!
//! ```sh
//! espanol_diario                       # scheduled daily run
//! espanol_diario --date 2025-09-18    # replay a date
//! espanol_diario --skip-publish       # dry run without workspace writes
//! ```
//!
//! ## Architecture
//!
//! One run is strictly linear per content item:
//! 1. **Schedule**: Compute the learning phase from the date
//! 2. **Fetch**: Retrieve the article and the podcast episode
//! 3. **Analyze**: Grade difficulty and extract study notes via the LLM
//! 4. **Publish**: Create one workspace page per item
//!
//! The article and podcast pipelines are attempted independently; a failure
//! in either marks the whole run failed after both were tried. Nothing is
//! retried within a run.

use chrono::{Local, NaiveDate};
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod api;
mod cli;
mod error;
mod memo;
mod models;
mod notion;
mod podcasts;
mod schedule;
mod scrapers;
mod utils;

use api::SpanishAnalyzer;
use cli::Cli;
use error::ScheduleError;
use models::{AnalysisResult, ContentItem};
use notion::NotionClient;
use schedule::LearningPhase;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("espanol_diario starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.date, ?args.phase, args.skip_publish, "Parsed CLI arguments");

    // --- Resolve the date once; everything downstream is deterministic ---
    let date = match &args.date {
        Some(raw) => {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| ScheduleError::InvalidDate {
                input: raw.clone(),
                reason: e.to_string(),
            })?
        }
        None => Local::now().date_naive(),
    };

    let phase = match args.phase {
        Some(index) => schedule::phase_with_index(date, index)?,
        None => schedule::phase_for_date(date),
    };
    info!(
        %date,
        phase = phase.phase_index,
        difficulty = %phase.difficulty,
        reading = phase.reading.source,
        podcast = phase.podcast.name,
        weekday = %phase.weekday_name,
        "Computed learning phase"
    );

    let analyzer = SpanishAnalyzer::new(args.openai_api_key.clone());
    let publisher = if args.skip_publish {
        info!("Publishing disabled for this run (--skip-publish)");
        None
    } else {
        let token = args
            .notion_token
            .clone()
            .ok_or("NOTION_TOKEN is required unless --skip-publish is set")?;
        let database_id = args
            .notion_database_id
            .clone()
            .ok_or("NOTION_DATABASE_ID is required unless --skip-publish is set")?;
        Some(NotionClient::new(token, database_id))
    };

    // --- The two item pipelines, attempted independently ---
    let article_result = run_article(&phase, &analyzer, publisher.as_ref()).await;
    if let Err(e) = &article_result {
        error!(error = %e, "Article pipeline failed");
    }

    let podcast_result = run_podcast(&phase, &analyzer, publisher.as_ref()).await;
    if let Err(e) = &podcast_result {
        error!(error = %e, "Podcast pipeline failed");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        article_ok = article_result.is_ok(),
        podcast_ok = podcast_result.is_ok(),
        "Execution complete"
    );

    if article_result.is_err() || podcast_result.is_err() {
        return Err("run failed: at least one content item did not complete".into());
    }
    Ok(())
}

/// Fetch, analyze, and publish the day's article.
#[instrument(level = "info", skip_all)]
async fn run_article(
    phase: &LearningPhase,
    analyzer: &SpanishAnalyzer,
    publisher: Option<&NotionClient>,
) -> Result<(), Box<dyn Error>> {
    let article = scrapers::fetch_for_phase(phase).await?;
    info!(
        title = %article.title,
        url = %article.url,
        category = %article.category,
        "Fetched article"
    );

    let difficulty = analyzer.analyze_difficulty(&article.raw_text).await?;
    let grammar_points = analyzer
        .analyze_article_grammar(&article.raw_text, difficulty)
        .await?;
    info!(%difficulty, grammar_points = grammar_points.len(), "Analyzed article");

    let memo = memo::article_memo(&article, difficulty, &grammar_points, phase.date);
    let analysis = AnalysisResult {
        difficulty,
        memo,
        topic: None,
    };
    let item = ContentItem::Article(article);

    match publisher {
        Some(publisher) => match publisher.publish(&item, &analysis, phase.date).await? {
            Some(page_url) => info!(%page_url, "Article page created"),
            None => warn!("Article page skipped; a recent duplicate exists"),
        },
        None => info!(memo = %analysis.memo, "Article publish skipped"),
    }
    Ok(())
}

/// Fetch, analyze, and publish the day's podcast episode.
#[instrument(level = "info", skip_all)]
async fn run_podcast(
    phase: &LearningPhase,
    analyzer: &SpanishAnalyzer,
    publisher: Option<&NotionClient>,
) -> Result<(), Box<dyn Error>> {
    let episode = podcasts::fetch_for_phase(phase).await?;
    info!(
        show = %episode.show,
        title = %episode.title,
        duration = %episode.duration,
        topic = %episode.topic,
        "Fetched podcast episode"
    );

    let difficulty = analyzer.analyze_difficulty(&episode.raw_text).await?;
    let expressions = analyzer
        .analyze_podcast_expressions(&episode.raw_text, difficulty)
        .await?;
    info!(%difficulty, expressions = expressions.len(), "Analyzed podcast episode");

    let memo = memo::podcast_memo(&episode, difficulty, &expressions, &phase.weekday_name);
    let analysis = AnalysisResult {
        difficulty,
        memo,
        topic: Some(episode.topic.clone()),
    };
    let item = ContentItem::Podcast(episode);

    match publisher {
        Some(publisher) => match publisher.publish(&item, &analysis, phase.date).await? {
            Some(page_url) => info!(%page_url, "Podcast page created"),
            None => warn!("Podcast page skipped; a recent duplicate exists"),
        },
        None => info!(memo = %analysis.memo, "Podcast publish skipped"),
    }
    Ok(())
}
