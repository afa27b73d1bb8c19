//! Memo composition for workspace records.
//!
//! The memo is the study note stored on each Notion page: one long line of
//! emoji-marked fields the learner scans before reading or listening. The
//! markers are part of the record format, so composition is deterministic
//! and every successful analysis yields a non-empty memo.

use crate::models::{Article, Difficulty, GrammarPoint, PodcastEpisode};
use chrono::NaiveDate;

/// Compose the memo for an article record.
pub fn article_memo(
    article: &Article,
    difficulty: Difficulty,
    grammar_points: &[GrammarPoint],
    date: NaiveDate,
) -> String {
    let grammar_text = if grammar_points.is_empty() {
        String::new()
    } else {
        let joined = grammar_points
            .iter()
            .map(|p| p.render())
            .collect::<Vec<_>>()
            .join(" | ");
        format!("📝 {difficulty} grammar: {joined} ")
    };

    format!(
        "📰 {category} article ({difficulty} level) \
📅 Published: {date} \
🎯 Goal: 15 minutes of reading, {difficulty}-level grammar analysis \
{grammar_text}\
🤖 AI analysis \
📖 Recommended: build reading skill through grammar structure analysis",
        category = article.category,
    )
}

/// Study goal for a podcast topic.
fn listening_goal(topic: &str) -> &'static str {
    match topic {
        "Economy" => "financial expressions",
        "Politics" => "political expressions",
        "Culture" => "cultural expressions",
        "Society" => "social issue expressions",
        "Education" => "education expressions",
        "Health" => "medical expressions",
        "Technology" => "tech expressions",
        "Grammar" => "grammar structures",
        _ => "everyday expressions",
    }
}

/// Listening plan derived from the parsed duration.
///
/// Clock durations over 30 minutes get a capped target; anything
/// unparseable falls back to the default 25-minute target.
fn listening_plan(duration: &str) -> String {
    if let Some((minutes, _)) = duration.split_once(':') {
        if let Ok(total_minutes) = minutes.trim().parse::<u32>() {
            if total_minutes > 30 {
                return "(30 min listening target)".to_string();
            }
            return format!("(full {duration} listen)");
        }
    }
    "(25 min listening target)".to_string()
}

/// Compose the memo for a podcast record.
pub fn podcast_memo(
    episode: &PodcastEpisode,
    difficulty: Difficulty,
    expressions: &[String],
    weekday_name: &str,
) -> String {
    let episode_text = episode
        .episode_number
        .as_deref()
        .map(|n| format!("Ep.{n} - "))
        .unwrap_or_default();

    let goal = listening_goal(&episode.topic);
    let plan = listening_plan(&episode.duration);

    let (expression_text, strategy) = if expressions.is_empty() {
        (
            format!("🎯 {difficulty} colloquial: 0 found in analysis "),
            "📻 Recommended: focus on topic vocabulary and logical structure while listening",
        )
    } else {
        (
            format!("🎯 {difficulty} colloquial: {} ", expressions.join(" | ")),
            "📻 Recommended: focus on the colloquial expressions while listening",
        )
    };

    let short_title: String = if episode.title.chars().count() > 50 {
        episode.title.chars().take(50).collect::<String>() + "..."
    } else {
        episode.title.clone()
    };
    let search_info = format!("🔍 Search: \"{short_title}\" ");

    let mut url_info = String::new();
    if episode.show == "Radio Ambulante" {
        if episode.url.contains("radioambulante.org") {
            url_info.push_str("🌐 Listen directly on the website ");
        } else if episode.url.contains("npr.org") {
            url_info.push_str("📻 Available on NPR ");
        }
        // The Apple Podcasts app finds Radio Ambulante episodes faster by
        // subtitle when the title carries one.
        match episode.title.split_once(':') {
            Some((main, subtitle)) => url_info.push_str(&format!(
                "🍎 Apple Podcasts search: \"{}\" or \"{}\" ",
                main.trim(),
                subtitle.trim()
            )),
            None => url_info.push_str(&format!(
                "🍎 Apple Podcasts search: \"{}\" ",
                episode.title
            )),
        }
    }

    format!(
        "🎧 {show} {episode_text}{weekday_name} Spanish podcast \
📺 Episode: \"{title}\" \
⏱️ Duration: {duration} {plan} \
🎯 Goal: collect 5 {goal} \
🌍 Topic: {topic} \
{expression_text}\
🤖 AI analysis \
{search_info}\
{url_info}\
{strategy}",
        show = episode.show,
        title = episode.title,
        duration = episode.duration,
        topic = episode.topic,
    )
}
