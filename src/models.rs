//! Data models passed between the pipeline stages.
//!
//! This module defines the core data structures used throughout the
//! application:
//! - [`Difficulty`]: CEFR proficiency tags with a total ordering
//! - [`ContentItem`]: one fetched article or podcast episode
//! - [`GrammarPoint`]: a single grammar observation extracted by the LLM
//! - [`AnalysisResult`]: the analyzer's output attached 1:1 to a content item
//!
//! Every entity is constructed and consumed within a single run. Nothing is
//! persisted locally; the Notion workspace is the only durable store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A CEFR language-proficiency tag.
///
/// The variants are ordered from easiest to hardest, so the rotation
/// invariant (difficulty never regresses within one cycle) can be checked
/// with plain comparisons. The `+` sub-levels are not part of the rotation
/// table but can come back from the analyzer, which grades real-world text
/// more finely than the schedule does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    A1,
    A2,
    B1,
    B1Plus,
    B2,
    B2Plus,
    C1,
    C2,
}

impl Difficulty {
    /// All tags the analyzer may legally return, sub-levels first so that
    /// scanning a response matches `B2+` before `B2`.
    pub const VALID_TAGS: [(&'static str, Difficulty); 8] = [
        ("B1+", Difficulty::B1Plus),
        ("B2+", Difficulty::B2Plus),
        ("A1", Difficulty::A1),
        ("A2", Difficulty::A2),
        ("B1", Difficulty::B1),
        ("B2", Difficulty::B2),
        ("C1", Difficulty::C1),
        ("C2", Difficulty::C2),
    ];

    /// Scan arbitrary model output for the earliest valid CEFR tag.
    ///
    /// Returns `None` when no tag is present, which the analyzer treats as
    /// an unparseable response.
    pub fn scan(text: &str) -> Option<Difficulty> {
        let upper = text.to_uppercase();
        Self::VALID_TAGS
            .iter()
            .enumerate()
            .filter_map(|(idx, (tag, level))| upper.find(tag).map(|pos| (pos, idx, *level)))
            // Sub-levels come first in VALID_TAGS, so at the same position
            // "B2+" outranks the "B2" it contains.
            .min_by_key(|(pos, idx, _)| (*pos, *idx))
            .map(|(_, _, level)| level)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::A1 => "A1",
            Difficulty::A2 => "A2",
            Difficulty::B1 => "B1",
            Difficulty::B1Plus => "B1+",
            Difficulty::B2 => "B2",
            Difficulty::B2Plus => "B2+",
            Difficulty::C1 => "C1",
            Difficulty::C2 => "C2",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Ok(Difficulty::A1),
            "A2" => Ok(Difficulty::A2),
            "B1" => Ok(Difficulty::B1),
            "B1+" => Ok(Difficulty::B1Plus),
            "B2" => Ok(Difficulty::B2),
            "B2+" => Ok(Difficulty::B2Plus),
            "C1" => Ok(Difficulty::C1),
            "C2" => Ok(Difficulty::C2),
            other => Err(format!("not a CEFR tag: {other}")),
        }
    }
}

/// A news article fetched from one of the reading sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// The article headline.
    pub title: String,
    /// The canonical article URL.
    pub url: String,
    /// Extracted body text, capped at 2000 characters.
    pub raw_text: String,
    /// Category assigned by keyword scoring (e.g. "Politics", "Economy").
    pub category: String,
}

/// A podcast episode selected from the day's feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastEpisode {
    /// The show name from the rotation table (e.g. "Hoy Hablamos").
    pub show: String,
    /// Where the show is produced, from the feed table ("Spain" or
    /// "Latin America").
    pub region: String,
    /// The episode title as published in the feed.
    pub title: String,
    /// The episode page URL from the feed entry.
    pub url: String,
    /// Episode description or show notes, used as analysis input.
    pub raw_text: String,
    /// Playing time, formatted `M:SS` or a human range like "15-25 min".
    pub duration: String,
    /// Alternate Apple Podcasts link for the same episode.
    pub apple_link: String,
    /// Episode number extracted from the title, when present.
    pub episode_number: Option<String>,
    /// Topic derived from Spanish keyword matching.
    pub topic: String,
}

/// One fetched content item, article or podcast episode.
///
/// The two variants carry different metadata: the podcast variant has a
/// duration and an alternate platform link, the article variant a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ContentItem {
    Article(Article),
    Podcast(PodcastEpisode),
}

impl ContentItem {
    pub fn title(&self) -> &str {
        match self {
            ContentItem::Article(a) => &a.title,
            ContentItem::Podcast(p) => &p.title,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            ContentItem::Article(a) => &a.url,
            ContentItem::Podcast(p) => &p.url,
        }
    }
}

/// A single grammar structure the LLM found in an article.
///
/// The analyzer asks for the exact sentence, the structure name, the CEFR
/// level of that structure, and a one-line explanation; a point missing the
/// sentence, structure, or level is rejected as unparseable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarPoint {
    /// The sentence from the text where the structure appears.
    pub sentence: String,
    /// The grammar structure name (e.g. "past subjunctive").
    pub structure: String,
    /// The CEFR level of the structure itself.
    pub level: String,
    /// Optional one-line explanation.
    pub explanation: Option<String>,
}

impl GrammarPoint {
    /// Render the point as one memo segment. Sentences are truncated to
    /// 80 characters to keep the workspace memo scannable.
    pub fn render(&self) -> String {
        let mut sentence = self.sentence.clone();
        if sentence.chars().count() > 80 {
            sentence = sentence.chars().take(80).collect::<String>() + "...";
        }
        let mut out = format!(
            "this sentence uses {} ({}): '{}'",
            self.structure, self.level, sentence
        );
        if let Some(explanation) = &self.explanation {
            out.push_str(&format!(" - {explanation}"));
        }
        out
    }
}

/// The analyzer's verdict on one content item.
///
/// Attached 1:1 to a [`ContentItem`] after the analysis stage. The memo is
/// never empty for a successful analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// The difficulty tag to file the item under.
    pub difficulty: Difficulty,
    /// Human-readable study note stored on the workspace page.
    pub memo: String,
    /// Topic summary, present for podcasts.
    pub topic: Option<String>,
}
