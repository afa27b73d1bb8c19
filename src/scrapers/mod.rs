//! Article scrapers for the Spanish reading sources.
//!
//! This module contains submodules for scraping the reading sources named
//! by the rotation table. Each scraper follows a consistent two-phase
//! pattern:
//!
//! 1. **Indexing**: Discover candidate article URLs from the section front page
//! 2. **Fetching**: Download one candidate and extract its body text
//!
//! # Supported Sources
//!
//! | Source | Module | Notes |
//! |--------|--------|-------|
//! | 20minutos | [`veinte_minutos`] | front page, `article-text` body |
//! | El País | [`el_pais`] | front page or Opinión section |
//!
//! Candidates are deduplicated, the leading block is shuffled so repeated
//! runs don't keep landing on the same headline, and the first candidate
//! with a usable body (≥ 200 characters) wins. A source with no usable
//! candidate fails the run with [`FetchError::NoEligibleEntry`].

use crate::error::FetchError;
use crate::models::Article;
use crate::schedule::LearningPhase;
use crate::utils::cap_chars;
use once_cell::sync::Lazy;
use rand::rng;
use rand::seq::SliceRandom;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

pub mod el_pais;
pub mod veinte_minutos;

/// Body text shorter than this is treated as an extraction failure.
pub const MIN_BODY_CHARS: usize = 200;

/// Extracted body is capped at this many characters before analysis.
pub const MAX_BODY_CHARS: usize = 2000;

/// How many leading candidates take part in the random pick.
const SHUFFLE_WINDOW: usize = 8;

/// Shared HTTP client for scraping and feed fetching.
///
/// News sites reject the default reqwest user agent, so a browser UA is
/// sent, matching what the sources serve to readers.
pub static HTTP: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .timeout(Duration::from_secs(10))
        .build()
        .expect("HTTP client construction cannot fail with static options")
});

/// Fetch a URL and return its body text, mapping failures to [`FetchError`].
pub async fn get_text(url: &str) -> Result<String, FetchError> {
    let response = HTTP.get(url).send().await.map_err(|e| FetchError::Request {
        url: url.to_string(),
        source: e,
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.text().await.map_err(|e| FetchError::Request {
        url: url.to_string(),
        source: e,
    })
}

/// Fetch the day's article for a learning phase.
///
/// Dispatches on the phase's reading source. The returned article already
/// carries its keyword category.
pub async fn fetch_for_phase(phase: &LearningPhase) -> Result<Article, FetchError> {
    info!(source = phase.reading.source, url = phase.reading.url, "Selecting article");
    match phase.reading.source {
        "20minutos" => veinte_minutos::pick_article().await,
        _ => el_pais::pick_article(phase.reading.url).await,
    }
}

/// Shuffle the first [`SHUFFLE_WINDOW`] candidates in place.
///
/// The front page's top stories are interchangeable for study purposes;
/// randomizing the pick keeps consecutive runs from filing the same
/// headline twice while still preferring fresh articles.
pub fn shuffle_leading(urls: &mut [String]) {
    let window = urls.len().min(SHUFFLE_WINDOW);
    urls[..window].shuffle(&mut rng());
}

/// Extract the headline from a parsed article page.
pub fn extract_title(document: &Html) -> Option<String> {
    let h1 = Selector::parse("h1").unwrap();
    document.select(&h1).next().map(|el| {
        el.text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    })
}

/// Generic body extraction fallback shared by all sources.
///
/// Tries `<article>`/`<main>` paragraphs first, then any paragraph longer
/// than 50 characters (first 8). Returns text capped at
/// [`MAX_BODY_CHARS`].
pub fn extract_body_fallback(document: &Html) -> String {
    let container = Selector::parse("article p, main p").unwrap();
    let paragraphs: Vec<String> = document
        .select(&container)
        .map(|p| p.text().collect::<Vec<_>>().join(" ").trim().to_string())
        .filter(|t| !t.is_empty())
        .take(10)
        .collect();
    let mut content = paragraphs.join(" ");

    if content.chars().count() < MIN_BODY_CHARS {
        let any_p = Selector::parse("p").unwrap();
        let long_paragraphs: Vec<String> = document
            .select(&any_p)
            .map(|p| p.text().collect::<Vec<_>>().join(" ").trim().to_string())
            .filter(|t| t.chars().count() > 50)
            .take(8)
            .collect();
        content = long_paragraphs.join(" ");
    }

    cap_chars(&content, MAX_BODY_CHARS)
}

/// Fixed article categories with their Spanish keyword lists.
///
/// The category with the highest keyword score wins; no hit at all means
/// "General".
static CATEGORY_KEYWORDS: [(&str, &[&str]); 7] = [
    (
        "Politics",
        &[
            "gobierno", "política", "elecciones", "parlamento", "ministro", "rey",
            "presidente", "votación", "congreso",
        ],
    ),
    (
        "Economy",
        &[
            "economía", "banco", "euro", "empleo", "crisis", "mercado", "dinero",
            "trabajo", "empresa", "inversión",
        ],
    ),
    (
        "Society",
        &[
            "sociedad", "educación", "sanidad", "vivienda", "familia", "salud",
            "población", "ciudadanos",
        ],
    ),
    (
        "Sports",
        &[
            "fútbol", "real madrid", "barcelona", "liga", "deporte", "partido",
            "atletico", "champions",
        ],
    ),
    (
        "Technology",
        &[
            "tecnología", "internet", "móvil", "digital", "app", "inteligencia",
            "innovación",
        ],
    ),
    (
        "Culture",
        &[
            "cultura", "arte", "música", "teatro", "festival", "libro", "cine",
            "exposición",
        ],
    ),
    (
        "International",
        &[
            "internacional", "mundial", "europa", "américa", "china",
            "estados unidos", "unión europea",
        ],
    ),
];

/// Assign a category from title and body keywords.
pub fn categorize(title: &str, body: &str) -> String {
    let full_text = format!("{} {}", title, body).to_lowercase();

    let best = CATEGORY_KEYWORDS
        .iter()
        .map(|(category, words)| {
            let score = words.iter().filter(|w| full_text.contains(*w)).count();
            (*category, score)
        })
        .filter(|(_, score)| *score > 0)
        .max_by_key(|(_, score)| *score);

    match best {
        Some((category, score)) => {
            debug!(category, score, "Categorized article");
            category.to_string()
        }
        None => "General".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_politics() {
        let category = categorize(
            "El Gobierno supera la votación en el Congreso",
            "El presidente defendió la política del ejecutivo ante el parlamento.",
        );
        assert_eq!(category, "Politics");
    }

    #[test]
    fn test_categorize_sports() {
        let category = categorize(
            "El Real Madrid gana la liga",
            "El partido de fútbol terminó con victoria en el último minuto.",
        );
        assert_eq!(category, "Sports");
    }

    #[test]
    fn test_categorize_no_match_is_general() {
        assert_eq!(categorize("Sin palabras clave", "nada relevante aquí"), "General");
    }

    #[test]
    fn test_extract_title_collapses_whitespace() {
        let html = Html::parse_document(
            "<html><body><h1>  Una   noticia\n  importante </h1></body></html>",
        );
        assert_eq!(
            extract_title(&html).as_deref(),
            Some("Una noticia importante")
        );
    }

    #[test]
    fn test_extract_body_fallback_prefers_article_paragraphs() {
        let body_paragraph = "Lorem ipsum en español con bastante texto para superar el umbral. "
            .repeat(4);
        let html = Html::parse_document(&format!(
            "<html><body><article><p>{body_paragraph}</p></article><p>menu</p></body></html>"
        ));
        let body = extract_body_fallback(&html);
        assert!(body.contains("Lorem ipsum en español"));
        assert!(!body.contains("menu"));
    }

    #[test]
    fn test_extract_body_fallback_uses_long_paragraphs_when_no_article() {
        let long = "Texto suficientemente largo para contar como párrafo de noticia de verdad. "
            .repeat(4);
        let html = Html::parse_document(&format!(
            "<html><body><div><p>{long}</p><p>nav</p></div></body></html>"
        ));
        let body = extract_body_fallback(&html);
        assert!(body.contains("Texto suficientemente largo"));
        assert!(!body.contains("nav"));
    }

    #[test]
    fn test_shuffle_leading_keeps_all_candidates() {
        let mut urls: Vec<String> = (0..20).map(|i| format!("https://x.es/{i}")).collect();
        let before = urls.clone();
        shuffle_leading(&mut urls);
        assert_eq!(urls.len(), before.len());
        // The tail beyond the shuffle window is untouched.
        assert_eq!(&urls[8..], &before[8..]);
        let mut sorted = urls.clone();
        sorted.sort();
        let mut expected = before.clone();
        expected.sort();
        assert_eq!(sorted, expected);
    }
}
