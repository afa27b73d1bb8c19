//! Podcast feed parsing and episode selection.
//!
//! Fetches the day's RSS feed, picks the first eligible episode, and
//! enriches it with everything the workspace page needs: episode number,
//! playing time, topic, and an Apple Podcasts link resolved through the
//! iTunes Search API.
//!
//! # Eligibility
//!
//! The curated feeds publish daily-to-weekly, so freshness is not enforced;
//! an entry is eligible when it has a title, a description, and reads as
//! Spanish. If the scheduled feed is unreachable or yields nothing, the
//! static alternates are tried before the run fails.

use crate::error::FetchError;
use crate::models::PodcastEpisode;
use crate::schedule::{LearningPhase, PodcastFeed};
use crate::scrapers;
use crate::utils::{cap_chars, looks_spanish, normalize_duration, slugify_title};
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

/// Episode descriptions are capped at this many characters before analysis.
const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Feeds tried when the scheduled one is unreachable or empty.
///
/// Only feeds that are known to stay up belong here.
static ALTERNATE_FEEDS: [PodcastFeed; 2] = [
    PodcastFeed {
        name: "SpanishPodcast",
        rss: "https://feeds.feedburner.com/SpanishPodcast",
        apple_base: "https://podcasts.apple.com/us/podcast/spanishpodcast/id70077665",
        region: "Spain",
        backup_url: "https://www.spanishpodcast.org/",
    },
    PodcastFeed {
        name: "Hoy Hablamos",
        rss: "https://www.hoyhablamos.com/feed/podcast/",
        apple_base: "https://podcasts.apple.com/es/podcast/hoy-hablamos/id1455031513",
        region: "Spain",
        backup_url: "https://www.hoyhablamos.com/",
    },
];

/// One `<item>` from an RSS feed, fields as published.
#[derive(Debug, Default, Clone)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub itunes_duration: Option<String>,
    pub pub_date: Option<String>,
}

/// Parse an RSS document into its items.
///
/// A pull parse over `quick-xml` events: field elements are captured only
/// while inside an `<item>`, so the channel's own title and description
/// are ignored. Returns the reason string on malformed XML.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<Vec<u8>> = None;

    loop {
        match reader.read_event() {
            Err(e) => return Err(e.to_string()),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if name == b"item" {
                    current = Some(FeedItem::default());
                } else if current.is_some() {
                    field = Some(name);
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(item), Some(field)) = (current.as_mut(), field.as_ref()) {
                    let decoded = t.decode().map_err(|e| e.to_string())?;
                    let text = quick_xml::escape::unescape(&decoded)
                        .map_err(|e| e.to_string())?
                        .into_owned();
                    assign_field(item, field, &text);
                }
            }
            Ok(Event::CData(t)) => {
                if let (Some(item), Some(field)) = (current.as_mut(), field.as_ref()) {
                    let text = String::from_utf8_lossy(&t).into_owned();
                    assign_field(item, field, &text);
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                } else {
                    field = None;
                }
            }
            Ok(_) => {}
        }
    }

    Ok(items)
}

fn assign_field(item: &mut FeedItem, field: &[u8], text: &str) {
    match field {
        b"title" => push_text(&mut item.title, text),
        b"link" => push_text(&mut item.link, text),
        b"description" | b"content:encoded" | b"itunes:summary" => {
            // Keep the first non-empty description variant.
            if item.description.is_empty() {
                push_text(&mut item.description, text);
            }
        }
        b"itunes:duration" => item.itunes_duration = Some(text.trim().to_string()),
        b"pubDate" => item.pub_date = Some(text.trim().to_string()),
        _ => {}
    }
}

fn push_text(target: &mut String, text: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text.trim());
}

/// Episode-number patterns tried in order against the title.
static EPISODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Ep\.?\s*(\d+)",
        r"(?i)Episode\s*(\d+)",
        r"#(\d+)",
        r"(\d{3,4})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Extract an episode number from a title, if one is present.
pub fn extract_episode_number(title: &str) -> Option<String> {
    EPISODE_PATTERNS
        .iter()
        .find_map(|re| re.captures(title))
        .map(|caps| caps[1].to_string())
}

static DESCRIPTION_MINUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*min").expect("valid regex"));
static DESCRIPTION_CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+):(\d{2})").expect("valid regex"));

/// Derive a playing time for an episode.
///
/// Prefers `itunes:duration` (seconds normalized to `M:SS`), then duration
/// patterns in the description, then the default study range.
pub fn extract_duration(item: &FeedItem) -> String {
    if let Some(raw) = &item.itunes_duration {
        let normalized = normalize_duration(raw);
        if !normalized.is_empty() {
            return normalized;
        }
    }
    if let Some(caps) = DESCRIPTION_CLOCK.captures(&item.description) {
        return format!("{}:{}", &caps[1], &caps[2]);
    }
    if let Some(caps) = DESCRIPTION_MINUTES.captures(&item.description) {
        return format!("{} min", &caps[1]);
    }
    "15-25 min".to_string()
}

/// Topics with their Spanish keyword lists; first hit wins.
static TOPIC_KEYWORDS: [(&str, &[&str]); 12] = [
    ("Grammar", &["gramática", "verbos", "subjuntivo", "pretérito", "sintaxis"]),
    ("Culture", &["cultura", "tradición", "costumbres", "historia", "arte"]),
    ("Food", &["cocina", "comida", "receta", "gastronomía", "plato"]),
    ("Travel", &["viajes", "turismo", "ciudades", "lugares", "destinos"]),
    ("Work", &["trabajo", "empleo", "profesión", "carrera", "oficina"]),
    ("Family", &["familia", "padres", "hijos", "matrimonio", "casa"]),
    ("Technology", &["tecnología", "internet", "móviles", "digital", "aplicaciones"]),
    ("Politics", &["política", "gobierno", "elecciones", "democracia"]),
    ("Economy", &["economía", "dinero", "banco", "crisis", "preferentes", "ahorros"]),
    ("Society", &["sociedad", "gente", "problemas", "cambios", "vida"]),
    ("Health", &["salud", "medicina", "hospital", "enfermedad", "médico"]),
    ("Education", &["educación", "estudiantes", "universidad", "aprender"]),
];

/// Derive a topic from episode title and description keywords.
pub fn extract_topic(title: &str, summary: &str) -> String {
    let content = format!("{} {}", title, summary).to_lowercase();
    TOPIC_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| content.contains(*w)))
        .map(|(topic, _)| topic.to_string())
        .unwrap_or_else(|| "General".to_string())
}

fn is_eligible(item: &FeedItem) -> bool {
    !item.title.is_empty()
        && !item.description.is_empty()
        && looks_spanish(&format!("{} {}", item.title, item.description))
}

/// Words too generic to count when matching episode titles.
const STOPWORDS: [&str; 9] = [
    "the", "and", "of", "in", "to", "for", "with", "episode", "ep",
];

fn important_words(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 3 && !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// Does an iTunes collection name plausibly belong to this show?
pub fn collection_matches(show: &str, collection: &str) -> bool {
    let collection = collection.to_lowercase();
    let compact_show = show.to_lowercase().replace(' ', "");
    if collection.replace(' ', "").contains(&compact_show) {
        return true;
    }
    show.split_whitespace()
        .filter(|w| w.len() > 3)
        .any(|w| collection.contains(&w.to_lowercase()))
}

/// Does an iTunes track name plausibly name this episode?
pub fn title_matches(episode_title: &str, track_name: &str) -> bool {
    let track = track_name.to_lowercase();
    let title_words: Vec<String> = episode_title
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();

    let common = title_words
        .iter()
        .filter(|w| track.split_whitespace().any(|t| t == w.as_str()))
        .count();
    if common >= 2 {
        return true;
    }
    if title_words.iter().any(|w| w.len() > 4 && track.contains(w.as_str())) {
        return true;
    }

    let important = important_words(episode_title);
    if important.is_empty() {
        return false;
    }
    let matches = important.iter().filter(|w| track.contains(w.as_str())).count();
    matches >= important.len().min(2)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default)]
    collection_name: String,
    #[serde(default)]
    track_name: String,
    #[serde(default)]
    track_view_url: String,
}

/// Resolve an exact Apple Podcasts episode link via the iTunes Search API.
///
/// Tries the show+title query first, then the bare title. Failures here are
/// never fatal: the feed's show-level Apple link is a fine fallback.
#[instrument(level = "info", skip_all, fields(show = %feed.name))]
pub async fn search_apple_episode(feed: &PodcastFeed, episode_title: &str) -> String {
    let terms = [
        format!("{} {}", feed.name, episode_title),
        episode_title.to_string(),
    ];

    for term in &terms {
        let search_url = format!(
            "https://itunes.apple.com/search?term={}&media=podcast&entity=podcastEpisode&limit=50",
            urlencoding::encode(term)
        );
        debug!(%search_url, "Querying iTunes Search API");

        let response = match scrapers::HTTP.get(&search_url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, term = %term, "iTunes search request failed");
                continue;
            }
        };
        let parsed = match response.json::<SearchResponse>().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, term = %term, "iTunes search response was not JSON");
                continue;
            }
        };

        debug!(count = parsed.results.len(), term = %term, "iTunes search results");
        for result in &parsed.results {
            if collection_matches(feed.name, &result.collection_name)
                && title_matches(episode_title, &result.track_name)
                && !result.track_view_url.is_empty()
            {
                info!(url = %result.track_view_url, "Resolved Apple Podcasts episode link");
                return result.track_view_url.clone();
            }
        }
    }

    debug!("No exact episode match; using the show-level Apple link");
    feed.apple_base.to_string()
}

/// Candidate Radio Ambulante episode page for a title.
///
/// Radio Ambulante's feed links point at NPR; the show's own site hosts a
/// transcript at `radioambulante.org/audio/<slug>`, which is the better
/// study link when it exists.
pub fn radio_ambulante_url(episode_title: &str) -> String {
    format!("https://radioambulante.org/audio/{}", slugify_title(episode_title))
}

/// Quick reachability probe used before preferring a derived link.
pub async fn validate_url(url: &str) -> bool {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return false;
    }
    match scrapers::HTTP.head(url).send().await {
        Ok(response) => response.status().as_u16() < 400,
        Err(_) => false,
    }
}

/// Fetch the day's podcast episode for a learning phase.
///
/// The scheduled feed is tried first; on failure every alternate feed with
/// a different show name is tried in order. The scheduled feed's error is
/// surfaced when nothing yields an eligible episode.
#[instrument(level = "info", skip_all, fields(feed = %phase.podcast.name))]
pub async fn fetch_for_phase(phase: &LearningPhase) -> Result<PodcastEpisode, FetchError> {
    match fetch_episode(phase.podcast).await {
        Ok(episode) => Ok(episode),
        Err(primary_err) => {
            warn!(error = %primary_err, feed = phase.podcast.rss, "Scheduled feed failed; trying alternates");
            for alternate in ALTERNATE_FEEDS.iter().filter(|f| f.name != phase.podcast.name) {
                match fetch_episode(alternate).await {
                    Ok(episode) => {
                        info!(feed = alternate.name, "Alternate feed supplied the episode");
                        return Ok(episode);
                    }
                    Err(e) => warn!(error = %e, feed = alternate.rss, "Alternate feed failed"),
                }
            }
            Err(primary_err)
        }
    }
}

/// Fetch one feed and select its first eligible episode.
#[instrument(level = "info", skip_all, fields(feed = %feed.name))]
async fn fetch_episode(feed: &'static PodcastFeed) -> Result<PodcastEpisode, FetchError> {
    let xml = scrapers::get_text(feed.rss).await?;
    let items = parse_feed(&xml).map_err(|reason| FetchError::MalformedFeed {
        url: feed.rss.to_string(),
        reason,
    })?;
    info!(count = items.len(), "Parsed feed entries");

    let item = items
        .into_iter()
        .find(is_eligible)
        .ok_or_else(|| FetchError::NoEligibleEntry {
            source: feed.rss.to_string(),
        })?;

    let episode_number = extract_episode_number(&item.title);
    let duration = extract_duration(&item);
    let topic = extract_topic(&item.title, &item.description);

    let mut url = if item.link.is_empty() {
        feed.backup_url.to_string()
    } else {
        item.link.clone()
    };
    if feed.name == "Radio Ambulante" {
        let candidate = radio_ambulante_url(&item.title);
        if validate_url(&candidate).await {
            debug!(%candidate, "Using Radio Ambulante website link");
            url = candidate;
        }
    }

    let apple_link = search_apple_episode(feed, &item.title).await;

    info!(
        title = %item.title,
        %duration,
        topic = %topic,
        episode = episode_number.as_deref().unwrap_or("-"),
        published = item.pub_date.as_deref().unwrap_or("-"),
        "Selected podcast episode"
    );

    Ok(PodcastEpisode {
        show: feed.name.to_string(),
        region: feed.region.to_string(),
        title: item.title,
        url,
        raw_text: cap_chars(&item.description, MAX_DESCRIPTION_CHARS),
        duration,
        apple_link,
        episode_number,
        topic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Hoy Hablamos</title>
    <link>https://www.hoyhablamos.com/</link>
    <description>Podcast diario para aprender español</description>
    <item>
      <title>Ep. 1542. El turrón de Navidad</title>
      <link>https://www.hoyhablamos.com/podcast/1542</link>
      <description><![CDATA[Hoy hablamos de la historia del turrón y de las costumbres navideñas en España.]]></description>
      <itunes:duration>1560</itunes:duration>
      <pubDate>Mon, 15 Dec 2025 06:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Ep. 1541. La siesta</title>
      <link>https://www.hoyhablamos.com/podcast/1541</link>
      <description>Un episodio sobre la siesta y la vida diaria.</description>
      <itunes:duration>18:04</itunes:duration>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_extracts_items() {
        let items = parse_feed(FEED).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Ep. 1542. El turrón de Navidad");
        assert_eq!(items[0].link, "https://www.hoyhablamos.com/podcast/1542");
        assert!(items[0].description.contains("historia del turrón"));
        assert_eq!(items[0].itunes_duration.as_deref(), Some("1560"));
        assert!(items[0].pub_date.as_deref().unwrap().contains("Dec 2025"));
    }

    #[test]
    fn test_parse_feed_ignores_channel_fields() {
        let items = parse_feed(FEED).unwrap();
        // The channel description must not leak into the first item.
        assert!(!items[0].description.contains("Podcast diario"));
    }

    #[test]
    fn test_parse_feed_malformed() {
        // Mismatched end tag.
        assert!(parse_feed("<rss><channel><item><title>x</wrong></item></channel></rss>").is_err());
    }

    #[test]
    fn test_extract_episode_number() {
        assert_eq!(
            extract_episode_number("Ep. 1542. El turrón").as_deref(),
            Some("1542")
        );
        assert_eq!(
            extract_episode_number("Episode 87: subjuntivo").as_deref(),
            Some("87")
        );
        assert_eq!(extract_episode_number("#204 La siesta").as_deref(), Some("204"));
        assert_eq!(extract_episode_number("Especial 2024").as_deref(), Some("2024"));
        assert_eq!(extract_episode_number("Sin número"), None);
    }

    #[test]
    fn test_extract_duration_prefers_itunes_seconds() {
        let items = parse_feed(FEED).unwrap();
        assert_eq!(extract_duration(&items[0]), "26:00");
        assert_eq!(extract_duration(&items[1]), "18:04");
    }

    #[test]
    fn test_extract_duration_from_description() {
        let item = FeedItem {
            description: "Un episodio de 23 min sobre historia.".to_string(),
            ..FeedItem::default()
        };
        assert_eq!(extract_duration(&item), "23 min");
    }

    #[test]
    fn test_extract_duration_default() {
        assert_eq!(extract_duration(&FeedItem::default()), "15-25 min");
    }

    #[test]
    fn test_extract_topic() {
        assert_eq!(extract_topic("El subjuntivo", "hoy, gramática"), "Grammar");
        assert_eq!(extract_topic("La crisis", "la economía y el dinero"), "Economy");
        assert_eq!(extract_topic("Sin tema", "nada"), "General");
    }

    #[test]
    fn test_eligibility_requires_spanish_and_description() {
        let items = parse_feed(FEED).unwrap();
        assert!(is_eligible(&items[0]));

        let english = FeedItem {
            title: "The Daily".to_string(),
            description: "This is the news that was reported this week and what it means."
                .to_string(),
            ..FeedItem::default()
        };
        assert!(!is_eligible(&english));

        let empty = FeedItem {
            title: "Ep. 9".to_string(),
            ..FeedItem::default()
        };
        assert!(!is_eligible(&empty));
    }

    #[test]
    fn test_collection_matches() {
        assert!(collection_matches(
            "Hoy Hablamos",
            "Hoy Hablamos: Podcast diario para aprender español"
        ));
        assert!(collection_matches("Radio Ambulante", "radio ambulante"));
        assert!(!collection_matches("Hoy Hablamos", "The Daily"));
    }

    #[test]
    fn test_title_matches_common_words() {
        assert!(title_matches(
            "El turrón de Navidad",
            "Ep 1542 - El turrón de Navidad"
        ));
        assert!(!title_matches("El turrón de Navidad", "Un episodio cualquiera"));
    }

    #[test]
    fn test_radio_ambulante_url() {
        assert_eq!(
            radio_ambulante_url("El buzo"),
            "https://radioambulante.org/audio/el-buzo"
        );
    }
}
