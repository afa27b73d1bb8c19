//! Notion workspace publishing.
//!
//! Creates one page per content item in the study database. The database
//! is user-owned and its property names vary, so the publisher introspects
//! the schema first and maps real property names by Notion type plus name
//! keywords before building the page payload.
//!
//! # Duplicate guard
//!
//! Before creating a page, recent pages (last 7 days) with a similar title
//! are searched; a word-set similarity of 0.9 or higher skips creation.
//! This is a guard, not idempotency: re-running with different titles still
//! creates duplicates, which is acceptable for a once-daily trigger.

use crate::error::PublishError;
use crate::models::{AnalysisResult, ContentItem};
use crate::utils::truncate_for_log;
use chrono::{Duration, NaiveDate, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Titles at least this similar are treated as the same item.
const DUPLICATE_THRESHOLD: f64 = 0.9;

/// Real property names of the target database, resolved from its schema.
#[derive(Debug, Default)]
pub struct PropertyMap {
    pub title: String,
    pub url: Option<String>,
    pub date: Option<String>,
    pub difficulty: Option<String>,
    pub material_type: Option<String>,
    pub area: Option<String>,
    pub region: Option<String>,
    pub memo: Option<String>,
    pub duration: Option<String>,
    pub category: Option<String>,
    /// Allowed option names per select property.
    pub select_options: HashMap<String, Vec<String>>,
}

/// Map a database's `properties` object onto the fields this pipeline fills.
///
/// Property names are matched case-insensitively by keyword within their
/// Notion type, so "Difficulty", "CEFR level" and "Nivel de dificultad" all
/// resolve as the difficulty select. A database without a title property
/// cannot take pages at all.
pub fn map_properties(properties: &Value) -> Result<PropertyMap, PublishError> {
    let mut map = PropertyMap::default();

    let Some(entries) = properties.as_object() else {
        return Err(PublishError::NoTitleProperty);
    };

    for (name, info) in entries {
        let prop_type = info["type"].as_str().unwrap_or_default();
        let lower = name.to_lowercase();

        match prop_type {
            "title" => map.title = name.clone(),
            "url" => map.url = Some(name.clone()),
            "date" => map.date = Some(name.clone()),
            "select" => {
                let options: Vec<String> = info["select"]["options"]
                    .as_array()
                    .map(|opts| {
                        opts.iter()
                            .filter_map(|o| o["name"].as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                map.select_options.insert(name.clone(), options);

                if lower.contains("difficulty") || lower.contains("level") {
                    map.difficulty = Some(name.clone());
                } else if lower.contains("type") || lower.contains("material") {
                    map.material_type = Some(name.clone());
                } else if lower.contains("area") || lower.contains("skill") {
                    map.area = Some(name.clone());
                } else if lower.contains("region") {
                    map.region = Some(name.clone());
                } else if lower.contains("category") || lower.contains("topic") {
                    map.category = Some(name.clone());
                }
            }
            "rich_text" => {
                if lower.contains("memo") || lower.contains("note") || lower.contains("study") {
                    map.memo = Some(name.clone());
                } else if lower.contains("duration") || lower.contains("time") {
                    map.duration = Some(name.clone());
                }
            }
            _ => {}
        }
    }

    if map.title.is_empty() {
        return Err(PublishError::NoTitleProperty);
    }
    Ok(map)
}

/// Pick the first preferred option the database actually offers.
///
/// Falls back to the database's first option, then to the first preference
/// (Notion creates unknown select options on write).
pub fn choose_option(options: &[String], preferences: &[&str]) -> String {
    preferences
        .iter()
        .find(|p| options.iter().any(|o| o == *p))
        .map(|s| s.to_string())
        .or_else(|| options.first().cloned())
        .unwrap_or_else(|| preferences[0].to_string())
}

fn material_preferences(item: &ContentItem) -> &'static [&'static str] {
    match item {
        ContentItem::Podcast(_) => &["Podcast", "Listening"],
        ContentItem::Article(_) => &["Article", "Reading"],
    }
}

fn area_preferences(item: &ContentItem) -> &'static [&'static str] {
    match item {
        ContentItem::Podcast(_) => &["Listening", "Comprehension"],
        ContentItem::Article(_) => &["Reading"],
    }
}

fn region_preferences(item: &ContentItem) -> &'static [&'static str] {
    match item {
        ContentItem::Podcast(p) if p.region == "Latin America" => {
            &["Latin America", "South America"]
        }
        _ => &["Spain", "Europe"],
    }
}

/// Word-set (Jaccard) similarity between two titles.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let words_a: std::collections::HashSet<String> =
        a.to_lowercase().split_whitespace().map(str::to_string).collect();
    let words_b: std::collections::HashSet<String> =
        b.to_lowercase().split_whitespace().map(str::to_string).collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count() as f64;
    let union = words_a.union(&words_b).count() as f64;
    intersection / union
}

/// Pull the plain title text out of a page object.
pub fn extract_page_title(page: &Value) -> Option<String> {
    let properties = page["properties"].as_object()?;
    for value in properties.values() {
        if value["type"].as_str() == Some("title") {
            let fragments = value["title"].as_array()?;
            let first = fragments.first()?;
            return first["plain_text"]
                .as_str()
                .or_else(|| first["text"]["content"].as_str())
                .map(str::to_string);
        }
    }
    None
}

/// Build the `properties` payload for a new page.
pub fn build_properties(
    map: &PropertyMap,
    item: &ContentItem,
    analysis: &AnalysisResult,
    date: NaiveDate,
) -> Value {
    let mut properties = serde_json::Map::new();

    properties.insert(
        map.title.clone(),
        json!({ "title": [{ "text": { "content": item.title() } }] }),
    );

    // Podcasts link out through Apple when an episode link resolved.
    let page_url = match item {
        ContentItem::Podcast(p) if !p.apple_link.is_empty() => p.apple_link.as_str(),
        _ => item.url(),
    };
    if let Some(url_prop) = &map.url {
        if page_url.starts_with("http://") || page_url.starts_with("https://") {
            properties.insert(url_prop.clone(), json!({ "url": page_url }));
        }
    }

    if let Some(type_prop) = &map.material_type {
        let options = map.select_options.get(type_prop).cloned().unwrap_or_default();
        let value = choose_option(&options, material_preferences(item));
        properties.insert(type_prop.clone(), json!({ "select": { "name": value } }));
    }

    if let Some(difficulty_prop) = &map.difficulty {
        let options = map
            .select_options
            .get(difficulty_prop)
            .cloned()
            .unwrap_or_default();
        let tag = analysis.difficulty.to_string();
        let value = choose_option(&options, &[tag.as_str(), "B2", "B1", "C1"]);
        properties.insert(difficulty_prop.clone(), json!({ "select": { "name": value } }));
    }

    if let Some(area_prop) = &map.area {
        let options = map.select_options.get(area_prop).cloned().unwrap_or_default();
        let value = choose_option(&options, area_preferences(item));
        properties.insert(area_prop.clone(), json!({ "select": { "name": value } }));
    }

    if let Some(region_prop) = &map.region {
        let options = map.select_options.get(region_prop).cloned().unwrap_or_default();
        let value = choose_option(&options, region_preferences(item));
        properties.insert(region_prop.clone(), json!({ "select": { "name": value } }));
    }

    if let Some(category_prop) = &map.category {
        let value = match item {
            ContentItem::Article(a) => a.category.clone(),
            ContentItem::Podcast(p) => {
                analysis.topic.clone().unwrap_or_else(|| p.topic.clone())
            }
        };
        properties.insert(category_prop.clone(), json!({ "select": { "name": value } }));
    }

    if let Some(memo_prop) = &map.memo {
        properties.insert(
            memo_prop.clone(),
            json!({ "rich_text": [{ "text": { "content": analysis.memo.as_str() } }] }),
        );
    }

    if let Some(date_prop) = &map.date {
        properties.insert(
            date_prop.clone(),
            json!({ "date": { "start": date.to_string() } }),
        );
    }

    if let (Some(duration_prop), ContentItem::Podcast(p)) = (&map.duration, item) {
        properties.insert(
            duration_prop.clone(),
            json!({ "rich_text": [{ "text": { "content": p.duration.as_str() } }] }),
        );
    }

    Value::Object(properties)
}

/// Client for the Notion REST API.
pub struct NotionClient {
    client: Client,
    token: String,
    database_id: String,
}

impl NotionClient {
    pub fn new(token: String, database_id: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("HTTP client construction cannot fail with static options");
        Self {
            client,
            token,
            database_id,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<Value, PublishError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }
        Ok(response.json::<Value>().await?)
    }

    /// Fetch the database schema and resolve its property names.
    #[instrument(level = "info", skip_all)]
    pub async fn property_map(&self) -> Result<PropertyMap, PublishError> {
        let url = format!("{NOTION_API}/databases/{}", self.database_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await?;
        let body = Self::check_status(response).await?;
        let map = map_properties(&body["properties"])?;
        debug!(?map.title, "Resolved database properties");
        Ok(map)
    }

    /// Does the database already hold a recent page for this title?
    #[instrument(level = "info", skip_all)]
    pub async fn is_duplicate(
        &self,
        map: &PropertyMap,
        title: &str,
    ) -> Result<bool, PublishError> {
        let prefix: String = title.chars().take(50).collect();
        let week_ago = (Utc::now() - Duration::days(7)).to_rfc3339();

        let query = json!({
            "filter": {
                "and": [
                    { "property": map.title.as_str(), "title": { "contains": prefix } },
                    { "timestamp": "created_time", "created_time": { "after": week_ago } }
                ]
            }
        });

        let url = format!("{NOTION_API}/databases/{}/query", self.database_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&query)
            .send()
            .await?;
        let body = Self::check_status(response).await?;

        let results = body["results"].as_array().cloned().unwrap_or_default();
        debug!(count = results.len(), "Duplicate query results");
        for page in &results {
            if let Some(existing) = extract_page_title(page) {
                let similarity = title_similarity(title, &existing);
                if similarity >= DUPLICATE_THRESHOLD {
                    info!(%existing, similarity, "Found an existing page for this title");
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Create one page for a content item, unless a recent duplicate exists.
    ///
    /// Returns the created page URL, or `None` when creation was skipped.
    #[instrument(level = "info", skip_all, fields(title = %item.title()))]
    pub async fn publish(
        &self,
        item: &ContentItem,
        analysis: &AnalysisResult,
        date: NaiveDate,
    ) -> Result<Option<String>, PublishError> {
        let map = self.property_map().await?;

        if self.is_duplicate(&map, item.title()).await? {
            warn!("Skipping page creation for a duplicate title");
            return Ok(None);
        }

        let payload = json!({
            "parent": { "database_id": self.database_id.as_str() },
            "properties": build_properties(&map, item, analysis, date),
        });

        let url = format!("{NOTION_API}/pages");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .await?;
        let body = Self::check_status(response).await?;

        let page_url = body["url"].as_str().unwrap_or_default().to_string();
        info!(%page_url, "Created workspace page");
        Ok(Some(page_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, Difficulty, PodcastEpisode};

    fn fixture_schema() -> Value {
        json!({
            "Name": { "type": "title", "title": {} },
            "Link": { "type": "url", "url": {} },
            "Study date": { "type": "date", "date": {} },
            "Difficulty": {
                "type": "select",
                "select": { "options": [
                    { "name": "B1" }, { "name": "B2" }, { "name": "C1" }
                ]}
            },
            "Material type": {
                "type": "select",
                "select": { "options": [
                    { "name": "Article" }, { "name": "Podcast" }
                ]}
            },
            "Skill area": {
                "type": "select",
                "select": { "options": [
                    { "name": "Reading" }, { "name": "Listening" }
                ]}
            },
            "Region": {
                "type": "select",
                "select": { "options": [
                    { "name": "Spain" }, { "name": "Latin America" }
                ]}
            },
            "Memo": { "type": "rich_text", "rich_text": {} },
            "Play time": { "type": "rich_text", "rich_text": {} }
        })
    }

    fn article_item() -> ContentItem {
        ContentItem::Article(Article {
            title: "El Gobierno aprueba la reforma".to_string(),
            url: "https://elpais.com/noticia.html".to_string(),
            raw_text: "texto".to_string(),
            category: "Politics".to_string(),
        })
    }

    fn podcast_item() -> ContentItem {
        ContentItem::Podcast(PodcastEpisode {
            show: "Radio Ambulante".to_string(),
            region: "Latin America".to_string(),
            title: "El buzo".to_string(),
            url: "https://radioambulante.org/audio/el-buzo".to_string(),
            raw_text: "descripción".to_string(),
            duration: "32:10".to_string(),
            apple_link: "https://podcasts.apple.com/kr/podcast/el-buzo".to_string(),
            episode_number: None,
            topic: "Culture".to_string(),
        })
    }

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            difficulty: Difficulty::B2,
            memo: "memo text".to_string(),
            topic: Some("Culture".to_string()),
        }
    }

    #[test]
    fn test_map_properties() {
        let map = map_properties(&fixture_schema()).unwrap();
        assert_eq!(map.title, "Name");
        assert_eq!(map.url.as_deref(), Some("Link"));
        assert_eq!(map.date.as_deref(), Some("Study date"));
        assert_eq!(map.difficulty.as_deref(), Some("Difficulty"));
        assert_eq!(map.material_type.as_deref(), Some("Material type"));
        assert_eq!(map.area.as_deref(), Some("Skill area"));
        assert_eq!(map.region.as_deref(), Some("Region"));
        assert_eq!(map.memo.as_deref(), Some("Memo"));
        assert_eq!(map.duration.as_deref(), Some("Play time"));
        assert_eq!(
            map.select_options.get("Difficulty").unwrap(),
            &vec!["B1".to_string(), "B2".to_string(), "C1".to_string()]
        );
    }

    #[test]
    fn test_map_properties_requires_title() {
        let schema = json!({ "Memo": { "type": "rich_text", "rich_text": {} } });
        assert!(matches!(
            map_properties(&schema),
            Err(PublishError::NoTitleProperty)
        ));
    }

    #[test]
    fn test_choose_option_prefers_listed_preference() {
        let options = vec!["Reading".to_string(), "Listening".to_string()];
        assert_eq!(choose_option(&options, &["Listening", "Comprehension"]), "Listening");
    }

    #[test]
    fn test_choose_option_falls_back_to_first_option() {
        let options = vec!["Lectura".to_string()];
        assert_eq!(choose_option(&options, &["Reading"]), "Lectura");
    }

    #[test]
    fn test_choose_option_falls_back_to_first_preference() {
        assert_eq!(choose_option(&[], &["Reading"]), "Reading");
    }

    #[test]
    fn test_difficulty_fallback_chain() {
        let options = vec!["B1".to_string(), "B2".to_string()];
        // A C2 analysis lands on B2 when the database has no C2 option.
        assert_eq!(choose_option(&options, &["C2", "B2", "B1", "C1"]), "B2");
    }

    #[test]
    fn test_build_properties_article() {
        let map = map_properties(&fixture_schema()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 7, 14).unwrap();
        let props = build_properties(&map, &article_item(), &analysis(), date);

        assert_eq!(
            props["Name"]["title"][0]["text"]["content"],
            "El Gobierno aprueba la reforma"
        );
        assert_eq!(props["Link"]["url"], "https://elpais.com/noticia.html");
        assert_eq!(props["Material type"]["select"]["name"], "Article");
        assert_eq!(props["Skill area"]["select"]["name"], "Reading");
        assert_eq!(props["Region"]["select"]["name"], "Spain");
        assert_eq!(props["Difficulty"]["select"]["name"], "B2");
        assert_eq!(props["Memo"]["rich_text"][0]["text"]["content"], "memo text");
        assert_eq!(props["Study date"]["date"]["start"], "2025-07-14");
        // Articles have no playing time.
        assert!(props.get("Play time").is_none());
    }

    #[test]
    fn test_build_properties_podcast() {
        let map = map_properties(&fixture_schema()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 7, 15).unwrap();
        let props = build_properties(&map, &podcast_item(), &analysis(), date);

        assert_eq!(props["Material type"]["select"]["name"], "Podcast");
        assert_eq!(props["Skill area"]["select"]["name"], "Listening");
        assert_eq!(props["Region"]["select"]["name"], "Latin America");
        // The Apple link wins over the feed link.
        assert_eq!(
            props["Link"]["url"],
            "https://podcasts.apple.com/kr/podcast/el-buzo"
        );
        assert_eq!(props["Play time"]["rich_text"][0]["text"]["content"], "32:10");
    }

    #[test]
    fn test_title_similarity() {
        assert!(title_similarity("El buzo", "El buzo") >= 1.0);
        assert!(title_similarity("Ep. 1542. El turrón", "Ep. 1542. El turrón de Navidad") > 0.5);
        assert!(title_similarity("El buzo", "La siesta") < 0.2);
        assert_eq!(title_similarity("", "algo"), 0.0);
    }

    #[test]
    fn test_extract_page_title() {
        let page = json!({
            "properties": {
                "Memo": { "type": "rich_text", "rich_text": [] },
                "Name": {
                    "type": "title",
                    "title": [ { "plain_text": "El buzo", "text": { "content": "El buzo" } } ]
                }
            }
        });
        assert_eq!(extract_page_title(&page).as_deref(), Some("El buzo"));
    }

    #[test]
    fn test_extract_page_title_missing() {
        let page = json!({ "properties": {} });
        assert_eq!(extract_page_title(&page), None);
    }
}
