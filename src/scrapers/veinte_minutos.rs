//! 20minutos article scraper.
//!
//! [20minutos](https://www.20minutos.es) is a Spanish free daily with a
//! straightforward front page; article pages keep their body under a
//! `article-text` container, which makes extraction reliable without
//! rendering. The rotation uses it for the first (B2) reading phase.

use crate::error::FetchError;
use crate::models::Article;
use crate::scrapers::{self, MIN_BODY_CHARS};
use crate::utils::cap_chars;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use scraper::{Html, Selector};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const FRONT_PAGE: &str = "https://www.20minutos.es/";

/// Index the 20minutos front page and extract candidate article URLs.
///
/// Extracts all anchors under `<article>` elements and keeps the ones that
/// point at `/noticia/` pages, resolved to absolute URLs and deduplicated
/// in order of appearance.
#[instrument(level = "info")]
pub async fn index_articles() -> Result<Vec<String>, FetchError> {
    let base_url = Url::parse(FRONT_PAGE).expect("front page constant is a valid URL");
    let html = scrapers::get_text(FRONT_PAGE).await?;
    let document = Html::parse_document(&html);
    let story_selector = Selector::parse("article a[href]").unwrap();

    let article_urls: Vec<String> = document
        .select(&story_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| base_url.join(href).ok())
        .map(|resolved| resolved.to_string())
        .filter(|u| u.contains("/noticia/"))
        .unique()
        .collect();

    info!(
        count = article_urls.len(),
        source = FRONT_PAGE,
        "Indexed 20minutos article URLs"
    );
    debug!(urls = ?article_urls, "20minutos URLs");

    Ok(article_urls)
}

/// Pick one article with a usable body from the front page.
///
/// Candidates are walked sequentially (after the leading block is
/// shuffled); the first one whose extracted body clears the minimum length
/// wins. Failed fetches are logged and skipped without failing the walk.
#[instrument(level = "info")]
pub async fn pick_article() -> Result<Article, FetchError> {
    let mut urls = index_articles().await?;
    if urls.is_empty() {
        return Err(FetchError::NoEligibleEntry {
            source: FRONT_PAGE.to_string(),
        });
    }
    scrapers::shuffle_leading(&mut urls);

    let article = stream::iter(urls)
        .then(|url| async move {
            match fetch_article(&url).await {
                Ok(Some(article)) => {
                    debug!(%url, "Fetched 20minutos article");
                    Some(article)
                }
                Ok(None) => {
                    warn!(%url, "20minutos fetch produced no usable body");
                    None
                }
                Err(e) => {
                    error!(error = %e, %url, "20minutos fetch failed");
                    None
                }
            }
        })
        .filter_map(std::future::ready)
        .boxed_local()
        .next()
        .await;

    article.ok_or_else(|| FetchError::NoEligibleEntry {
        source: FRONT_PAGE.to_string(),
    })
}

/// Fetch a single 20minutos article.
///
/// Returns `Ok(None)` when the page parses but yields no title or too
/// little body text.
#[instrument(level = "info", skip_all, fields(%url))]
async fn fetch_article(url: &str) -> Result<Option<Article>, FetchError> {
    let body = scrapers::get_text(url).await?;
    let document = Html::parse_document(&body);

    let Some(title) = scrapers::extract_title(&document) else {
        return Ok(None);
    };

    let body_selector = Selector::parse("div.article-text p, div.content p").unwrap();
    let paragraphs: Vec<String> = document
        .select(&body_selector)
        .map(|p| p.text().collect::<Vec<_>>().join(" ").trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    let mut content = paragraphs.join(" ");

    if content.chars().count() < MIN_BODY_CHARS {
        content = scrapers::extract_body_fallback(&document);
    }
    if content.chars().count() < MIN_BODY_CHARS {
        return Ok(None);
    }

    let content = cap_chars(&content, scrapers::MAX_BODY_CHARS);
    info!(bytes = content.len(), "Parsed 20minutos article");
    let category = scrapers::categorize(&title, &content);
    Ok(Some(Article {
        title,
        url: url.to_string(),
        raw_text: content,
        category,
    }))
}
