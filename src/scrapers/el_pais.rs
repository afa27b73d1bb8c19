//! El País article scraper.
//!
//! Covers the later rotation phases: the general front page (B2) and the
//! Opinión section (C1). Both share the same article markup, so one module
//! handles either section URL.
//!
//! # Body markup
//!
//! El País tags the article body container with
//! `data-dtm-region="articulo_cuerpo"`; older pages use the `a_c` class.
//! Both are tried before the generic fallback.

use crate::error::FetchError;
use crate::models::Article;
use crate::scrapers::{self, MIN_BODY_CHARS};
use crate::utils::cap_chars;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use scraper::{Html, Selector};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Index an El País section page and extract candidate article URLs.
///
/// El País marks headlines with anchors inside `<article>` headers.
/// Only same-host links to `.html` article pages are kept.
#[instrument(level = "info", skip_all, fields(%section_url))]
pub async fn index_articles(section_url: &str) -> Result<Vec<String>, FetchError> {
    let base_url = Url::parse(section_url).map_err(|e| FetchError::MalformedFeed {
        url: section_url.to_string(),
        reason: e.to_string(),
    })?;
    let html = scrapers::get_text(section_url).await?;
    let document = Html::parse_document(&html);
    let story_selector = Selector::parse("article header a[href], article h2 a[href]").unwrap();

    let article_urls: Vec<String> = document
        .select(&story_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| base_url.join(href).ok())
        .filter(|resolved| resolved.host_str() == base_url.host_str())
        .map(|resolved| resolved.to_string())
        .filter(|u| u.ends_with(".html"))
        .unique()
        .collect();

    info!(
        count = article_urls.len(),
        source = section_url,
        "Indexed El País article URLs"
    );
    debug!(urls = ?article_urls, "El País URLs");

    Ok(article_urls)
}

/// Pick one article with a usable body from a section page.
#[instrument(level = "info", skip_all, fields(%section_url))]
pub async fn pick_article(section_url: &str) -> Result<Article, FetchError> {
    let mut urls = index_articles(section_url).await?;
    if urls.is_empty() {
        return Err(FetchError::NoEligibleEntry {
            source: section_url.to_string(),
        });
    }
    scrapers::shuffle_leading(&mut urls);

    let article = stream::iter(urls)
        .then(|url| async move {
            match fetch_article(&url).await {
                Ok(Some(article)) => {
                    debug!(%url, "Fetched El País article");
                    Some(article)
                }
                Ok(None) => {
                    warn!(%url, "El País fetch produced no usable body");
                    None
                }
                Err(e) => {
                    error!(error = %e, %url, "El País fetch failed");
                    None
                }
            }
        })
        .filter_map(std::future::ready)
        .boxed_local()
        .next()
        .await;

    article.ok_or_else(|| FetchError::NoEligibleEntry {
        source: section_url.to_string(),
    })
}

/// Fetch a single El País article.
#[instrument(level = "info", skip_all, fields(%url))]
async fn fetch_article(url: &str) -> Result<Option<Article>, FetchError> {
    let body = scrapers::get_text(url).await?;
    let document = Html::parse_document(&body);

    let Some(title) = scrapers::extract_title(&document) else {
        return Ok(None);
    };

    let body_selector =
        Selector::parse("div[data-dtm-region=\"articulo_cuerpo\"] p, div.a_c p").unwrap();
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
    info!(bytes = content.len(), "Parsed El País article");
    let category = scrapers::categorize(&title, &content);
    Ok(Some(Article {
        title,
        url: url.to_string(),
        raw_text: content,
        category,
    }))
}
