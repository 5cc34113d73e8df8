//! Link and summary extraction from listing and intermediate pages
//!
//! Matching is purely structural: anchors are selected by their raw `href`
//! (prefix for publication pages, `.pdf` suffix for downloads) and the
//! summary comes from the `description` meta tag.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::config::HarvestConfig;
use crate::types::DocumentRef;

/// Errors building an extractor
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: &'static str, message: String },
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Both results derived from one parse of an intermediate page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntermediatePage {
    pub pdf_url: Option<Url>,
    pub summary: Option<String>,
}

/// Extracts publication links, PDF links and summaries
pub struct LinkExtractor {
    anchor_selector: Selector,
    description_selector: Selector,
    /// Origin intermediate links are resolved against
    base_url: Url,
    /// Origin relative PDF links are resolved against
    pdf_origin: Url,
    /// Href prefix of intermediate publication pages
    link_prefix: String,
}

const ANCHOR_SELECTOR: &str = "a[href]";
const DESCRIPTION_SELECTOR: &str = "meta[name='description']";

fn compile(selector: &'static str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector,
        message: e.to_string(),
    })
}

fn parse_url(url: &str) -> Result<Url, ExtractError> {
    Url::parse(url).map_err(|source| ExtractError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

impl LinkExtractor {
    /// Create a new extractor
    pub fn new(
        base_url: Url,
        pdf_origin: Url,
        link_prefix: impl Into<String>,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            anchor_selector: compile(ANCHOR_SELECTOR)?,
            description_selector: compile(DESCRIPTION_SELECTOR)?,
            base_url,
            pdf_origin,
            link_prefix: link_prefix.into(),
        })
    }

    pub fn from_config(config: &HarvestConfig) -> Result<Self, ExtractError> {
        Self::new(
            parse_url(&config.base_url)?,
            parse_url(&config.pdf_origin)?,
            config.link_prefix.clone(),
        )
    }

    /// Map title to intermediate page URL for every prefixed anchor.
    ///
    /// Later anchors with the same title replace earlier ones.
    pub fn extract_intermediate_links(&self, html: &str) -> BTreeMap<String, Url> {
        let document = Html::parse_document(html);
        let mut links = BTreeMap::new();

        for anchor in document.select(&self.anchor_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !href.starts_with(&self.link_prefix) {
                continue;
            }
            match self.base_url.join(href) {
                Ok(url) => {
                    links.insert(DocumentRef::sanitize_title(&anchor_text(&anchor)), url);
                }
                Err(e) => tracing::warn!("Skipping unresolvable link {}: {}", href, e),
            }
        }

        links
    }

    /// First `.pdf` link on an intermediate page, made absolute.
    pub fn extract_pdf_link(&self, html: &str) -> Option<Url> {
        self.pdf_link_in(&Html::parse_document(html))
    }

    /// Content of the `description` meta tag.
    pub fn extract_summary(&self, html: &str) -> Option<String> {
        self.summary_in(&Html::parse_document(html))
    }

    /// Parse an intermediate page once and pull out both the PDF link and
    /// the summary.
    pub fn parse_intermediate(&self, html: &str) -> IntermediatePage {
        let document = Html::parse_document(html);
        IntermediatePage {
            pdf_url: self.pdf_link_in(&document),
            summary: self.summary_in(&document),
        }
    }

    fn pdf_link_in(&self, document: &Html) -> Option<Url> {
        document
            .select(&self.anchor_selector)
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter(|href| is_pdf_href(href))
            .find_map(|href| self.resolve_pdf_href(href))
    }

    fn resolve_pdf_href(&self, href: &str) -> Option<Url> {
        let resolved = if href.starts_with("http://") || href.starts_with("https://") {
            Url::parse(href)
        } else {
            self.pdf_origin.join(href)
        };
        match resolved {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Skipping unresolvable PDF link {}: {}", href, e);
                None
            }
        }
    }

    fn summary_in(&self, document: &Html) -> Option<String> {
        document
            .select(&self.description_selector)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(str::to_string)
    }
}

/// Visible text of an anchor, each text node trimmed and joined without a
/// separator, so `<span>SP 800-</span><span>53</span>` reads `SP 800-53`.
fn anchor_text(anchor: &ElementRef<'_>) -> String {
    anchor.text().map(str::trim).collect()
}

/// Whether the path part of `href` ends in `.pdf`, ignoring case
fn is_pdf_href(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.to_ascii_lowercase().ends_with(".pdf")
}
