//! Follows a document's intermediate page to its PDF link and summary

use std::sync::Arc;

use tracing::debug;
use url::Url;

use super::extractor::{IntermediatePage, LinkExtractor};
use super::fetcher::FetchEngine;
use crate::types::{DocumentRef, ResolvedDownload};

/// Resolves intermediate pages
#[derive(Clone)]
pub struct DocumentResolver {
    fetcher: Arc<FetchEngine>,
    extractor: Arc<LinkExtractor>,
}

impl DocumentResolver {
    pub fn new(fetcher: Arc<FetchEngine>, extractor: Arc<LinkExtractor>) -> Self {
        Self { fetcher, extractor }
    }

    /// Fetch the intermediate page once and derive both the PDF link and the
    /// summary from it. An unreachable page resolves to neither.
    pub async fn resolve(&self, doc: DocumentRef) -> ResolvedDownload {
        let page = match self.fetcher.fetch_page(&doc.intermediate_url).await {
            Some(html) => self.extractor.parse_intermediate(&html),
            None => IntermediatePage::default(),
        };

        debug!(
            "Resolved {}: pdf={:?}, summary={}",
            doc.title,
            page.pdf_url.as_ref().map(Url::as_str),
            page.summary.is_some()
        );

        ResolvedDownload {
            title: doc.title,
            intermediate_url: doc.intermediate_url,
            pdf_url: page.pdf_url,
            summary: page.summary,
        }
    }

    /// Fetch a page and return only its PDF link.
    pub async fn fetch_pdf_link(&self, intermediate_url: &Url) -> Option<Url> {
        let html = self.fetcher.fetch_page(intermediate_url).await?;
        self.extractor.extract_pdf_link(&html)
    }

    /// Fetch a page and return only its summary.
    pub async fn fetch_summary(&self, intermediate_url: &Url) -> Option<String> {
        let html = self.fetcher.fetch_page(intermediate_url).await?;
        self.extractor.extract_summary(&html)
    }
}
