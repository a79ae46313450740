//! HTML to page text.
//!
//! Boilerplate tags are detached from the parsed tree, then the first
//! matching main-content candidate (or `<body>`) is flattened to text. The
//! photo lookup runs on the untouched document since headshots often sit in
//! header-like wrappers that boilerplate removal would drop.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ExtractionError, Result, StepFailure, StepResult};
use crate::types::config::PreprocessConfig;

/// Output of a successful preprocessing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessedPage {
    /// Visible text, whitespace collapsed to single spaces
    pub text: String,

    /// Absolute photo URL, when one of the photo selectors matched
    pub photo_url: Option<String>,

    /// Which content selector won; `body` for the fallback
    pub matched_selector: String,
}

/// Compiled selector heuristics.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    boilerplate: Vec<Selector>,
    content: Vec<(String, Selector)>,
    photo: Vec<Selector>,
    body: Selector,
    short_text_threshold: usize,
}

impl Preprocessor {
    pub fn new(config: &PreprocessConfig) -> Result<Self> {
        Ok(Self {
            boilerplate: config
                .boilerplate_tags
                .iter()
                .map(|s| compile(s))
                .collect::<Result<_>>()?,
            content: config
                .content_selectors
                .iter()
                .map(|s| Ok((s.clone(), compile(s)?)))
                .collect::<Result<_>>()?,
            photo: config
                .photo_selectors
                .iter()
                .map(|s| compile(s))
                .collect::<Result<_>>()?,
            body: compile("body")?,
            short_text_threshold: config.short_text_threshold,
        })
    }

    /// Clean `html` fetched from `page_url`.
    ///
    /// Fails only when there is no HTML at all or no `<body>` to fall back
    /// on. Short text is accepted and logged.
    pub fn process(&self, html: &str, page_url: &str) -> StepResult<PreprocessedPage> {
        if html.trim().is_empty() {
            return Err(StepFailure::parse(
                "No HTML content found to preprocess",
                "fetched body is empty",
            ));
        }

        let mut document = Html::parse_document(html);
        let photo_url = self.find_photo(&document, page_url);
        self.strip_boilerplate(&mut document);

        let (matched_selector, region) = match self.main_region(&document) {
            Some(found) => found,
            None => {
                let region = document.select(&self.body).next().ok_or_else(|| {
                    StepFailure::parse(
                        "Could not find <body> in HTML",
                        "no content candidate matched and the document has no body",
                    )
                })?;
                debug!(url = %page_url, "no content container matched, falling back to <body>");
                ("body".to_string(), region)
            }
        };

        let text = collapse_text(region);
        if text.chars().count() < self.short_text_threshold {
            warn!(
                url = %page_url,
                chars = text.chars().count(),
                "preprocessed content is very short"
            );
        }

        debug!(
            url = %page_url,
            selector = %matched_selector,
            chars = text.len(),
            has_photo = photo_url.is_some(),
            "preprocessed page"
        );

        Ok(PreprocessedPage {
            text,
            photo_url,
            matched_selector,
        })
    }

    fn strip_boilerplate(&self, document: &mut Html) {
        let ids: Vec<_> = self
            .boilerplate
            .iter()
            .flat_map(|selector| document.select(selector).map(|el| el.id()))
            .collect();

        // Detaching an already-detached subtree is harmless, so nesting order
        // does not matter.
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    fn main_region<'a>(&self, document: &'a Html) -> Option<(String, ElementRef<'a>)> {
        self.content.iter().find_map(|(name, selector)| {
            document
                .select(selector)
                .next()
                .map(|element| (name.clone(), element))
        })
    }

    fn find_photo(&self, document: &Html, page_url: &str) -> Option<String> {
        let src = self.photo.iter().find_map(|selector| {
            document
                .select(selector)
                .filter_map(|img| img.value().attr("src"))
                .map(str::trim)
                .find(|src| !src.is_empty())
        })?;

        match Url::parse(page_url).and_then(|base| base.join(src)) {
            Ok(resolved) => Some(resolved.to_string()),
            Err(_) => Some(src.to_string()),
        }
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| ExtractionError::Config(format!("invalid selector {selector:?}: {e}")))
}

fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
