use std::collections::HashSet;
use thiserror::Error;

use crate::models::ImageSuggestion;

pub const MAX_SUGGESTIONS: usize = 8;

#[derive(Error, Debug)]
pub enum SuggestionError {
    #[error("Image search is unavailable: {0}")]
    Unavailable(String),
    #[error("Image search failed: {0}")]
    Upstream(String),
}

/// A source of candidate images for an article, e.g. a stock photo API.
pub trait ImageSearch: Send + Sync {
    fn search(&self, title: &str, description: &str) -> Result<Vec<ImageSuggestion>, SuggestionError>;
}

/// Ranks upstream candidates and falls back to a fixed set of generic
/// images whenever the upstream has nothing to offer.
pub struct ImageSuggester {
    upstream: Option<Box<dyn ImageSearch>>,
}

impl ImageSuggester {
    pub fn new(upstream: Box<dyn ImageSearch>) -> Self {
        Self { upstream: Some(upstream) }
    }

    /// A suggester that always answers with the fallback set.
    pub fn fallback_only() -> Self {
        Self { upstream: None }
    }

    pub fn suggest(&self, title: &str, description: &str) -> Vec<ImageSuggestion> {
        let found = match &self.upstream {
            Some(upstream) => upstream.search(title, description).unwrap_or_else(|e| {
                log::warn!("{}. Using fallback images.", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let candidates = if found.is_empty() { fallback_images() } else { found };
        dedupe_and_cap(candidates)
    }
}

fn dedupe_and_cap(candidates: Vec<ImageSuggestion>) -> Vec<ImageSuggestion> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|image| seen.insert(image.id.clone()))
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Six generic stock images.
pub fn fallback_images() -> Vec<ImageSuggestion> {
    [
        ("mock-1", "photo-1560472354-b33ff0c44a43", "Modern office workspace"),
        ("mock-2", "photo-1551434678-e076c223a692", "Technology and innovation"),
        ("mock-3", "photo-1586953208448-b95a79798f07", "Logistics and shipping"),
        ("mock-4", "photo-1507003211169-0a1dd7228f2d", "Professional meeting"),
        ("mock-5", "photo-1460925895917-afdab827c52f", "Data analytics"),
        ("mock-6", "photo-1553877522-43269d4ea984", "Team collaboration"),
    ]
    .into_iter()
    .map(|(id, photo, caption)| ImageSuggestion {
        id: id.to_string(),
        url: format!("https://images.unsplash.com/{}?w=800", photo),
        thumbnail_url: format!("https://images.unsplash.com/{}?w=400", photo),
        caption: caption.to_string(),
        attribution: "Unsplash".to_string(),
    })
    .collect()
}
