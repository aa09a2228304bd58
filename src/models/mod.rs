use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    News,
    Blog,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Blog => "blog",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "news" => Ok(Self::News),
            "blog" => Ok(Self::Blog),
            other => Err(format!("Unknown content type '{}'. Use 'news' or 'blog'.", other)),
        }
    }
}

/// A single news or blog entry. Only the content store creates, mutates or
/// removes these.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Display date, `YYYY.MM.DD` when entered through the admin form.
    pub date: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything a caller supplies on create. An empty `slug` is derived from the title.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewContentItem {
    pub title: String,
    pub description: String,
    pub date: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub slug: String,
}

/// Partial update. `None` leaves a field alone; for the two optional links
/// `Some(None)` clears the value. A blank `slug` is re-derived from the title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub content_type: Option<ContentType>,
    pub image_url: Option<Option<String>>,
    pub original_url: Option<Option<String>>,
    pub slug: Option<String>,
}

impl ContentPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentPage {
    pub items: Vec<ContentItem>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSuggestion {
    pub id: String,
    pub url: String,
    pub thumbnail_url: String,
    pub caption: String,
    pub attribution: String,
}

pub mod db_operations;
