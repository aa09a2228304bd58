use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

use crate::helper::sanitization_helpers;
use crate::models::{ContentPatch, ContentType, NewContentItem};
use crate::store::slug;

const DATE_FORMAT: &str = "%Y.%m.%d";

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}\.\d{2}\.\d{2}$").expect("valid regex literal"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("'{0}' is mandatory and cannot be empty.")]
    MissingField(&'static str),
    #[error("'{0}' is not a valid date. Use YYYY.MM.DD.")]
    InvalidDate(String),
    #[error("'{value}' is not a valid link for '{field}'.")]
    InvalidUrl { field: &'static str, value: String },
}

impl FormError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField(field) => *field,
            Self::InvalidDate(_) => "date",
            Self::InvalidUrl { field, .. } => *field,
        }
    }
}

/// One entry of the 400 response body.
#[derive(Serialize, Debug)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

pub fn field_errors(errors: &[FormError]) -> Vec<FieldError> {
    errors
        .iter()
        .map(|e| FieldError {
            field: e.field(),
            message: e.to_string(),
        })
        .collect()
}

/// Body of `POST /content`.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContentForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub image_url: Option<String>,
    pub original_url: Option<String>,
    pub slug: Option<String>,
}

/// Body of `PUT /content/{id}`. Missing keys are left alone; an empty
/// string clears `imageUrl`/`originalUrl`.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContentPatchForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,
    pub image_url: Option<String>,
    pub original_url: Option<String>,
    pub slug: Option<String>,
    pub expected_updated_at: Option<DateTime<Utc>>,
}

impl ContentForm {
    pub fn validate(self) -> Result<NewContentItem, Vec<FormError>> {
        let mut errors = Vec::new();

        let title = required_text("title", &self.title, &mut errors);
        let description = required_text("description", &self.description, &mut errors);
        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => today(),
            Some(raw) => checked_date(raw, &mut errors),
        };
        let image_url = optional_link("imageUrl", self.image_url.as_deref(), &mut errors);
        let original_url = optional_link("originalUrl", self.original_url.as_deref(), &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(NewContentItem {
            title,
            description,
            date,
            content_type: self.content_type,
            image_url,
            original_url,
            slug: self.slug.as_deref().map(slug::slugify).unwrap_or_default(),
        })
    }
}

impl ContentPatchForm {
    /// Splits the form into the store patch and the optional
    /// `expectedUpdatedAt` precondition.
    pub fn validate(self) -> Result<(ContentPatch, Option<DateTime<Utc>>), Vec<FormError>> {
        let mut errors = Vec::new();

        let title = self.title.map(|t| required_text("title", &t, &mut errors));
        let description = self.description.map(|d| required_text("description", &d, &mut errors));
        let date = self.date.map(|d| checked_date(d.trim(), &mut errors));
        let image_url = self
            .image_url
            .map(|u| optional_link("imageUrl", Some(u.as_str()), &mut errors));
        let original_url = self
            .original_url
            .map(|u| optional_link("originalUrl", Some(u.as_str()), &mut errors));

        if !errors.is_empty() {
            return Err(errors);
        }
        let patch = ContentPatch {
            title,
            description,
            date,
            content_type: self.content_type,
            image_url,
            original_url,
            slug: self.slug.as_deref().map(slug::slugify),
        };
        Ok((patch, self.expected_updated_at))
    }
}

fn required_text(field: &'static str, raw: &str, errors: &mut Vec<FormError>) -> String {
    let clean = sanitization_helpers::strip_all_html(raw).trim().to_string();
    if clean.is_empty() {
        errors.push(FormError::MissingField(field));
    }
    clean
}

fn checked_date(raw: &str, errors: &mut Vec<FormError>) -> String {
    if !is_valid_date(raw) {
        errors.push(FormError::InvalidDate(raw.to_string()));
    }
    raw.to_string()
}

fn optional_link(field: &'static str, raw: Option<&str>, errors: &mut Vec<FormError>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let link = sanitization_helpers::validate_link(raw);
    if link.is_none() {
        errors.push(FormError::InvalidUrl {
            field,
            value: raw.to_string(),
        });
    }
    link
}

/// `YYYY.MM.DD` and a real calendar day.
pub fn is_valid_date(raw: &str) -> bool {
    DATE_SHAPE.is_match(raw) && NaiveDate::parse_from_str(raw, DATE_FORMAT).is_ok()
}

/// Today's UTC date in the display format.
pub fn today() -> String {
    Utc::now().format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(title: &str, description: &str) -> ContentForm {
        ContentForm {
            title: title.to_string(),
            description: description.to_string(),
            content_type: ContentType::News,
            ..ContentForm::default()
        }
    }

    #[test]
    fn valid_form_is_cleaned() {
        let mut input = form("<b>Rust 2.0</b> released", "Big <i>news</i>");
        input.date = Some("2025.03.01".to_string());
        input.image_url = Some("/uploads/abc.png".to_string());
        input.original_url = Some("".to_string());
        input.slug = Some("Rust Two!".to_string());

        let item = input.validate().unwrap();
        assert_eq!(item.title, "Rust 2.0 released");
        assert_eq!(item.description, "Big news");
        assert_eq!(item.date, "2025.03.01");
        assert_eq!(item.image_url.as_deref(), Some("/uploads/abc.png"));
        assert_eq!(item.original_url, None);
        assert_eq!(item.slug, "rust-two");
    }

    #[test]
    fn missing_date_defaults_to_today() {
        let item = form("Title", "Body").validate().unwrap();
        assert!(is_valid_date(&item.date));
        assert_eq!(item.date, today());
    }

    #[test]
    fn all_field_errors_are_reported() {
        let mut input = form("  <p></p> ", "");
        input.date = Some("2025-13-01".to_string());
        input.original_url = Some("javascript:alert(1)".to_string());

        let errors = input.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(FormError::field).collect();
        assert_eq!(fields, vec!["title", "description", "date", "originalUrl"]);
    }

    #[test]
    fn dates_must_exist_on_the_calendar() {
        assert!(is_valid_date("2024.02.29"));
        assert!(!is_valid_date("2023.02.29"));
        assert!(!is_valid_date("2024.2.9"));
        assert!(!is_valid_date("2024.02.29 "));
        assert!(!is_valid_date("2024-02-29"));
    }

    #[test]
    fn patch_form_keeps_absent_fields_and_clears_empty_links() {
        let patch_form: ContentPatchForm = serde_json::from_str(
            r#"{"title":"New title","imageUrl":"","expectedUpdatedAt":"2025-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        let (patch, expected) = patch_form.validate().unwrap();

        assert_eq!(patch.title.as_deref(), Some("New title"));
        assert_eq!(patch.description, None);
        assert_eq!(patch.image_url, Some(None));
        assert_eq!(patch.original_url, None);
        assert_eq!(expected.map(|t| t.to_rfc3339()), Some("2025-01-02T03:04:05+00:00".to_string()));
    }

    #[test]
    fn patch_form_rejects_blanked_title() {
        let patch_form = ContentPatchForm {
            title: Some("   ".to_string()),
            ..ContentPatchForm::default()
        };
        let errors = patch_form.validate().unwrap_err();
        assert_eq!(errors, vec![FormError::MissingField("title")]);
    }
}
