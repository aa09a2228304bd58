use std::collections::HashSet;
use url::Url;

/// Strips all HTML tags from input (for titles and descriptions), leaving
/// only the text. Entities are decoded back so the stored text is plain.
pub fn strip_all_html(input: &str) -> String {
    let cleaned = ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string();
    decode_basic_entities(&cleaned)
}

/// Ammonia escapes `&`, `<`, `>` and quotes in text nodes. Stored content is
/// served as JSON, not HTML, so those escapes are undone.
fn decode_basic_entities(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Accepts absolute http(s) URLs and site-relative paths such as
/// `/uploads/abc.png`. Returns the trimmed value.
pub fn validate_link(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        return (!trimmed.chars().any(char::is_whitespace)).then(|| trimmed.to_string());
    }
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Some(trimmed.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_but_keeps_text() {
        assert_eq!(strip_all_html("<b>Breaking</b> news"), "Breaking news");
        assert_eq!(strip_all_html("<script>alert(1)</script>Safe"), "Safe");
        assert_eq!(strip_all_html("Tom & Jerry"), "Tom & Jerry");
        assert_eq!(strip_all_html("서울 소식"), "서울 소식");
    }

    #[test]
    fn links_must_be_http_or_site_relative() {
        assert_eq!(
            validate_link(" https://example.com/a?b=1 "),
            Some("https://example.com/a?b=1".to_string())
        );
        assert_eq!(validate_link("/uploads/x.png"), Some("/uploads/x.png".to_string()));
        assert_eq!(validate_link("javascript:alert(1)"), None);
        assert_eq!(validate_link("//evil.example"), None);
        assert_eq!(validate_link("ftp://example.com/file"), None);
        assert_eq!(validate_link("not a url"), None);
        assert_eq!(validate_link("   "), None);
    }
}
