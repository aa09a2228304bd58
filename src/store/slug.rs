const MAX_SLUG_LEN: usize = 128;

/// Turns a title into a URL-safe slug.
///
/// Letters and digits from any script survive (titles are often Korean),
/// everything else collapses into single hyphens.
pub fn slugify(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_was_hyphen = true;
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            result.push(c);
            prev_was_hyphen = false;
        } else if !prev_was_hyphen {
            result.push('-');
            prev_was_hyphen = true;
        }
    }
    while result.ends_with('-') {
        result.pop();
    }

    if result.len() > MAX_SLUG_LEN {
        let mut end = MAX_SLUG_LEN;
        while !result.is_char_boundary(end) {
            end -= 1;
        }
        let truncated = &result[..end];
        // Prefer cutting at a word boundary.
        return match truncated.rfind('-') {
            Some(last_hyphen) if last_hyphen > 0 => truncated[..last_hyphen].to_string(),
            _ => truncated.trim_end_matches('-').to_string(),
        };
    }
    result
}

/// Slug for a new item: slugified title, or `item-<id prefix>` when the title
/// has nothing usable.
pub fn derive_slug(title: &str, id: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        let prefix: String = id.chars().filter(|c| c.is_alphanumeric()).take(8).collect();
        format!("item-{}", prefix)
    } else {
        slug
    }
}

/// Appends `-2`, `-3`, ... until `taken` no longer reports a collision.
pub fn disambiguate(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("AI Logistics: 2025 Outlook!"), "ai-logistics-2025-outlook");
    }

    #[test]
    fn slugify_keeps_hangul() {
        assert_eq!(slugify("스마트 물류 도입 가이드"), "스마트-물류-도입-가이드");
    }

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("  --a   b--  "), "a-b");
        assert_eq!(slugify("???"), "");
    }

    #[test]
    fn slugify_caps_length_on_char_boundary() {
        let slug = slugify(&"물류 ".repeat(60));
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn derive_slug_falls_back_to_id() {
        assert_eq!(derive_slug("!!!", "0f8e2b1c-aaaa"), "item-0f8e2b1c");
        assert_eq!(derive_slug("Beta", "x"), "beta");
    }

    #[test]
    fn disambiguate_counts_up() {
        let taken = ["alpha", "alpha-2"];
        assert_eq!(disambiguate("alpha", |s| taken.contains(&s)), "alpha-3");
        assert_eq!(disambiguate("beta", |s| taken.contains(&s)), "beta");
    }
}
