// Utility functions
use url::Url;

/// Converts a product name into a shop handle: lower-case words joined by single hyphens.
pub fn sanitize_handle(text: &str) -> String {
    let mut handle = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for ch in text.chars() {
        let lowered: String = ch.to_lowercase().filter(|c| c.is_alphanumeric()).collect();
        if ch.is_alphanumeric() && !lowered.is_empty() {
            if pending_hyphen && !handle.is_empty() {
                handle.push('-');
            }
            pending_hyphen = false;
            handle.push_str(&lowered);
        } else {
            pending_hyphen = true;
        }
    }

    handle
}

/// Collapses internal whitespace runs and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves a page reference against the source origin. Empty references yield `None`.
pub fn resolve_url(origin: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if let Ok(absolute) = Url::parse(reference) {
        return Some(absolute.to_string());
    }
    origin.join(reference).ok().map(|u| u.to_string())
}
