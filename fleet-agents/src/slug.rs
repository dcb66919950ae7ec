//! Branch-name slug generation (§4.7).

/// Lowercase `text`, collapse any run of non-`[a-z0-9]` characters into
/// a single `-`, trim leading/trailing `-`, and truncate to `max_len`
/// (re-trimming a trailing `-` left by truncation).
pub fn slugify(text: &str, max_len: usize) -> String {
    let lower = text.to_lowercase();
    let mut slug = String::with_capacity(lower.len());
    let mut last_was_dash = false;
    for c in lower.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    let truncated: String = trimmed.chars().take(max_len).collect();
    truncated.trim_end_matches('-').to_string()
}
