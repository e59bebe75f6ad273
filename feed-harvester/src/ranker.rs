//! Engagement scoring and top-N selection. Pure; no I/O.

use trendscout_core::{PostRecord, ScrapedPost};

/// Parses a counter as displayed on a feed (`"1,234"`, `"45 comments"`,
/// `"1.2K"`). Anything without digits reads as 0.
pub fn parse_count(text: &str) -> u64 {
    let text = text.trim();
    let start = match text.find(|c: char| c.is_ascii_digit()) {
        Some(start) => start,
        None => return 0,
    };
    let rest = &text[start..];

    let number_end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '.' || c.is_whitespace()))
        .unwrap_or(rest.len());
    let number: String = rest[..number_end]
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();

    let mut tail = rest[number_end..].chars();
    let multiplier = match (tail.next(), tail.next()) {
        (Some('k' | 'K'), next) if !next.is_some_and(char::is_alphabetic) => 1_000.0,
        (Some('m' | 'M'), next) if !next.is_some_and(char::is_alphabetic) => 1_000_000.0,
        _ => {
            // No magnitude suffix: a dot can only be a grouping separator
            return number.replace('.', "").parse().unwrap_or(0);
        }
    };

    match number.parse::<f64>() {
        Ok(value) if value.is_finite() => (value * multiplier).round() as u64,
        _ => 0,
    }
}

/// Converts a scraped post into a record, computing its engagement.
pub fn score(post: ScrapedPost) -> PostRecord {
    let likes = parse_count(&post.likes_text);
    let comments = parse_count(&post.comments_text);
    PostRecord::new(post.content, likes, comments, post.captured_at)
}

/// The `top_n` most engaging posts, highest first. Ties keep collection
/// order.
pub fn rank(posts: Vec<ScrapedPost>, top_n: usize) -> Vec<PostRecord> {
    let mut records: Vec<PostRecord> = posts.into_iter().map(score).collect();
    // sort_by is stable
    records.sort_by(|a, b| b.total_engagement.cmp(&a.total_engagement));
    records.truncate(top_n);
    records
}
