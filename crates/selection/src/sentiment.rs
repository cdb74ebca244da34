//! Headline keyword sentiment.

const POSITIVE: &[&str] = &[
    "beat", "beats", "surge", "soar", "record", "upgrade", "upgraded", "buy", "growth", "strong",
    "raises", "raise", "profit",
];

const NEGATIVE: &[&str] = &[
    "miss", "misses", "plunge", "drop", "downgrade", "downgraded", "sell", "lawsuit", "probe",
    "weak", "cuts", "cut", "loss",
];

/// Net keyword hits for one headline.
fn headline_score(title: &str) -> i64 {
    let lower = title.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let hits = |list: &[&str]| list.iter().filter(|k| words.contains(*k)).count() as i64;
    hits(POSITIVE) - hits(NEGATIVE)
}

/// Mean net keyword hits over non-empty headlines, clamped to +/-3 and
/// scaled to `[-1, 1]`. Zero when there is no news.
pub fn headline_sentiment<'a, I>(titles: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total = 0i64;
    let mut n = 0i64;
    for title in titles {
        if title.trim().is_empty() {
            continue;
        }
        n += 1;
        total += headline_score(title);
    }
    if n == 0 {
        return 0.0;
    }
    let raw = (total as f64 / n as f64).clamp(-3.0, 3.0);
    raw / 3.0
}
