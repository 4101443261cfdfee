use chrono::{DateTime, Utc};

const AVATAR_COLORS: [&str; 6] = [
    "#FF4500", "#0079D3", "#46D160", "#FFB000", "#DDBDFF", "#FF8717",
];

/// Compact age label for a timestamp, e.g. `"30s"`, `"4m"`, `"2h"`, `"3d"`.
pub fn time_ago(created_utc: f64, now: DateTime<Utc>) -> String {
    let diff = (now.timestamp() as f64 - created_utc).floor() as i64;
    time_ago_secs(diff)
}

pub fn time_ago_secs(diff: i64) -> String {
    let diff = diff.max(0);
    if diff < 60 {
        format!("{diff}s")
    } else if diff < 3_600 {
        format!("{}m", diff / 60)
    } else if diff < 86_400 {
        format!("{}h", diff / 3_600)
    } else {
        format!("{}d", diff / 86_400)
    }
}

pub fn format_score(score: i64) -> String {
    if score >= 1_000 {
        format!("{:.1}k", score as f64 / 1_000.0)
    } else {
        score.to_string()
    }
}

/// Deterministic avatar colour for an author name.
///
/// Uses the classic `hash * 31 + c` string hash over UTF-16 code units, with the
/// shift truncated to 32 bits the way a browser engine evaluates `hash << 5`, so the
/// colour matches what the site's own script would pick.
pub fn avatar_color(author: &str) -> &'static str {
    let mut hash: i64 = 0;
    for unit in author.encode_utf16() {
        let shifted = (hash as i32).wrapping_shl(5) as i64;
        hash = unit as i64 + (shifted - hash);
    }
    let index = (hash.unsigned_abs() % AVATAR_COLORS.len() as u64) as usize;
    AVATAR_COLORS[index]
}

pub fn avatar_initial(author: &str) -> String {
    author
        .chars()
        .next()
        .map(|ch| ch.to_uppercase().collect())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Dark,
    #[default]
    Light,
}

impl Theme {
    /// Detects the host theme from the class lists of the document root and body.
    pub fn detect<R, B>(root_classes: R, body_classes: B) -> Self
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        let root_dark = root_classes
            .into_iter()
            .any(|class| matches!(class.as_ref(), "theme-dark" | "dark"));
        let body_dark = body_classes
            .into_iter()
            .any(|class| class.as_ref() == "theme-dark");
        if root_dark || body_dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            Theme::Dark => "ric-dark",
            Theme::Light => "ric-light",
        }
    }
}
