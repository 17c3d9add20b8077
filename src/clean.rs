//! Deterministic boilerplate removal for scraped text.
//!
//! [`TextNormalizer`] strips known WordPress site chrome (comment forms,
//! share blocks, category listings, navigation), truncates at common
//! end-of-content markers, and normalizes whitespace. `clean` is idempotent:
//! `clean(clean(x)) == clean(x)`, so re-cleaning already-ingested content is
//! always safe. It never fails on malformed input; the worst case is an
//! empty string, which callers treat as a dropped record.

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::config::CleaningConfig;

/// Boilerplate patterns removed from scraped article text. All are matched
/// case-insensitively with `.` spanning newlines.
const PATTERNS_TO_REMOVE: &[&str] = &[
    // Comment form and related elements
    r"Leave a Reply\s*Cancel reply.*?for the next time I comment\.",
    r"Comment\s*Enter your name.*?for the next time I comment\.",
    r"Enter your name or username to comment.*?for the next time I comment\.",
    // Footer elements and post metadata
    r"Copyright © \d{4}.*?All rights reserved\.?",
    r"Post author:\s*.*?\s*Post published:\s*.*?\s*Reading time:\s*.*?\s*",
    r"Thank you for sharing this post!\s*Share this content\s*Opens in a new window\s*",
    // Navigation elements
    r"Previous Post.*?Next Post",
    // Social sharing
    r"Share this:.*?Click to share",
    r"Share this content.*?Opens in a new window",
    // Search prompts
    r"Search for:.*?search",
    // Category and tag listings at the end of posts
    r"Categories.*?\(\d+\).*?Spanish Teaching.*?\(\d+\)",
    r"\(\d+\)\s*Argentinian Spanish\s*\(\d+\)\s*Argentinian Spanish Curse Words\s*\(\d+\)",
    // Common footer text
    r"Venture Out Spanish\s*·\s*\S+\s*\S+\s*·\s*Privacy Policy",
    // Author bio section
    r"About the author.*?View all posts",
    // Comment section headers
    r"Comments\s*\(\d+\)",
    // Tag lines
    r"Filed under:.*?Tags:",
    r"Post author:.*?Reading time:.*?read",
    // Share buttons
    r"Opens in a new window\s*Opens in a new window\s*Opens in a new window",
];

/// Markers where real content ends and boilerplate begins. Everything from
/// the first occurrence onward is dropped.
const SPLIT_POINTS: &[&str] = &[
    "Leave a Reply",
    "Related Posts",
    "Categories",
    "Thank you for sharing this post",
    "Post navigation",
];

pub struct TextNormalizer {
    patterns: Vec<Regex>,
    category_line: Regex,
    url: Regex,
    spaces: Regex,
    blank_lines: Regex,
    strip_leading_lines: usize,
    strip_trailing_lines: usize,
}

impl TextNormalizer {
    pub fn new(config: &CleaningConfig) -> Self {
        let mut patterns = Vec::with_capacity(PATTERNS_TO_REMOVE.len());
        for pattern in PATTERNS_TO_REMOVE
            .iter()
            .copied()
            .chain(config.extra_patterns.iter().map(String::as_str))
        {
            match RegexBuilder::new(pattern)
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .build()
            {
                Ok(re) => patterns.push(re),
                Err(e) => warn!(pattern, error = %e, "skipping invalid cleaning pattern"),
            }
        }

        Self {
            patterns,
            category_line: Regex::new(r"^\s*\(\d+\)\s*$").unwrap(),
            url: Regex::new(r"https?://\S+").unwrap(),
            spaces: Regex::new(r"[ \t]{2,}").unwrap(),
            blank_lines: Regex::new(r"\n{3,}").unwrap(),
            strip_leading_lines: config.strip_leading_lines,
            strip_trailing_lines: config.strip_trailing_lines,
        }
    }

    /// Remove boilerplate and normalize whitespace. Idempotent; never fails.
    pub fn clean(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        let mut text = raw.to_string();
        for pattern in &self.patterns {
            text = pattern.replace_all(&text, "").into_owned();
        }

        // Truncate at the first end-of-content marker.
        for point in SPLIT_POINTS {
            if let Some(pos) = text.find(point) {
                text.truncate(pos);
            }
        }

        text = self.filter_category_listing(&text);
        text = self.url.replace_all(&text, "").into_owned();
        self.normalize_whitespace(&text)
    }

    /// Strip the configured count of leading/trailing lines from a raw
    /// article record. Applied once per record before [`clean`](Self::clean),
    /// never to phrase rows; repeated site chrome (menus, footers) on scraped
    /// pages lives in those lines.
    pub fn strip_chrome_lines(&self, raw: &str) -> String {
        if self.strip_leading_lines == 0 && self.strip_trailing_lines == 0 {
            return raw.to_string();
        }
        let lines: Vec<&str> = raw.lines().collect();
        let total = lines.len();
        let start = self.strip_leading_lines.min(total);
        let end = total.saturating_sub(self.strip_trailing_lines).max(start);
        lines[start..end].join("\n")
    }

    /// Drop category-count listings: once a bare `(N)` line is seen, skip
    /// lines until a substantial line (> 30 chars) resumes the content.
    fn filter_category_listing(&self, text: &str) -> String {
        let mut kept: Vec<&str> = Vec::new();
        let mut skip_mode = false;

        for line in text.lines() {
            if self.category_line.is_match(line) {
                skip_mode = true;
            }
            if !skip_mode {
                kept.push(line);
            }
            if skip_mode && line.trim().len() > 30 {
                skip_mode = false;
            }
        }

        kept.join("\n")
    }

    fn normalize_whitespace(&self, text: &str) -> String {
        let text = self.spaces.replace_all(text, " ");
        // Trim each line so indentation noise cannot defeat idempotence.
        let trimmed: Vec<&str> = text.lines().map(str::trim).collect();
        let text = trimmed.join("\n");
        let text = self.blank_lines.replace_all(&text, "\n\n");
        text.trim().to_string()
    }
}
