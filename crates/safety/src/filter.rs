//! Safety Filter: normalize -> pattern checks -> [`ModerationMeta`]. Runs
//! once per `ingest` message inside the broadcaster, before anything is
//! fanned out or republished.

use chatstorm_domain::{ModerationMeta, SafetyAction};
use regex::Regex;
use std::sync::LazyLock;

const REDACTED: &str = "[REDACTED]";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}").unwrap()
});
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?\d{1,2}[ .\-]?)?\(?\d{3}\)?[ .\-]?\d{3}[ .\-]?\d{4}\b").unwrap()
});
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,5}\s+[a-z0-9.' ]{2,40}\s+(street|st|avenue|ave|road|rd|boulevard|blvd|drive|dr|lane|ln|court|ct)\b").unwrap()
});

#[derive(Debug, Clone)]
pub struct SafetyConfig {
    pub max_chars: usize,
    pub blocklist: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_chars: 320,
            blocklist: Vec::new(),
        }
    }
}

/// The result of running the filter: the (possibly normalized/redacted)
/// content plus the stamped moderation metadata.
pub struct FilterOutcome {
    pub content: String,
    pub meta: ModerationMeta,
}

/// Strip control characters, collapse internal whitespace runs, flatten to a
/// single line, and truncate to `max_chars`.
fn normalize(raw: &str, max_chars: usize) -> String {
    let flattened: String = raw
        .chars()
        .filter(|c| !c.is_control() || *c == ' ')
        .map(|c| if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c })
        .collect();
    let collapsed = flattened.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}

/// Run the full pipeline: normalize then pattern checks. `blocklist` entries
/// are matched case-insensitively as whole words.
pub fn run(content: &str, config: &SafetyConfig) -> FilterOutcome {
    let normalized = normalize(content, config.max_chars);
    let mut reasons = Vec::new();
    let mut redactions = Vec::new();
    let mut working = normalized;

    for word in &config.blocklist {
        if word.is_empty() {
            continue;
        }
        let re = match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))) {
            Ok(re) => re,
            Err(_) => continue,
        };
        if re.is_match(&working) {
            reasons.push(format!("blocklist:{word}"));
        }
    }

    if !reasons.is_empty() {
        return FilterOutcome {
            content: working,
            meta: ModerationMeta {
                action: Some(SafetyAction::Drop),
                reasons,
                redactions,
            },
        };
    }

    for (name, re) in [
        ("email", &*EMAIL_RE),
        ("phone", &*PHONE_RE),
        ("address", &*ADDRESS_RE),
    ] {
        if re.is_match(&working) {
            working = re.replace_all(&working, REDACTED).into_owned();
            reasons.push(format!("pii:{name}"));
            redactions.push(name.to_string());
        }
    }

    let action = if redactions.is_empty() {
        SafetyAction::Allow
    } else {
        SafetyAction::Redact
    };

    FilterOutcome {
        content: working,
        meta: ModerationMeta {
            action: Some(action),
            reasons,
            redactions,
        },
    }
}

/// `true` if `text` contains an email, phone number, or street address.
/// Used by the memory adapter to refuse to persist PII-bearing items.
pub fn contains_pii(text: &str) -> bool {
    EMAIL_RE.is_match(text) || PHONE_RE.is_match(text) || ADDRESS_RE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_newlines() {
        let out = normalize("hi\n\nthere   friend\t!", 320);
        assert_eq!(out, "hi there friend !");
    }

    #[test]
    fn normalize_truncates_to_max_chars() {
        let out = normalize(&"a".repeat(500), 10);
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn allow_when_nothing_matches() {
        let outcome = run("just a normal message", &SafetyConfig::default());
        assert_eq!(outcome.meta.action, Some(SafetyAction::Allow));
        assert!(outcome.meta.redactions.is_empty());
    }

    #[test]
    fn blocklist_hit_drops() {
        let config = SafetyConfig {
            blocklist: vec!["badword".into()],
            ..SafetyConfig::default()
        };
        let outcome = run("this has a badword in it", &config);
        assert_eq!(outcome.meta.action, Some(SafetyAction::Drop));
    }

    #[test]
    fn email_is_redacted() {
        let outcome = run("reach me at person@example.com please", &SafetyConfig::default());
        assert_eq!(outcome.meta.action, Some(SafetyAction::Redact));
        assert!(outcome.content.contains(REDACTED));
        assert!(!outcome.content.contains("person@example.com"));
    }

    #[test]
    fn phone_number_is_redacted() {
        let outcome = run("call me at 555-123-4567 now", &SafetyConfig::default());
        assert_eq!(outcome.meta.action, Some(SafetyAction::Redact));
        assert!(outcome.content.contains(REDACTED));
    }
}
