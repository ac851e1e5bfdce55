/// Always-applied post-processing: strip whitespace, remove newlines,
/// collapse internal whitespace runs, strip a leading `@` token, truncate to
/// `max_chars`. Returns `None` if the result is empty.
pub fn post_process(raw: &str, max_chars: usize) -> Option<String> {
    let single_line = raw.replace(['\n', '\r'], " ");
    let collapsed: String = single_line.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim();
    let stripped = match trimmed.split_once(' ') {
        Some((first, rest)) if first.starts_with('@') => rest.trim_start(),
        Some(_) => trimmed,
        None if trimmed.starts_with('@') => "",
        None => trimmed,
    };
    let truncated: String = stripped.chars().take(max_chars).collect();
    if truncated.is_empty() {
        None
    } else {
        Some(truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_newlines() {
        assert_eq!(
            post_process("hi\n\n  there   friend", 320),
            Some("hi there friend".to_string())
        );
    }

    #[test]
    fn strips_leading_at_token() {
        assert_eq!(post_process("@Viewer thanks!", 320), Some("thanks!".to_string()));
    }

    #[test]
    fn truncates_to_max_chars() {
        let out = post_process(&"a".repeat(50), 10).unwrap();
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn empty_result_is_none() {
        assert_eq!(post_process("   \n\n  ", 320), None);
        assert_eq!(post_process("@", 320), None);
    }
}
