//! MQTT topic-filter matching: `+` (single level) and `#` (trailing
//! multi-level) wildcards.

/// Returns whether `topic` (a published topic, never containing wildcards)
/// matches `pattern` (a subscription filter, which may).
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern_levels: Vec<&str> = pattern.split('/').collect();
    let topic_levels: Vec<&str> = topic.split('/').collect();
    match_levels(&pattern_levels, &topic_levels)
}

fn match_levels(pattern: &[&str], topic: &[&str]) -> bool {
    match (pattern.first(), topic.first()) {
        (Some(&"#"), _) => pattern.len() == 1,
        (Some(&"+"), Some(t)) => {
            // A trailing slash produces an empty final level with no further
            // levels behind it; `+` only stands in for a level that's
            // actually there, so it doesn't match that empty tail.
            let is_final_empty_level = pattern.len() == 1 && topic.len() == 1 && t.is_empty();
            !is_final_empty_level && match_levels(&pattern[1..], &topic[1..])
        }
        (Some(&"+"), None) => false,
        (Some(p), Some(t)) => *p == *t && match_levels(&pattern[1..], &topic[1..]),
        (Some(_), None) => false,
        (None, None) => true,
        (None, Some(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_match() {
        assert!(topic_matches("sensors/temp", "sensors/temp"));
        assert!(!topic_matches("sensors/temp", "sensors/humidity"));
    }

    #[test]
    fn single_level_wildcard() {
        assert!(topic_matches("sensors/+", "sensors/temp"));
        assert!(!topic_matches("sensors/+", "sensors/temp/extra"));
        assert!(topic_matches("+", "foo"));
        assert!(!topic_matches("+", "foo/bar"));
    }

    #[test]
    fn multi_level_wildcard() {
        assert!(topic_matches("#", "anything"));
        assert!(topic_matches("#", "a/b/c"));
        assert!(topic_matches("sport/#", "sport"));
        assert!(topic_matches("sport/#", "sport/tennis"));
        assert!(topic_matches("sport/#", "sport/tennis/scores"));
        assert!(!topic_matches("sport/#", "sports"));
    }

    #[test]
    fn trailing_slash_is_its_own_level() {
        // "sport/+" requires one more, non-empty level, so a trailing slash
        // (an empty final level) doesn't satisfy it, and neither does having
        // no further level at all.
        assert!(!topic_matches("sport/+", "sport/"));
        assert!(!topic_matches("sport/+", "sport"));
        assert!(topic_matches("sport/+", "sport/tennis"));
    }

    #[test]
    fn dollar_prefixed_topics_are_matchable() {
        assert!(topic_matches(
            "$SYS/discovery/response",
            "$SYS/discovery/response"
        ));
        assert!(topic_matches("$SYS/#", "$SYS/discovery/request"));
    }
}
