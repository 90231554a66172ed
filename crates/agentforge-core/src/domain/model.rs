//! Supported model set and near-miss matching.

/// Models an agent may declare. Order is the order shown to users.
pub const SUPPORTED_MODELS: &[&str] = &[
    "claude-opus-4",
    "claude-sonnet-4",
    "claude-haiku-3.5",
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4.1",
    "o3",
    "gemini-2.5-pro",
];

pub fn is_supported_model(model: &str) -> bool {
    SUPPORTED_MODELS.contains(&model)
}

/// Comma-separated supported model list, for messages.
pub fn supported_models_list() -> String {
    SUPPORTED_MODELS.join(", ")
}

/// Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            cur[j + 1] = substitution.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Closest candidate to `value` whose edit distance is at most
/// `max(1, candidate.len() / divisor)`. Ties go to the earlier candidate.
pub fn nearest_match<'a, I>(value: &str, candidates: I, divisor: usize) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let divisor = divisor.max(1);
    let mut best: Option<(usize, &'a str)> = None;
    for candidate in candidates {
        if candidate == value {
            continue;
        }
        let distance = edit_distance(value, candidate);
        let budget = (candidate.chars().count() / divisor).max(1);
        if distance > budget {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, c)| c)
}

/// Nearest supported model for a near-miss spelling.
pub fn suggest_model(model: &str) -> Option<&'static str> {
    nearest_match(model, SUPPORTED_MODELS.iter().copied(), 5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance_basics() {
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("gpt-4o", "gpt-4o"), 0);
    }

    #[test]
    fn test_suggest_model_near_miss() {
        assert_eq!(suggest_model("claude-sonet-4"), Some("claude-sonnet-4"));
        assert_eq!(suggest_model("gpt-4o-mni"), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_suggest_model_far_miss_has_no_suggestion() {
        assert_eq!(suggest_model("gpt-5"), None);
        assert_eq!(suggest_model("llama-3-70b"), None);
    }

    #[test]
    fn test_supported_list_contains_every_model() {
        let list = supported_models_list();
        for model in SUPPORTED_MODELS {
            assert!(list.contains(model));
        }
    }
}
