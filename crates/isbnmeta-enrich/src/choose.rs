use indexmap::IndexMap;
use strsim::normalized_levenshtein;

/// How many best matches count toward a candidate's total.
const TOP_MATCHES: usize = 5;

fn normalize(s: &str) -> String {
    let mapped = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn token_sorted(s: &str) -> String {
    let mut tokens = s.split_whitespace().collect::<Vec<_>>();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Similarity of two strings on a 0..=100 scale. Case and punctuation are
/// ignored, and a word-order-insensitive comparison also counts.
///
/// This approximates a weighted ratio from the Levenshtein and token-sort
/// ratios only. There is no partial-substring component, so a short string
/// contained in a longer one scores by edit distance, not as a near match.
pub fn similarity(a: &str, b: &str) -> u32 {
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let direct = normalized_levenshtein(&a, &b);
    let sorted = normalized_levenshtein(&token_sorted(&a), &token_sorted(&b));
    (direct.max(sorted) * 100.0).round() as u32
}

/// Pick the value that agrees most with the others.
///
/// One candidate is returned as-is, and of two candidates the second one wins
/// without comparison. With three or more, every value is scored against all
/// values (itself included), its best five scores are summed, and the highest
/// total wins. Ties go to the earliest candidate.
pub fn choose<K>(candidates: &IndexMap<K, String>) -> Option<String> {
    match candidates.len() {
        0 => None,
        1 => candidates.get_index(0).map(|(_, v)| v.clone()),
        2 => candidates.get_index(1).map(|(_, v)| v.clone()),
        _ => {
            let values = candidates.values().collect::<Vec<_>>();
            let mut best: Option<(&String, u32)> = None;
            for value in &values {
                let mut scores = values
                    .iter()
                    .map(|other| similarity(value, other))
                    .collect::<Vec<_>>();
                scores.sort_unstable_by(|a, b| b.cmp(a));
                let total = scores.iter().take(TOP_MATCHES).sum::<u32>();

                if best.is_none_or(|(_, best_total)| total > best_total) {
                    best = Some((*value, total));
                }
            }
            best.map(|(value, _)| value.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(values: &[&str]) -> IndexMap<String, String> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("source{i}"), v.to_string()))
            .collect()
    }

    #[test]
    fn contained_substring_is_not_a_near_match() {
        assert!(similarity("Gatsby", "The Great Gatsby") < 50);
        assert_eq!(similarity("Great Gatsby, The", "the great gatsby"), 100);
    }

    #[test]
    fn no_candidates() {
        assert_eq!(choose(&candidates(&[])), None);
    }

    #[test]
    fn single_candidate_wins() {
        assert_eq!(choose(&candidates(&["Only"])).as_deref(), Some("Only"));
    }

    #[test]
    fn second_of_two_wins_without_comparison() {
        assert_eq!(
            choose(&candidates(&["The Book of Trees", "Completely different"])).as_deref(),
            Some("Completely different")
        );
    }

    #[test]
    fn majority_wins() {
        let picked = choose(&candidates(&[
            "The Great Gatsby",
            "The Great Gatsby",
            "The Grate Gatsby",
            "Gatsby",
        ]));
        assert_eq!(picked.as_deref(), Some("The Great Gatsby"));

        let picked = choose(&candidates(&[
            "The Great Gatsby",
            "The Great Gatsby",
            "Gatsby, The Great (reprint)",
        ]));
        assert_eq!(picked.as_deref(), Some("The Great Gatsby"));
    }

    #[test]
    fn ties_keep_first_seen() {
        assert_eq!(choose(&candidates(&["abc", "xyz", "mno"])).as_deref(), Some("abc"));
    }

    #[test]
    fn similarity_ignores_case_punctuation_and_order() {
        assert_eq!(similarity("Great Gatsby, The", "the great gatsby"), 100);
        assert_eq!(similarity("", "anything"), 0);
        assert_eq!(similarity("---", "---"), 0);
        assert!(similarity("The Book of Trees", "The book of trees: visualizing") < 100);
    }
}
