// "Did you mean?" suggestions over identifier corpora

use strsim::levenshtein;

/// Maximum number of edits a name may be away to still be suggested
pub const SUGGESTION_MAX_DISTANCE: usize = 3;

/// Find the candidate nearest to `name` by edit distance, bounded at
/// [`SUGGESTION_MAX_DISTANCE`] edits. Earlier candidates win ties.
pub fn nearest_name<'a, I>(name: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, usize)> = None;

    for candidate in candidates {
        let distance = levenshtein(name, candidate);

        if distance < SUGGESTION_MAX_DISTANCE && best.map_or(true, |(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }

    best.map(|(candidate, _)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_within_bound() {
        let names = ["count", "counter", "total"];
        assert_eq!(nearest_name("conut", names), Some("count"));
    }

    #[test]
    fn test_too_far_away() {
        let names = ["alpha", "beta"];
        assert_eq!(nearest_name("zzzzzzzz", names), None);
    }

    #[test]
    fn test_earlier_candidate_wins_ties() {
        let names = ["item_a", "item_b"];
        assert_eq!(nearest_name("item_c", names), Some("item_a"));
    }
}
