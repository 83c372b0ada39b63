use crate::models::MatchResult;

#[derive(Debug, Clone, PartialEq)]
pub enum RankedOutcome {
    /// Every scored reference, best first.
    Matched(Vec<MatchResult>),
    NoMatch,
}

/// Sort descending by confidence and apply the threshold to the best entry.
///
/// Equal confidences keep their input (reference) order, so repeated queries
/// over the same references rank identically.
pub fn rank_results(mut results: Vec<MatchResult>, threshold: f64) -> RankedOutcome {
    results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    match results.first() {
        Some(best) if best.confidence >= threshold => RankedOutcome::Matched(results),
        _ => RankedOutcome::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn result(id: &str, confidence: f64) -> MatchResult {
        MatchResult {
            reference_id: id.into(),
            label: format!("Dr. {id}"),
            category: "General".into(),
            confidence,
            matched_features: BTreeSet::new(),
        }
    }

    fn ids(outcome: &RankedOutcome) -> Vec<&str> {
        match outcome {
            RankedOutcome::Matched(results) => {
                results.iter().map(|r| r.reference_id.as_str()).collect()
            }
            RankedOutcome::NoMatch => Vec::new(),
        }
    }

    #[test]
    fn surfaces_full_ranking_when_best_clears_threshold() {
        let outcome = rank_results(
            vec![result("a", 45.0), result("b", 30.0), result("c", 70.0)],
            60.0,
        );
        assert_eq!(ids(&outcome), vec!["c", "a", "b"]);
    }

    #[test]
    fn nothing_surfaced_below_threshold() {
        let outcome = rank_results(vec![result("a", 55.0), result("b", 40.0)], 60.0);
        assert_eq!(outcome, RankedOutcome::NoMatch);

        let boundary = rank_results(vec![result("a", 59.999)], 60.0);
        assert_eq!(boundary, RankedOutcome::NoMatch);

        let exact = rank_results(vec![result("a", 60.0)], 60.0);
        assert_eq!(ids(&exact), vec!["a"]);
    }

    #[test]
    fn ties_keep_reference_order() {
        let outcome = rank_results(
            vec![
                result("first", 80.0),
                result("low", 10.0),
                result("second", 80.0),
                result("third", 80.0),
            ],
            60.0,
        );
        assert_eq!(ids(&outcome), vec!["first", "second", "third", "low"]);
    }

    #[test]
    fn empty_input_is_no_match() {
        assert_eq!(rank_results(Vec::new(), 60.0), RankedOutcome::NoMatch);
    }
}
