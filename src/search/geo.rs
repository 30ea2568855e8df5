//! Jurisdiction filter

use crate::models::SchemeCandidate;

/// State values that mark a scheme as available everywhere
pub const NATIONWIDE_TERMS: [&str; 3] = ["all india", "central", "nationwide"];

/// Keep candidates from the user's state plus nationwide schemes, in order.
/// Nameless candidates never survive.
pub fn filter_by_state(candidates: Vec<SchemeCandidate>, user_state: &str) -> Vec<SchemeCandidate> {
    let user_state = user_state.trim().to_lowercase();
    candidates
        .into_iter()
        .filter(|c| c.metadata.has_name())
        .filter(|c| {
            let state = c.metadata.state.trim().to_lowercase();
            state == user_state || NATIONWIDE_TERMS.iter().any(|t| state.contains(t))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SchemeMetadata;

    fn candidate(name: &str, state: &str) -> SchemeCandidate {
        SchemeCandidate {
            id: name.to_string(),
            score: 0.5,
            metadata: SchemeMetadata {
                scheme_id: name.to_string(),
                scheme_name: name.to_string(),
                state: state.to_string(),
                ..Default::default()
            },
        }
    }

    fn names(c: &[SchemeCandidate]) -> Vec<&str> {
        c.iter().map(|c| c.metadata.scheme_name.as_str()).collect()
    }

    #[test]
    fn test_all_india_kept_for_any_state() {
        for state in ["Karnataka", "Goa", "Mizoram"] {
            let kept = filter_by_state(vec![candidate("PM-KISAN", "All India")], state);
            assert_eq!(kept.len(), 1);
        }
    }

    #[test]
    fn test_state_match_is_case_insensitive() {
        let pool = vec![
            candidate("Vidyasiri", "Karnataka"),
            candidate("Kalia", "Odisha"),
            candidate("Central Sector Scholarship", "Central"),
            candidate("Jan Dhan", "Nationwide (all states)"),
        ];
        assert_eq!(
            names(&filter_by_state(pool.clone(), "karnataka")),
            vec!["Vidyasiri", "Central Sector Scholarship", "Jan Dhan"]
        );
        assert_eq!(
            names(&filter_by_state(pool, "Kerala")),
            vec!["Central Sector Scholarship", "Jan Dhan"]
        );
    }

    #[test]
    fn test_nameless_candidates_dropped() {
        let kept = filter_by_state(vec![candidate("", "All India"), candidate("NSAP", "All India")], "Goa");
        assert_eq!(names(&kept), vec!["NSAP"]);
    }
}
