//! Pattern matching properties

use buildstate::resource::{MatchPattern, MatchPatterns};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,8}"
}

fn relative_path() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 1..6)
}

proptest! {
    #[test]
    fn prop_double_star_matches_everything(segments in relative_path()) {
        let path = segments.join("/");
        prop_assert!(MatchPattern::new("**").matches(&path, true));
    }

    #[test]
    fn prop_literal_pattern_matches_itself(segments in relative_path()) {
        let path = segments.join("/");
        prop_assert!(MatchPattern::new(&path).matches(&path, true));
        prop_assert!(MatchPattern::new(&path).matches(&path.to_uppercase(), false));
    }

    #[test]
    fn prop_extension_pattern(segments in relative_path(), ext in "[a-z]{1,4}") {
        let path = format!("{}.{}", segments.join("/"), ext);
        let pattern = MatchPattern::new(&format!("**/*.{}", ext));
        prop_assert!(pattern.matches(&path, true));
        let other = format!("{}.{}x", segments.join("/"), ext);
        prop_assert!(!pattern.matches(&other, true));
    }

    #[test]
    fn prop_backslash_separators_equivalent(segments in relative_path()) {
        let forward = segments.join("/");
        let backward = segments.join("\\");
        let pattern = MatchPattern::new(&forward);
        prop_assert!(pattern.matches(&backward, true));
    }

    #[test]
    fn prop_directory_prefix_can_descend(segments in relative_path()) {
        let pattern = MatchPatterns::from([format!("{}/**", segments.join("/"))]);
        for depth in 1..=segments.len() {
            let prefix = segments[..depth].join("/");
            prop_assert!(pattern.matches_pattern_start(&prefix, true));
        }
    }
}
