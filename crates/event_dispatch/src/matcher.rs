//! Hierarchical event-name matching.
//!
//! Event names are dot-segmented paths. A listener registered on a name also
//! receives every event below it: `order` matches `order`, `order.created` and
//! `order.created.audit`, but not `orders` or a parent such as `ord`.

/// Segment separator of hierarchical event names
pub const NAME_SEPARATOR: char = '.';

/// Returns true when a listener registered under `registered` fires for `fired`.
///
/// Matching is exact or prefix-by-whole-segment, and case-sensitive.
pub fn matches(registered: &str, fired: &str) -> bool {
    if registered == fired {
        return true;
    }
    starts_with(fired, registered)
        && fired[registered.len()..].starts_with(NAME_SEPARATOR)
}

/// Plain prefix test used by [`matches`]
pub fn starts_with(haystack: &str, needle: &str) -> bool {
    haystack.as_bytes().starts_with(needle.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exact_match() {
        assert!(matches("order", "order"));
        assert!(matches("order.created", "order.created"));
    }

    #[test]
    fn test_child_names_match_parent_listener() {
        assert!(matches("a", "a.b"));
        assert!(matches("a", "a.b.c"));
        assert!(matches("a.b", "a.b.c"));
    }

    #[test]
    fn test_non_segment_prefix_does_not_match() {
        assert!(!matches("a", "ab"));
        assert!(!matches("order", "orders.created"));
    }

    #[test]
    fn test_parent_event_does_not_reach_child_listener() {
        assert!(!matches("order.created", "order"));
        assert!(!matches("a.b", "a"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert!(!matches("Order", "order.created"));
    }

    proptest! {
        #[test]
        fn prop_matches_iff_equal_or_dotted_prefix(
            registered in "[a-c]{1,3}(\\.[a-c]{1,3}){0,2}",
            fired in "[a-c]{1,3}(\\.[a-c]{1,3}){0,3}",
        ) {
            let expected = fired == registered || fired.starts_with(&format!("{registered}."));
            prop_assert_eq!(matches(&registered, &fired), expected);
        }
    }
}
