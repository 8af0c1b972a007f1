//! Property-based tests for client-side bookmark filtering.
//!
//! The filter is pure and runs on every keystroke in a frontend, so it
//! must behave predictably for arbitrary lists and queries: empty query
//! is the identity, matching is case-insensitive, and results are always
//! an order-preserving subset of the input.

use chrono::Utc;
use proptest::prelude::*;
use uuid::Uuid;

use smartmark::managers::bookmark_store::filter_bookmarks;
use smartmark::types::bookmark::Bookmark;

/// Strategy for generating bookmark titles.
fn arb_title() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 ]{1,20}"
}

/// Strategy for generating URL strings with an http/https scheme.
fn arb_url() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("https"), Just("http")],
        "[a-z][a-z0-9]{2,12}",
        prop_oneof![Just(".com"), Just(".org"), Just(".io")],
    )
        .prop_map(|(scheme, host, tld)| format!("{}://{}{}", scheme, host, tld))
}

fn arb_tags() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z]{1,8}", 0..4)
}

fn arb_bookmark() -> impl Strategy<Value = Bookmark> {
    (arb_title(), arb_url(), arb_tags()).prop_map(|(title, url, tags)| Bookmark {
        id: Uuid::new_v4(),
        user_id: Uuid::from_u128(7),
        title,
        url,
        tags,
        created_at: Utc::now(),
    })
}

fn arb_list() -> impl Strategy<Value = Vec<Bookmark>> {
    proptest::collection::vec(arb_bookmark(), 0..12)
}

// **Property: the empty query is the identity**
//
// *For any* list, filtering with "" returns the list unchanged.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn empty_query_returns_list_unchanged(list in arb_list()) {
        let filtered = filter_bookmarks(&list, "");
        prop_assert_eq!(filtered, list);
    }

    // **Property: results are an order-preserving subset of the input**
    #[test]
    fn results_are_ordered_subset(list in arb_list(), query in "[a-z]{1,5}") {
        let filtered = filter_bookmarks(&list, &query);

        let input_ids: Vec<Uuid> = list.iter().map(|b| b.id).collect();
        let mut cursor = 0usize;
        for hit in &filtered {
            let position = input_ids[cursor..]
                .iter()
                .position(|id| *id == hit.id)
                .map(|offset| cursor + offset);
            prop_assert!(
                position.is_some(),
                "result {} is not in the input after position {}",
                hit.id,
                cursor
            );
            cursor = position.unwrap() + 1;
        }
    }

    // **Property: matching ignores case**
    //
    // *For any* list and query, uppercasing the query never changes the
    // result set.
    #[test]
    fn query_case_does_not_matter(list in arb_list(), query in "[a-zA-Z]{1,6}") {
        let lower = filter_bookmarks(&list, &query.to_lowercase());
        let upper = filter_bookmarks(&list, &query.to_uppercase());
        prop_assert_eq!(lower, upper);
    }

    // **Property: a bookmark's full title always finds it**
    #[test]
    fn full_title_query_finds_the_bookmark(
        list in arb_list(),
        needle in arb_bookmark(),
    ) {
        let mut list = list;
        list.push(needle.clone());

        let filtered = filter_bookmarks(&list, &needle.title);
        prop_assert!(
            filtered.iter().any(|b| b.id == needle.id),
            "searching for the exact title '{}' should find the bookmark",
            needle.title
        );
    }

    // **Property: filtering is idempotent**
    //
    // Filtering an already-filtered list with the same query changes
    // nothing.
    #[test]
    fn filtering_twice_changes_nothing(list in arb_list(), query in "[a-z]{0,5}") {
        let once = filter_bookmarks(&list, &query);
        let twice = filter_bookmarks(&once, &query);
        prop_assert_eq!(once, twice);
    }

    // **Property: a tag match is sufficient on its own**
    #[test]
    fn tag_queries_match(list in arb_list()) {
        for bookmark in &list {
            for tag in &bookmark.tags {
                let filtered = filter_bookmarks(&list, tag);
                prop_assert!(
                    filtered.iter().any(|b| b.id == bookmark.id),
                    "bookmark {} should match its own tag '{}'",
                    bookmark.id,
                    tag
                );
            }
        }
    }
}
