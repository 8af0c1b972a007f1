//! Property-based tests for bookmark input normalization.
//!
//! Whatever the user types, the normalized output must be a parseable
//! absolute URL with a host, a non-empty title, and clean tags.

use proptest::prelude::*;
use url::Url;

use smartmark::managers::bookmark_store::{normalize_input, split_tags};

/// Strategy for generating bare hostnames (no scheme).
fn arb_host() -> impl Strategy<Value = String> {
    "[a-z]{3,10}\\.(com|org|io)"
}

/// Strategy for generating hostnames wrapped in stray whitespace.
fn arb_padded_host() -> impl Strategy<Value = (String, String)> {
    (arb_host(), " {0,3}", " {0,3}").prop_map(|(host, lead, trail)| {
        let padded = format!("{}{}{}", lead, host, trail);
        (host, padded)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // **Property: a missing scheme gets https:// prefixed**
    //
    // *For any* bare hostname, the stored URL is exactly the trimmed
    // input behind an https:// prefix.
    #[test]
    fn bare_host_gets_https_prefix((host, padded) in arb_padded_host()) {
        let input = normalize_input("Title", &padded, "").unwrap();
        prop_assert_eq!(input.url, format!("https://{}", host));
    }

    // **Property: an existing scheme is left alone**
    #[test]
    fn existing_scheme_is_preserved(host in arb_host(), https in proptest::bool::ANY) {
        let raw = if https {
            format!("https://{}", host)
        } else {
            format!("http://{}", host)
        };
        let input = normalize_input("Title", &raw, "").unwrap();
        prop_assert_eq!(input.url, raw);
    }

    // **Property: normalized output always parses with a host**
    #[test]
    fn output_is_a_parseable_absolute_url((_, padded) in arb_padded_host()) {
        let input = normalize_input("Title", &padded, "").unwrap();
        let parsed = Url::parse(&input.url).expect("normalized URL must parse");
        prop_assert!(parsed.host_str().is_some());
    }

    // **Property: a blank title falls back to the hostname**
    #[test]
    fn blank_title_becomes_the_host(host in arb_host(), blanks in " {0,4}") {
        let input = normalize_input(&blanks, &host, "").unwrap();
        prop_assert_eq!(input.title, host);
    }

    // **Property: an explicit title survives, trimmed**
    #[test]
    fn explicit_title_is_trimmed(
        host in arb_host(),
        title in "[a-zA-Z][a-zA-Z0-9 ]{0,15}[a-zA-Z0-9]",
    ) {
        let padded = format!("  {}  ", title);
        let input = normalize_input(&padded, &host, "").unwrap();
        prop_assert_eq!(input.title, title);
    }

    // **Property: tags round-trip through a messy join**
    //
    // *For any* tag list, joining with padding and stray extra commas
    // then splitting yields the original tags, duplicates included.
    #[test]
    fn tags_survive_a_messy_join(tags in proptest::collection::vec("[a-c]{1,3}", 0..6)) {
        let joined = tags
            .iter()
            .map(|t| format!(" {} ", t))
            .collect::<Vec<_>>()
            .join(",,");
        prop_assert_eq!(split_tags(&joined), tags);
    }

    // **Property: split tags are never empty or padded**
    #[test]
    fn split_tags_are_clean(raw in "[a-z, ]{0,30}") {
        for tag in split_tags(&raw) {
            prop_assert!(!tag.is_empty());
            prop_assert_eq!(tag.trim(), tag.as_str());
        }
    }
}
