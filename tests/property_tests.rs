//! Property tests for the id type, the keyword codec, the mask algebra,
//! and the crawler walk.

use std::collections::HashSet;

use proptest::prelude::*;
use seqmine::crawler::advance;
use seqmine::keywords;
use seqmine::uid::Uid;

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

proptest! {
    #[test]
    fn prop_uid_round_trip(domain in proptest::char::range('A', 'Z'), number in 0u32..=999_999) {
        let uid = Uid::new(domain, number).unwrap();
        let parsed: Uid = uid.to_string().parse().unwrap();
        prop_assert_eq!(parsed, uid);
    }

    #[test]
    fn prop_uid_order_matches_tuple_order(
        d1 in proptest::char::range('A', 'Z'), n1 in 0u32..=999_999,
        d2 in proptest::char::range('A', 'Z'), n2 in 0u32..=999_999,
    ) {
        let a = Uid::new(d1, n1).unwrap();
        let b = Uid::new(d2, n2).unwrap();
        prop_assert_eq!(a.cmp(&b), (d1, n1).cmp(&(d2, n2)));
    }

    #[test]
    fn prop_keyword_encode_decode_sorts_by_table(subset in proptest::sample::subsequence(
        keywords::KEYWORDS.to_vec(), 0..keywords::KEYWORDS.len()
    )) {
        let mask = keywords::encode(subset.iter().copied()).unwrap();
        let decoded = keywords::decode(mask);
        // Decode returns the subset in table order.
        prop_assert_eq!(decoded, subset);
    }

    #[test]
    fn prop_mask_algebra(a in any::<u64>(), b in any::<u64>()) {
        // has_all(a, b) iff b is a subset of a.
        prop_assert_eq!(keywords::has_all(a, b), a | b == a);
        // has_none(a, b) iff the intersection is empty.
        prop_assert_eq!(keywords::has_none(a, b), a & b == 0);
        // Trivial identities.
        prop_assert!(keywords::has_all(a, 0));
        prop_assert!(keywords::has_all(a, a));
        prop_assert!(keywords::has_none(a, 0));
    }

    #[test]
    fn prop_walk_is_a_permutation(max in 1u32..=512, seed in any::<u64>(), start_seed in any::<u64>()) {
        // Draw a coprime step the way the crawler does.
        let step = (seed % u64::from(max)) as u32 + 1;
        prop_assume!(gcd(step, max) == 1);
        let start = (start_seed % u64::from(max)) as u32 + 1;

        let mut seen = HashSet::new();
        let mut current = start;
        for _ in 0..max {
            current = advance(current, step, max);
            prop_assert!((1..=max).contains(&current));
            prop_assert!(seen.insert(current));
        }
        prop_assert_eq!(seen.len() as u32, max);
        // The cycle closes: the next step returns to the first visit.
        prop_assert_eq!(advance(current, step, max), advance(start, step, max));
    }

    #[test]
    fn prop_encode_rejects_unknown(token in "[a-z]{3,12}") {
        prop_assume!(!keywords::is_known(&token));
        prop_assert!(keywords::encode([token.as_str()]).is_err());
    }
}

#[test]
fn test_unknown_token_error_names_the_token() {
    let err = keywords::encode(["definitely-unknown"]).unwrap_err();
    assert!(err.to_string().contains("definitely-unknown"));
}
