use proptest::prelude::*;
use retrain_trainer::{parse_fixed, shuffled_indices, LcgRng};

proptest! {
    #[test]
    fn shuffle_is_always_a_permutation(n in 0usize..500, seed in any::<u64>()) {
        let mut indices = shuffled_indices(n, seed);
        prop_assert_eq!(indices.len(), n);
        indices.sort_unstable();
        prop_assert!(indices.iter().enumerate().all(|(i, &v)| i == v));
    }

    #[test]
    fn next_below_stays_in_range(seed in any::<u64>(), bound in 1u64..1_000_000) {
        let mut rng = LcgRng::new(seed);
        for _ in 0..32 {
            prop_assert!(rng.next_below(bound) < bound);
        }
    }

    #[test]
    fn integers_parse_exactly(value in -1_000_000i64..1_000_000) {
        prop_assert_eq!(parse_fixed(&value.to_string()), Some(value * 1_000_000));
    }
}
