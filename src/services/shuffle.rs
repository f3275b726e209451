use rand::Rng;

/// Fisher-Yates over a copy of the input. The swap range is inclusive, so
/// every permutation is equally likely and an element may stay in place.
pub(crate) fn shuffle<T: Clone>(items: &[T], rng: &mut impl Rng) -> Vec<T> {
    let mut out = items.to_vec();
    for i in (1..out.len()).rev() {
        let j = rng.gen_range(0..=i);
        out.swap(i, j);
    }
    out
}

/// Opaque identifier for one selectable answer unit: 8 random bytes as 16
/// hex chars. Regenerated on every materialization so tokens never survive
/// across sessions.
pub(crate) fn generate_token(rng: &mut impl Rng) -> String {
    let bytes: [u8; 8] = rng.gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn shuffle_preserves_elements() {
        let mut rng = StdRng::seed_from_u64(7);
        let input: Vec<u32> = (0..50).collect();
        let mut shuffled = shuffle(&input, &mut rng);
        shuffled.sort_unstable();
        assert_eq!(shuffled, input);
    }

    #[test]
    fn shuffle_does_not_mutate_input() {
        let mut rng = StdRng::seed_from_u64(7);
        let input = vec![1, 2, 3, 4, 5];
        let _ = shuffle(&input, &mut rng);
        assert_eq!(input, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn shuffle_is_deterministic_for_a_seed() {
        let input: Vec<u32> = (0..20).collect();
        let a = shuffle(&input, &mut StdRng::seed_from_u64(42));
        let b = shuffle(&input, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn shuffle_permutes_with_different_seeds() {
        let input: Vec<u32> = (0..20).collect();
        let a = shuffle(&input, &mut StdRng::seed_from_u64(1));
        let b = shuffle(&input, &mut StdRng::seed_from_u64(2));
        assert_ne!(a, b);
    }

    #[test]
    fn shuffle_handles_empty_and_single() {
        let mut rng = StdRng::seed_from_u64(0);
        let empty: [u8; 0] = [];
        assert!(shuffle(&empty, &mut rng).is_empty());
        assert_eq!(shuffle(&[9], &mut rng), vec![9]);
    }

    #[test]
    fn token_is_sixteen_hex_chars() {
        let mut rng = StdRng::seed_from_u64(3);
        let token = generate_token(&mut rng);
        assert_eq!(token.len(), 16);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_do_not_repeat_within_a_session() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate_token(&mut rng)));
        }
    }
}
