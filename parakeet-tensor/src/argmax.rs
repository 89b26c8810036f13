//! Argmax over a flat f32 slice with NaN-safe tie-breaking.
//!
//! `+inf`, `-inf`, or NaN in inputs must not corrupt downstream state:
//! returns the index of the first non-NaN maximum, or 0 if every entry is
//! NaN.

/// Index of the first occurrence of the maximum value in `values`,
/// ignoring NaN entries. Returns `0` if `values` is empty or every entry
/// is NaN.
pub fn argmax(values: &[f32]) -> usize {
    let mut best_idx = 0;
    let mut best_val = f32::NEG_INFINITY;
    let mut found = false;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if !found || v > best_val {
            best_val = v;
            best_idx = i;
            found = true;
        }
    }

    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slice_returns_zero() {
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn picks_first_maximum_on_tie() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), 1);
    }

    #[test]
    fn single_element() {
        assert_eq!(argmax(&[5.0]), 0);
    }

    #[test]
    fn all_nan_returns_zero() {
        assert_eq!(argmax(&[f32::NAN, f32::NAN, f32::NAN]), 0);
    }

    #[test]
    fn nan_does_not_win_over_real_values() {
        assert_eq!(argmax(&[1.0, f32::NAN, 2.0, f32::NAN]), 2);
    }

    #[test]
    fn nan_is_skipped_even_when_first() {
        assert_eq!(argmax(&[f32::NAN, 7.0, 1.0]), 1);
    }

    #[test]
    fn positive_infinity_wins() {
        assert_eq!(argmax(&[1.0, f32::INFINITY, 2.0]), 1);
    }

    #[test]
    fn negative_infinity_never_wins_unless_alone() {
        assert_eq!(argmax(&[f32::NEG_INFINITY, -5.0]), 1);
    }

    #[test]
    fn all_negative_infinity_picks_first() {
        assert_eq!(argmax(&[f32::NEG_INFINITY, f32::NEG_INFINITY]), 0);
    }

    proptest::proptest! {
        #[test]
        fn argmax_index_is_in_bounds(values in proptest::collection::vec(-1e6f32..1e6, 1..64)) {
            let idx = argmax(&values);
            proptest::prop_assert!(idx < values.len());
        }

        #[test]
        fn argmax_value_is_a_maximum(values in proptest::collection::vec(-1e6f32..1e6, 1..64)) {
            let idx = argmax(&values);
            let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            proptest::prop_assert_eq!(values[idx], max);
        }
    }
}
