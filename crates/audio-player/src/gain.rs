//! Gain stage: in-place linear scaling of interleaved `i16` samples.

/// Scale every sample by `gain`, truncating toward zero and saturating at the `i16` range.
///
/// Unity gain leaves the buffer untouched.
pub fn apply_gain(samples: &mut [i16], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for s in samples.iter_mut() {
        // `as i32` truncates and saturates on out-of-range floats.
        let v = (*s as f32 * gain) as i32;
        *s = v.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_overflow_clamps() {
        let mut s = [30_000i16];
        apply_gain(&mut s, 1.5);
        assert_eq!(s, [32_767]);
    }

    #[test]
    fn negative_overflow_clamps() {
        let mut s = [-30_000i16];
        apply_gain(&mut s, 1.5);
        assert_eq!(s, [-32_768]);
    }

    #[test]
    fn unity_gain_is_a_no_op() {
        let original = [i16::MIN, -1, 0, 1, i16::MAX];
        let mut s = original;
        apply_gain(&mut s, 1.0);
        assert_eq!(s, original);
    }

    #[test]
    fn attenuation_truncates_toward_zero() {
        let mut s = [101i16, -101, 3, -3];
        apply_gain(&mut s, 0.5);
        assert_eq!(s, [50, -50, 1, -1]);
    }

    #[test]
    fn gain_at_most_one_never_clamps_or_flips_sign() {
        let gains = [0.0f32, 0.1, 0.33, 0.5, 0.75, 0.999, 1.0];
        let samples: Vec<i16> = (i16::MIN..=i16::MAX).step_by(97).chain([i16::MAX]).collect();
        for g in gains {
            let mut out = samples.clone();
            apply_gain(&mut out, g);
            for (before, after) in samples.iter().zip(&out) {
                assert!(after.unsigned_abs() <= before.unsigned_abs(), "g={g} {before}->{after}");
                assert!(*after == 0 || after.signum() == before.signum(), "g={g} {before}->{after}");
                assert_eq!(*after as i32, (*before as f32 * g) as i32);
            }
        }
    }

    #[test]
    fn zero_gain_silences() {
        let mut s = [i16::MIN, 1234, i16::MAX];
        apply_gain(&mut s, 0.0);
        assert_eq!(s, [0, 0, 0]);
    }

    #[test]
    fn large_gain_saturates_both_rails() {
        let mut s = [1i16, -1, 0];
        apply_gain(&mut s, 1.0e9);
        assert_eq!(s, [i16::MAX, i16::MIN, 0]);
    }
}
