//! Stable hashing for rollouts and confidential fingerprints

use crate::error::Result;
use md5::{Digest, Md5};
use std::io::Cursor;

/// Divisor mapping a 32-bit hash into `[0, 1)`. Shared by every SDK.
pub const HASH_DIVISOR: f64 = 4_294_967_294.0;

/// Murmur3 x86 32-bit, seed 0, over the UTF-8 bytes of `input`.
pub fn stable_hash32(input: &str) -> Result<u32> {
    Ok(murmur3::murmur3_32(&mut Cursor::new(input.as_bytes()), 0)?)
}

/// Deterministic rollout position for a config key and a context value.
pub fn user_percent(key: &str, value: &str) -> Result<f64> {
    let hash = stable_hash32(&format!("{}{}", key, value))?;
    Ok(hash as f64 / HASH_DIVISOR)
}

/// Pick the entry `position` falls into. Entries are walked in order with a
/// running sum; if every weight is zero the last entry wins.
pub fn variant_index(weights: &[i32], position: f64) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }

    let total: f64 = weights.iter().map(|w| *w as f64).sum();
    let bucket = position * total;

    let mut sum = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        let weight = *weight as f64;
        if bucket < sum + weight {
            return Some(index);
        }
        sum += weight;
    }

    Some(weights.len() - 1)
}

/// `*****` followed by the last five hex digits of the payload's md5.
pub fn make_confidential(raw: &str) -> String {
    let digest = hex::encode(Md5::digest(raw.as_bytes()));
    format!("*****{}", &digest[digest.len() - 5..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_stable_hash_known_values() {
        assert_eq!(stable_hash32("").unwrap(), 0);
        assert_eq!(stable_hash32("hello").unwrap(), 0x248b_fa47);
    }

    #[test]
    fn test_user_percent_in_unit_interval() {
        let p = user_percent("rollout.flag", "user-1").unwrap();
        assert!((0.0..1.0).contains(&p));
        assert_eq!(p, user_percent("rollout.flag", "user-1").unwrap());
    }

    #[test]
    fn test_variant_index() {
        assert_eq!(variant_index(&[90, 10], 0.0), Some(0));
        assert_eq!(variant_index(&[90, 10], 0.89), Some(0));
        assert_eq!(variant_index(&[90, 10], 0.9), Some(1));
        assert_eq!(variant_index(&[0, 100], 0.0), Some(1));
        assert_eq!(variant_index(&[0, 0, 0], 0.5), Some(2));
        assert_eq!(variant_index(&[], 0.5), None);
    }

    #[test]
    fn test_make_confidential() {
        assert_eq!(make_confidential("For British Eyes Only"), "*****b9002");
        assert_eq!(
            make_confidential("8933c39f7f73b6e815dfbe--b3f5216809e719efd8803dad--b16761b9418d8145a98f88a631681298"),
            "*****cda9e"
        );
    }

    proptest! {
        #[test]
        fn prop_variant_index_in_bounds(
            weights in proptest::collection::vec(0i32..1000, 1..8),
            position in 0.0f64..1.0,
        ) {
            let index = variant_index(&weights, position).unwrap();
            prop_assert!(index < weights.len());
        }

        #[test]
        fn prop_user_percent_is_deterministic(key in "[a-z.]{1,20}", value in "\\PC{0,20}") {
            let first = user_percent(&key, &value).unwrap();
            let second = user_percent(&key, &value).unwrap();
            prop_assert_eq!(first, second);
            prop_assert!((0.0..1.0).contains(&first));
        }
    }
}
