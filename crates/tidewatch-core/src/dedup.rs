use sha2::{Digest, Sha256};

use crate::tags::Tags;

/// Computes the SHA-256 dedup key over `name | timestamp_ms | device_id |
/// sorted(tags)`.
///
/// The byte layout uses length-prefixed fields and an explicit separator so
/// that e.g. `name="a", device_id="bc"` cannot collide with
/// `name="ab", device_id="c"` — a classic concatenation pitfall.
pub fn dedup_key(name: &str, timestamp_ms: i64, device_id: &str, tags: &Tags) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hash_field(&mut hasher, name.as_bytes());
    hasher.update(timestamp_ms.to_be_bytes());
    hash_field(&mut hasher, device_id.as_bytes());
    let tag_count = tags.len() as u32;
    hasher.update(tag_count.to_be_bytes());
    for (key, value) in tags.iter() {
        hash_field(&mut hasher, key.as_bytes());
        hash_field(&mut hasher, value.as_bytes());
    }
    hasher.finalize().into()
}

fn hash_field(hasher: &mut Sha256, field: &[u8]) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_order_does_not_affect_key() {
        let a = Tags::from_pairs([("b", "2"), ("a", "1")]);
        let b = Tags::from_pairs([("a", "1"), ("b", "2")]);
        assert_eq!(
            dedup_key("cpu.usage_percent", 1, "d1", &a),
            dedup_key("cpu.usage_percent", 1, "d1", &b)
        );
    }

    #[test]
    fn field_boundary_does_not_collide() {
        let a = dedup_key("ab", 1, "c", &Tags::new());
        let b = dedup_key("a", 1, "bc", &Tags::new());
        assert_ne!(a, b);
    }

    proptest::proptest! {
        #[test]
        fn any_tag_permutation_matches(
            mut pairs in proptest::collection::vec(("[a-z]{1,6}", "[a-z0-9]{0,6}"), 0..8)
        ) {
            pairs.dedup_by(|a, b| a.0 == b.0);
            let forward = Tags::from_pairs(pairs.clone());
            pairs.reverse();
            let backward = Tags::from_pairs(pairs);
            proptest::prop_assert_eq!(
                dedup_key("m", 0, "d", &forward),
                dedup_key("m", 0, "d", &backward)
            );
        }
    }
}
