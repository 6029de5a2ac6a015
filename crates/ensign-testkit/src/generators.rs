//! Proptest strategies for property-based testing.

use proptest::prelude::*;

/// Arbitrary message payloads, including the empty one.
pub fn payload() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..256)
}

/// Key identifiers: short, possibly empty byte strings.
pub fn kid() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..16)
}

/// Symmetric key material of an exact length.
pub fn key_bytes(len: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), len..=len)
}

/// External AAD: empty most of the time, as in practice.
pub fn external_aad() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        3 => Just(Vec::new()),
        1 => proptest::collection::vec(any::<u8>(), 1..64),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn key_bytes_have_exact_length(k in key_bytes(32)) {
            prop_assert_eq!(k.len(), 32);
        }

        #[test]
        fn payload_is_bounded(p in payload()) {
            prop_assert!(p.len() < 256);
        }
    }
}
