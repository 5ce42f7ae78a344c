/******************************************************************************/
/*                                                                            */
/* SPDX-License-Identifier: MIT                                               */
/* Copyright (c) [2023] Serokell <hi@serokell.io>                             */
/*                                                                            */
/******************************************************************************/

//! Tests that cover several components, including value conversion, both
//! directions of the codec and tree hashing.

/// A list mixing every kind of value the conversion layer handles, checked
/// byte for byte against the encoding produced by the wallet tooling.
#[cfg(test)]
mod test_mixed_list {
    use crate::allocator::{Allocator, SExp};
    use crate::conditions::RunCatTail;
    use crate::value::Value;

    fn public_key() -> [u8; 48] {
        let mut pk = [0u8; 48];
        pk[0] = 0xc0;
        pk
    }

    fn mixed_list() -> Value<'static> {
        Value::List(vec![
            Value::Nil,
            public_key().into(),
            "Hello, world!".into(),
            42.into(),
            100.into(),
            true.into(),
            (&[1u8, 2, 3]).into(),
            [0u8; 32].into(),
            Value::Nil,
            Option::<u32>::None.into(),
            RunCatTail::new(Value::Nil, Value::Nil).into(),
        ])
    }

    fn expected_hex() -> String {
        [
            "ff80",
            &format!("ffb0c0{}", "00".repeat(47)),
            "ff8d48656c6c6f2c20776f726c6421",
            "ff2a",
            "ff64",
            "ff01",
            "ff83010203",
            &format!("ffa0{}", "00".repeat(32)),
            "ff80",
            "ff80",
            "ffff33ff80ff818fff80ff8080",
            "80",
        ]
        .concat()
    }

    #[test]
    fn encodes_to_reference_bytes() {
        let arena = Allocator::new();
        let node = mixed_list().alloc(&arena);
        assert_eq!(node.serialize_hex(), Ok(expected_hex()));
    }

    #[test]
    fn decodes_back() {
        let arena = Allocator::new();
        let expected = mixed_list().alloc(&arena);
        let decoded = arena.deserialize_hex(&expected_hex()).unwrap();
        assert_eq!(decoded, expected);

        let items = decoded.as_list().unwrap();
        assert_eq!(items.len(), 11);
        assert!(items[0].is_nil());
        assert_eq!(items[1].to_native::<[u8; 48]>(), Ok(public_key()));
        assert_eq!(items[2].as_string(), Some("Hello, world!".to_owned()));
        assert_eq!(items[3].as_u64(), Some(42));
        assert_eq!(items[4].as_u64(), Some(100));
        assert_eq!(items[5].as_bool(), Some(true));
        assert_eq!(items[6].as_atom(), Some(&[1u8, 2, 3][..]));
        assert_eq!(items[7].to_native::<[u8; 32]>(), Ok([0; 32]));
        assert_eq!(items[9].to_native::<Option<u32>>(), Ok(None));
        assert_eq!(
            items[10].to_native::<RunCatTail<&SExp, &SExp>>(),
            Ok(RunCatTail::new(arena.nil(), arena.nil()))
        );
    }

    #[test]
    fn strict_decoding_accepts_it() {
        let arena = Allocator::new();
        let bytes = hex::decode(expected_hex()).unwrap();
        let (_, consumed) = arena
            .deserialize_with_limits(&bytes, &crate::DecodeLimits::strict())
            .unwrap();
        assert_eq!(consumed, bytes.len());
    }
}

#[cfg(test)]
mod test_round_trip {
    use proptest::prelude::*;

    use crate::allocator::Allocator;
    use crate::serializer::{serialized_length, DecodeLimits};
    use crate::value::Value;

    fn arb_value() -> impl Strategy<Value = Value<'static>> {
        let leaf = prop_oneof![
            Just(Value::Nil),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            prop::collection::vec(any::<u8>(), 0..200).prop_map(Value::Bytes),
            "[ -~]{0,20}".prop_map(Value::Text),
        ];
        leaf.prop_recursive(
            4,  // max nesting depth
            64, // total size budget
            8,  // branching factor
            |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..8).prop_map(Value::List),
                    (inner.clone(), inner).prop_map(|(a, b)| Value::Pair(Box::new(a), Box::new(b))),
                ]
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn decode_inverts_encode(value in arb_value()) {
            let arena = Allocator::new();
            let node = value.alloc(&arena);
            let bytes = node.serialize().unwrap();
            let (decoded, consumed) = arena.deserialize(&bytes).unwrap();
            prop_assert_eq!(consumed, bytes.len());
            prop_assert_eq!(decoded, node);
            prop_assert_eq!(decoded.serialize().unwrap(), bytes.clone());
            prop_assert_eq!(decoded.tree_hash(), node.tree_hash());
            prop_assert_eq!(serialized_length(&bytes, &DecodeLimits::strict()), Ok(bytes.len()));
        }

        #[test]
        fn concatenated_expressions_split(a in arb_value(), b in arb_value()) {
            let arena = Allocator::new();
            let (a, b) = (a.alloc(&arena), b.alloc(&arena));
            let mut bytes = a.serialize().unwrap();
            let split = bytes.len();
            b.serialize_into(&mut bytes).unwrap();
            let (first, consumed) = arena.deserialize(&bytes).unwrap();
            prop_assert_eq!(consumed, split);
            prop_assert_eq!(first, a);
            prop_assert_eq!(arena.deserialize_exact(&bytes[split..]), Ok(b));
        }

        #[test]
        fn back_references_round_trip(a in arb_value(), b in arb_value()) {
            let arena = Allocator::new();
            let node = Value::List(vec![a.clone(), b, a]).alloc(&arena);
            let plain = node.serialize().unwrap();
            let compressed = node.serialize_with_backrefs().unwrap();
            prop_assert!(compressed.len() <= plain.len());
            let (decoded, consumed) = arena.deserialize_with_backrefs(&compressed).unwrap();
            prop_assert_eq!(consumed, compressed.len());
            prop_assert_eq!(decoded, node);
            // plain encodings are valid back reference encodings too
            let (decoded, _) = arena.deserialize_with_backrefs(&plain).unwrap();
            prop_assert_eq!(decoded, node);
        }

        #[test]
        fn truncation_is_detected(value in arb_value(), cut in any::<prop::sample::Index>()) {
            let arena = Allocator::new();
            let bytes = value.alloc(&arena).serialize().unwrap();
            let cut = cut.index(bytes.len());
            prop_assert_eq!(
                arena.deserialize(&bytes[..cut]).map(|(_, n)| n),
                Err(crate::DecodeError::UnexpectedEndOfInput)
            );
        }
    }
}
