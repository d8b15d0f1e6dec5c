use super::*;
use crate::context::SearchContext;
use crate::decl::DeclarationStore;
use crate::union::union;

const HEADER: [u8; 4] = [0, 0, 0, 0];

fn primitive_bytes(kind: PrimitiveKind) -> Vec<u8> {
    let mut bytes = vec![TyKind::Primitive as u8];
    bytes.extend_from_slice(&HEADER);
    bytes.push(kind as u8);
    bytes
}

fn sample_types(interner: &TypeInterner) -> Vec<TypeId> {
    let t = interner.generic_param("T", "T", Some(TypeId::TABLE));
    let name = interner.intern_string("name");
    let main = Signature::new(
        vec![
            ParamInfo::new(name, t),
            ParamInfo::untyped(interner.intern_string("opts")).optional(),
        ],
        Some(interner.multiple_results([t, TypeId::STRING], true)),
    )
    .with_generic_params(vec![t])
    .with_variadic(TypeId::NUMBER)
    .with_colon_call(true);
    let overload = Signature::new(Vec::new(), None);

    vec![
        TypeId::UNKNOWN,
        TypeId::NIL,
        TypeId::VOID,
        TypeId::BOOLEAN,
        interner.string_literal("say \"hi\"\n"),
        interner.number_literal("42"),
        interner.array(interner.array(TypeId::STRING)),
        interner.class_ref("Player"),
        interner.self_class("Player"),
        interner.table_literal("@table 1:3"),
        interner.alias("Pair", vec![t], interner.array(t)),
        interner.union_normalized([TypeId::STRING, TypeId::NIL, interner.class_ref("Player")].into_iter().collect()),
        interner.generic(interner.class_ref("Map"), [TypeId::STRING, TypeId::NUMBER]),
        interner.function(main, vec![overload], TyFlags::SELF_FUNCTION),
        interner.multiple_results(Vec::new(), false),
        t,
        interner.snippet("-- raw"),
    ]
}

#[test]
fn test_round_trip_returns_same_handle() {
    let interner = TypeInterner::new();
    for ty in sample_types(&interner) {
        let bytes = encode(&interner, ty);
        assert_eq!(decode(&interner, &bytes), Ok(ty), "{}", interner.display_name(ty));
    }
}

#[test]
fn test_round_trip_into_another_interner() {
    let interner = TypeInterner::new();
    let other = TypeInterner::new();
    for ty in sample_types(&interner) {
        let bytes = encode(&interner, ty);
        let decoded = decode(&other, &bytes).unwrap();
        assert_eq!(other.display_name(decoded), interner.display_name(ty));
        assert_eq!(other.flags(decoded), interner.flags(ty));
        assert_eq!(encode(&other, decoded), bytes);
    }
}

#[test]
fn test_primitive_layout() {
    let interner = TypeInterner::new();
    assert_eq!(encode(&interner, TypeId::NUMBER), primitive_bytes(PrimitiveKind::Number));
    assert_eq!(encode(&interner, TypeId::NIL), vec![TyKind::Nil as u8, 0, 0, 0, 0]);
}

#[test]
fn test_union_renormalized_on_decode() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);

    // Members written out of order.
    let mut bytes = vec![TyKind::Union as u8];
    bytes.extend_from_slice(&HEADER);
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend(primitive_bytes(PrimitiveKind::String));
    bytes.extend(primitive_bytes(PrimitiveKind::Number));
    assert_eq!(
        decode(&interner, &bytes),
        Ok(union(&ctx, TypeId::NUMBER, TypeId::STRING))
    );

    // Duplicate members collapse.
    let mut bytes = vec![TyKind::Union as u8];
    bytes.extend_from_slice(&HEADER);
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend(primitive_bytes(PrimitiveKind::String));
    bytes.extend(primitive_bytes(PrimitiveKind::String));
    assert_eq!(decode(&interner, &bytes), Ok(TypeId::STRING));
}

#[test]
fn test_truncated_input() {
    let interner = TypeInterner::new();
    let bytes = encode(&interner, interner.array(TypeId::NUMBER));
    assert_eq!(decode(&interner, &bytes[..bytes.len() - 1]), Err(DecodeError::Truncated(10)));
    assert_eq!(decode(&interner, &[]), Err(DecodeError::Truncated(0)));

    // A length that cannot fit in the rest of the input.
    let mut bytes = vec![TyKind::Snippet as u8];
    bytes.extend_from_slice(&HEADER);
    bytes.extend_from_slice(&u32::MAX.to_le_bytes());
    assert_eq!(decode(&interner, &bytes), Err(DecodeError::Truncated(5)));
}

#[test]
fn test_bad_tags() {
    let interner = TypeInterner::new();
    assert_eq!(
        decode(&interner, &[42]),
        Err(DecodeError::BadTag {
            what: "kind",
            tag: 42,
            offset: 0
        })
    );

    let mut bytes = primitive_bytes(PrimitiveKind::Number);
    bytes[5] = 9;
    assert_eq!(
        decode(&interner, &bytes),
        Err(DecodeError::BadTag {
            what: "primitive",
            tag: 9,
            offset: 5
        })
    );
}

#[test]
fn test_bad_utf8() {
    let interner = TypeInterner::new();
    let mut bytes = vec![TyKind::Snippet as u8];
    bytes.extend_from_slice(&HEADER);
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&[0xff, 0xfe]);
    assert_eq!(decode(&interner, &bytes), Err(DecodeError::BadUtf8(9)));
}

#[test]
fn test_trailing_bytes() {
    let interner = TypeInterner::new();
    let mut bytes = encode(&interner, TypeId::NUMBER);
    bytes.extend_from_slice(&[0, 0]);
    assert_eq!(decode(&interner, &bytes), Err(DecodeError::TrailingBytes(2)));
}

#[test]
fn test_nesting_limit() {
    let interner = TypeInterner::new();
    let mut bytes = Vec::new();
    for _ in 0..MAX_DECODE_DEPTH + 10 {
        bytes.push(TyKind::Array as u8);
        bytes.extend_from_slice(&HEADER);
    }
    bytes.extend(primitive_bytes(PrimitiveKind::Number));
    assert_eq!(decode(&interner, &bytes), Err(DecodeError::TooDeep));

    let mut nested = TypeId::NUMBER;
    for _ in 0..MAX_DECODE_DEPTH - 1 {
        nested = interner.array(nested);
    }
    assert_eq!(decode(&interner, &encode(&interner, nested)), Ok(nested));
}
