use super::*;
use crate::decl::{ClassDecl, DeclarationStore};
use crate::intern::TypeInterner;
use crate::settings::SolverSettings;
use crate::types::{MemberInfo, ParamInfo};

fn shape(store: &DeclarationStore, interner: &TypeInterner, name: &str, members: &[(&str, TypeId)]) {
    store.register_class(
        ClassDecl::new(interner.intern_string(name))
            .with_flags(TyFlags::SHAPE)
            .with_members(
                members
                    .iter()
                    .map(|(key, ty)| MemberInfo::named(interner.intern_string(key), *ty)),
            ),
    );
}

fn subclass(store: &DeclarationStore, interner: &TypeInterner, name: &str, super_name: &str) {
    store.register_class(
        ClassDecl::new(interner.intern_string(name)).with_super(interner.class_ref(super_name)),
    );
}

#[test]
fn test_reflexive() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let types = [
        TypeId::UNKNOWN,
        TypeId::NIL,
        TypeId::STRING,
        interner.string_literal("a"),
        interner.array(TypeId::NUMBER),
        interner.class_ref("Player"),
        interner.generic(TypeId::TABLE, [TypeId::STRING, TypeId::NUMBER]),
        interner.multiple_results([TypeId::NUMBER, TypeId::STRING], false),
    ];

    for ty in types {
        assert!(contravariant_of(&ctx, ty, ty, VarianceFlags::STRICT_UNKNOWN));
        assert!(equals(&ctx, ty, ty));
    }
}

#[test]
fn test_unknown_source_depends_on_strict_unknown() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let targets = [
        TypeId::STRING,
        interner.string_literal("a"),
        interner.array(TypeId::STRING),
        interner.class_ref("Player"),
    ];

    for target in targets {
        assert!(contravariant_of(&ctx, target, TypeId::UNKNOWN, VarianceFlags::empty()));
        assert!(!contravariant_of(
            &ctx,
            target,
            TypeId::UNKNOWN,
            VarianceFlags::STRICT_UNKNOWN
        ));
    }
}

#[test]
fn test_nil_source_depends_on_strictness() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let lenient = SearchContext::new(&interner, &store);
    let strict = SearchContext::new(&interner, &store)
        .with_settings(SolverSettings::default().with_strict_nil(true));

    assert!(contravariant_of(&lenient, TypeId::STRING, TypeId::NIL, VarianceFlags::empty()));
    assert!(!contravariant_of(&lenient, TypeId::STRING, TypeId::NIL, VarianceFlags::STRICT_NIL));
    assert!(!contravariant_of(&strict, TypeId::STRING, TypeId::NIL, VarianceFlags::empty()));

    let optional = union(&strict, TypeId::STRING, TypeId::NIL);
    assert!(contravariant_of(&strict, optional, TypeId::NIL, VarianceFlags::empty()));
}

#[test]
fn test_literals() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let a = interner.string_literal("a");
    let b = interner.string_literal("b");

    assert!(contravariant_of(&ctx, TypeId::STRING, a, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, a, TypeId::STRING, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, a, b, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, TypeId::NUMBER, a, VarianceFlags::empty()));
}

#[test]
fn test_union_target_and_source() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let either = union(&ctx, TypeId::NUMBER, TypeId::STRING);

    assert!(contravariant_of(&ctx, either, interner.string_literal("a"), VarianceFlags::empty()));
    assert!(contravariant_of(&ctx, either, TypeId::NUMBER, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, either, TypeId::BOOLEAN, VarianceFlags::empty()));

    // Every member of a union source has to fit.
    assert!(!contravariant_of(&ctx, TypeId::STRING, either, VarianceFlags::empty()));
    let maybe = union(&ctx, TypeId::STRING, TypeId::NIL);
    assert!(contravariant_of(&ctx, TypeId::STRING, maybe, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, TypeId::STRING, maybe, VarianceFlags::STRICT_NIL));
}

#[test]
fn test_legacy_function_and_table_widening() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let function = interner.signature_function(Signature::new(Vec::new(), None));
    let player = interner.class_ref("Player");
    let strings = interner.array(TypeId::STRING);

    assert!(contravariant_of(&ctx, TypeId::FUNCTION, function, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, TypeId::FUNCTION, function, VarianceFlags::STRICT_UNKNOWN));
    assert!(contravariant_of(&ctx, TypeId::TABLE, player, VarianceFlags::empty()));
    assert!(contravariant_of(&ctx, TypeId::TABLE, strings, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, TypeId::TABLE, TypeId::STRING, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, TypeId::TABLE, strings, VarianceFlags::STRICT_UNKNOWN));
}

#[test]
fn test_nominal_classes_follow_super_chain() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    subclass(&store, &interner, "Dog", "Animal");
    subclass(&store, &interner, "Puppy", "Dog");
    let ctx = SearchContext::new(&interner, &store);
    let animal = interner.class_ref("Animal");
    let puppy = interner.class_ref("Puppy");

    assert!(contravariant_of(&ctx, animal, puppy, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, puppy, animal, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, animal, interner.class_ref("Cat"), VarianceFlags::empty()));
}

#[test]
fn test_super_class_cycle_terminates() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    subclass(&store, &interner, "A", "B");
    subclass(&store, &interner, "B", "A");
    let ctx = SearchContext::new(&interner, &store);

    assert!(!contravariant_of(
        &ctx,
        interner.class_ref("C"),
        interner.class_ref("A"),
        VarianceFlags::empty()
    ));
}

#[test]
fn test_unknown_flagged_class_accepts_anything() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    store.register_class(
        ClassDecl::new(interner.intern_string("Opaque")).with_flags(TyFlags::UNKNOWN),
    );
    let ctx = SearchContext::new(&interner, &store);
    let opaque = interner.class_ref("Opaque");

    assert!(contravariant_of(&ctx, opaque, TypeId::STRING, VarianceFlags::STRICT_UNKNOWN));
    assert!(!contravariant_of(
        &ctx,
        opaque,
        interner.multiple_results([TypeId::STRING, TypeId::NUMBER], false),
        VarianceFlags::empty()
    ));
}

#[test]
fn test_alias_target() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let alias = interner.alias("Name", Vec::new(), TypeId::STRING);
    store.register_alias(interner.intern_string("Name"), alias);
    let ctx = SearchContext::new(&interner, &store);
    let name = interner.class_ref("Name");

    assert!(contravariant_of(&ctx, name, interner.string_literal("x"), VarianceFlags::empty()));
    assert!(contravariant_of(&ctx, TypeId::STRING, name, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, name, TypeId::NUMBER, VarianceFlags::empty()));
    assert!(equals(&ctx, alias, TypeId::STRING));
    assert!(equals(&ctx, name, TypeId::STRING));
}

#[test]
fn test_arrays() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let strings = interner.array(TypeId::STRING);
    let letters = interner.array(interner.string_literal("a"));

    assert!(!contravariant_of(&ctx, strings, letters, VarianceFlags::empty()));
    assert!(contravariant_of(&ctx, strings, letters, VarianceFlags::WIDEN_TABLES));
    assert!(!contravariant_of(&ctx, strings, interner.array(TypeId::NUMBER), VarianceFlags::WIDEN_TABLES));
}

#[test]
fn test_array_accepts_array_shaped_table() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let indexed = |name: &str, entries: &[(&str, TypeId)]| {
        store.register_class(
            ClassDecl::new(interner.intern_string(name))
                .with_flags(TyFlags::SHAPE)
                .with_members(entries.iter().map(|(key, ty)| {
                    MemberInfo::indexed(interner.number_literal(key), *ty)
                })),
        );
        interner.doc_table(name)
    };
    let dense = indexed(
        "@dense",
        &[("1", TypeId::STRING), ("2", TypeId::STRING), ("3", TypeId::STRING)],
    );
    let mixed = indexed("@mixed", &[("1", TypeId::STRING), ("2", TypeId::NUMBER)]);
    let sparse = indexed("@sparse", &[("1", TypeId::STRING), ("3", TypeId::STRING)]);
    let ctx = SearchContext::new(&interner, &store);
    let strings = interner.array(TypeId::STRING);

    assert!(contravariant_of(&ctx, strings, dense, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, strings, mixed, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, strings, sparse, VarianceFlags::empty()));
}

#[test]
fn test_table_generic_arguments_are_invariant() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let target = interner.generic(TypeId::TABLE, [TypeId::STRING, TypeId::NUMBER]);
    let loose = interner.generic(TypeId::TABLE, [TypeId::STRING, TypeId::UNKNOWN]);
    let narrow = interner.generic(TypeId::TABLE, [TypeId::STRING, interner.number_literal("1")]);

    assert!(contravariant_of(&ctx, target, loose, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, target, loose, VarianceFlags::STRICT_UNKNOWN));
    assert!(!contravariant_of(&ctx, target, narrow, VarianceFlags::empty()));
}

#[test]
fn test_table_generic_accepts_arrays() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let by_number = interner.generic(TypeId::TABLE, [TypeId::NUMBER, TypeId::STRING]);
    let by_string = interner.generic(TypeId::TABLE, [TypeId::STRING, TypeId::STRING]);
    let strings = interner.array(TypeId::STRING);

    assert!(contravariant_of(&ctx, by_number, strings, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, by_string, strings, VarianceFlags::empty()));
}

#[test]
fn test_table_generic_accepts_shape_through_synthesized_table() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    shape(&store, &interner, "@config", &[("host", TypeId::STRING), ("path", TypeId::STRING)]);
    let ctx = SearchContext::new(&interner, &store);
    let config = interner.doc_table("@config");
    let dictionary = interner.generic(TypeId::TABLE, [TypeId::STRING, TypeId::STRING]);

    assert!(contravariant_of(&ctx, dictionary, config, VarianceFlags::WIDEN_TABLES));
    assert!(!contravariant_of(&ctx, dictionary, config, VarianceFlags::empty()));
}

#[test]
fn test_generic_class_arguments() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let param = interner.generic_param("T", "T", None);
    store.register_class(ClassDecl::new(interner.intern_string("List")).with_params(vec![param]));
    let ctx = SearchContext::new(&interner, &store);
    let list = interner.class_ref("List");
    let strings = interner.generic(list, [TypeId::STRING]);
    let letters = interner.generic(list, [interner.string_literal("a")]);
    let abstract_list = interner.generic(list, [param]);

    assert!(!contravariant_of(&ctx, strings, letters, VarianceFlags::empty()));
    assert!(contravariant_of(&ctx, abstract_list, strings, VarianceFlags::ABSTRACT_PARAMS));
    assert!(!contravariant_of(&ctx, abstract_list, strings, VarianceFlags::empty()));
}

#[test]
fn test_generic_param_with_abstract_params() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let bounded = interner.generic_param("T", "T", Some(TypeId::STRING));
    let free = interner.generic_param("U", "U", None);

    assert!(contravariant_of(&ctx, bounded, interner.string_literal("a"), VarianceFlags::ABSTRACT_PARAMS));
    assert!(!contravariant_of(&ctx, bounded, TypeId::NUMBER, VarianceFlags::ABSTRACT_PARAMS));
    assert!(contravariant_of(&ctx, free, TypeId::NUMBER, VarianceFlags::ABSTRACT_PARAMS));
    assert!(!contravariant_of(&ctx, free, TypeId::NUMBER, VarianceFlags::empty()));
}

#[test]
fn test_shape_width_subtyping() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    shape(&store, &interner, "@named", &[("name", TypeId::STRING)]);
    store.register_class(
        ClassDecl::new(interner.intern_string("@literal"))
            .with_flags(TyFlags::ANONYMOUS_TABLE | TyFlags::SHAPE)
            .with_member(MemberInfo::named(
                interner.intern_string("name"),
                interner.string_literal("x"),
            ))
            .with_member(MemberInfo::named(interner.intern_string("age"), TypeId::NUMBER)),
    );
    let ctx = SearchContext::new(&interner, &store);
    let target = interner.doc_table("@named");
    let source = interner.table_literal("@literal");

    assert!(contravariant_of(&ctx, target, source, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, source, target, VarianceFlags::empty()));
    assert!(!equals(&ctx, target, source));
}

#[test]
fn test_shape_missing_member() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    shape(&store, &interner, "@person", &[("name", TypeId::STRING), ("age", TypeId::NUMBER)]);
    shape(&store, &interner, "@partial", &[("name", TypeId::STRING)]);
    let ctx = SearchContext::new(&interner, &store);

    assert!(!contravariant_of(
        &ctx,
        interner.doc_table("@person"),
        interner.doc_table("@partial"),
        VarianceFlags::empty()
    ));
}

#[test]
fn test_shape_optional_member_may_be_absent() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx_union = {
        let ctx = SearchContext::new(&interner, &store);
        union(&ctx, TypeId::NUMBER, TypeId::NIL)
    };
    shape(&store, &interner, "@person", &[("name", TypeId::STRING), ("age", ctx_union)]);
    shape(&store, &interner, "@partial", &[("name", TypeId::STRING)]);
    let ctx = SearchContext::new(&interner, &store);

    assert!(contravariant_of(
        &ctx,
        interner.doc_table("@person"),
        interner.doc_table("@partial"),
        VarianceFlags::empty()
    ));
}

#[test]
fn test_non_structural_ignores_declared_shapes() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    shape(&store, &interner, "@a", &[("x", TypeId::NUMBER)]);
    shape(&store, &interner, "@b", &[("x", TypeId::NUMBER), ("y", TypeId::NUMBER)]);
    let ctx = SearchContext::new(&interner, &store);
    let a = interner.doc_table("@a");
    let b = interner.doc_table("@b");

    assert!(contravariant_of(&ctx, a, b, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, a, b, VarianceFlags::NON_STRUCTURAL));
}

#[test]
fn test_recursive_shapes_terminate() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    shape(&store, &interner, "@node_a", &[("next", interner.doc_table("@node_a"))]);
    shape(&store, &interner, "@node_b", &[("next", interner.doc_table("@node_b"))]);
    let ctx = SearchContext::new(&interner, &store);
    let a = interner.doc_table("@node_a");
    let b = interner.doc_table("@node_b");

    assert!(contravariant_of(&ctx, a, b, VarianceFlags::empty()));
    assert!(equals(&ctx, a, b));
}

#[test]
fn test_function_parameters_are_contravariant() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    subclass(&store, &interner, "Dog", "Animal");
    let ctx = SearchContext::new(&interner, &store);
    let param = interner.intern_string("pet");
    let takes = |ty: TypeId| {
        interner.signature_function(Signature::new(vec![ParamInfo::new(param, ty)], None))
    };
    let takes_animal = takes(interner.class_ref("Animal"));
    let takes_dog = takes(interner.class_ref("Dog"));

    assert!(!contravariant_of(&ctx, takes_animal, takes_dog, VarianceFlags::empty()));
    assert!(contravariant_of(&ctx, takes_dog, takes_animal, VarianceFlags::empty()));
}

#[test]
fn test_function_returns_are_covariant() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let returns = |ty: TypeId| interner.signature_function(Signature::new(Vec::new(), Some(ty)));

    assert!(contravariant_of(
        &ctx,
        returns(TypeId::STRING),
        returns(interner.string_literal("a")),
        VarianceFlags::empty()
    ));
    assert!(!contravariant_of(
        &ctx,
        returns(TypeId::STRING),
        returns(TypeId::NUMBER),
        VarianceFlags::empty()
    ));
}

#[test]
fn test_function_type_accepts_bare_function_only_when_open() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let open = interner.signature_function(Signature::new(Vec::new(), None).with_variadic(TypeId::UNKNOWN));
    let closed = interner.signature_function(Signature::new(
        vec![ParamInfo::new(interner.intern_string("x"), TypeId::NUMBER)],
        None,
    ));

    assert!(contravariant_of(&ctx, open, TypeId::FUNCTION, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, closed, TypeId::FUNCTION, VarianceFlags::empty()));
}

#[test]
fn test_multiple_results_positions() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let pair = interner.multiple_results([TypeId::NUMBER, TypeId::STRING], false);
    let triple =
        interner.multiple_results([TypeId::NUMBER, TypeId::STRING, TypeId::BOOLEAN], false);
    let single = interner.multiple_results([TypeId::NUMBER], false);
    let numbers = interner.multiple_results([TypeId::NUMBER], true);
    let two_numbers = interner.multiple_results([TypeId::NUMBER, TypeId::NUMBER], false);

    assert!(contravariant_of(&ctx, pair, triple, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, pair, single, VarianceFlags::empty()));
    assert!(contravariant_of(&ctx, numbers, two_numbers, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, numbers, pair, VarianceFlags::empty()));
    assert!(!contravariant_of(&ctx, pair, numbers, VarianceFlags::empty()));
    assert!(contravariant_of(&ctx, single, TypeId::NUMBER, VarianceFlags::empty()));
}

#[test]
fn test_equals_is_semantic() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    shape(&store, &interner, "@left", &[("x", TypeId::NUMBER)]);
    shape(&store, &interner, "@right", &[("x", TypeId::NUMBER)]);
    shape(&store, &interner, "@other", &[("x", TypeId::STRING)]);
    let ctx = SearchContext::new(&interner, &store);

    assert!(equals(&ctx, interner.doc_table("@left"), interner.doc_table("@right")));
    assert!(!equals(&ctx, interner.doc_table("@left"), interner.doc_table("@other")));
    assert!(equals(
        &ctx,
        interner.array(TypeId::STRING),
        interner.array(TypeId::STRING)
    ));
    assert!(!equals(&ctx, TypeId::STRING, interner.string_literal("a")));
    assert!(!equals(&ctx, interner.snippet("x"), interner.snippet("y")));
}
