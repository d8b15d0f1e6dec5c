use super::*;
use crate::context::CancellationToken;
use crate::decl::{AliasDecl, ClassDecl, DeclarationProvider, DeclarationStore};
use crate::intern::TypeInterner;
use crate::problems::FastSink;
use crate::types::{MemberInfo, ParamInfo, TyFlags};
use luaty_common::Atom;
use luaty_common::diagnostics::ProblemSeverity;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Route solver logs to the test output; `RUST_LOG=luaty_solver=trace`
/// shows candidate rejections.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn param(interner: &TypeInterner, name: &str, ty: TypeId) -> ParamInfo {
    ParamInfo::new(interner.intern_string(name), ty)
}

fn call(node: u32, args: &[(u32, TypeId)]) -> CallSite {
    args.iter().fold(CallSite::new(NodeId(node)), |site, (arg, ty)| {
        site.with_arg(CallArgument::new(NodeId(*arg), *ty))
    })
}

fn messages(collector: &ProblemCollector) -> Vec<&str> {
    collector
        .problems()
        .iter()
        .map(|problem| problem.message.as_str())
        .collect()
}

#[test]
fn test_overload_selected_by_argument_type() {
    init_tracing();
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let from_number = Signature::new(vec![param(&interner, "x", TypeId::NUMBER)], Some(TypeId::STRING));
    let from_string = Signature::new(vec![param(&interner, "x", TypeId::STRING)], Some(TypeId::NUMBER));
    let main = Signature::new(vec![ParamInfo::untyped(interner.intern_string("x"))], None);
    let callable = interner.function(main, vec![from_number, from_string.clone()], TyFlags::empty());

    let site = call(1, &[(2, TypeId::STRING)]);
    let matched = match_signature(&ctx, callable, &site, &mut FastSink)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());
    assert_eq!(matched.signature, Some(from_string));
    assert_eq!(matched.return_ty, TypeId::NUMBER);
}

#[test]
fn test_undeclared_return_is_unknown_results() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let callable = interner.signature_function(Signature::new(Vec::new(), None));

    let matched = match_signature(&ctx, callable, &call(1, &[]), &mut FastSink)
        .unwrap()
        .unwrap();
    assert_eq!(matched.return_ty, interner.unknown_results());
}

#[test]
fn test_non_callable_has_no_match() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);

    let matched = match_signature(&ctx, TypeId::STRING, &call(1, &[]), &mut FastSink).unwrap();
    assert_eq!(matched, None);
}

#[test]
fn test_generic_return_inferred_from_argument() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let t = interner.generic_param("T", "T", None);
    let wrap = Signature::new(vec![param(&interner, "value", t)], Some(interner.array(t)))
        .with_generic_params(vec![t]);
    let callable = interner.signature_function(wrap);

    let site = call(1, &[(2, TypeId::NUMBER)]);
    let matched = match_signature(&ctx, callable, &site, &mut FastSink)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());
    assert_eq!(matched.return_ty, interner.array(TypeId::NUMBER));
    let substituted = matched.substituted.unwrap();
    assert_eq!(substituted.params[0].ty, Some(TypeId::NUMBER));
}

#[test]
fn test_missing_argument() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let callable = interner.signature_function(Signature::new(
        vec![
            param(&interner, "a", TypeId::NUMBER),
            param(&interner, "b", TypeId::STRING),
        ],
        Some(TypeId::STRING),
    ));

    let mut collector = ProblemCollector::new();
    let site = call(7, &[(8, TypeId::NUMBER)]);
    let matched = match_signature(&ctx, callable, &site, &mut collector)
        .unwrap()
        .unwrap();
    assert!(!matched.is_match());
    // A failed call still yields a type so inference can continue.
    assert_eq!(matched.return_ty, TypeId::STRING);
    assert_eq!(messages(&collector), vec!["Missing argument: b: string"]);
    assert_eq!(collector.problems()[0].source_node, NodeId(7));
}

#[test]
fn test_optional_parameter_may_be_omitted() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let callable = interner.signature_function(Signature::new(
        vec![
            param(&interner, "a", TypeId::NUMBER),
            param(&interner, "b", TypeId::STRING).optional(),
        ],
        None,
    ));

    let mut collector = ProblemCollector::new();
    let matched = match_signature(&ctx, callable, &call(1, &[(2, TypeId::NUMBER)]), &mut collector)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());
    assert!(collector.is_empty());
}

#[test]
fn test_too_many_arguments() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let callable = interner.signature_function(Signature::new(
        vec![param(&interner, "a", TypeId::NUMBER)],
        None,
    ));

    let mut collector = ProblemCollector::new();
    let site = call(1, &[(2, TypeId::NUMBER), (3, TypeId::NUMBER), (4, TypeId::STRING)]);
    let matched = match_signature(&ctx, callable, &site, &mut collector)
        .unwrap()
        .unwrap();
    assert!(!matched.is_match());
    let nodes: Vec<NodeId> = collector.problems().iter().map(|p| p.source_node).collect();
    assert_eq!(nodes, vec![NodeId(3), NodeId(4)]);
    assert!(
        messages(&collector)
            .iter()
            .all(|message| *message == "Too many arguments.")
    );
}

#[test]
fn test_argument_mismatch_reported_at_argument() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let callable = interner.signature_function(Signature::new(
        vec![param(&interner, "a", TypeId::NUMBER)],
        None,
    ));

    let mut collector = ProblemCollector::new();
    let site = call(1, &[(2, TypeId::STRING)]);
    match_signature(&ctx, callable, &site, &mut collector).unwrap();
    assert_eq!(
        messages(&collector),
        vec!["Type mismatch. Required: 'number' Found: 'string'"]
    );
    assert_eq!(collector.problems()[0].source_node, NodeId(2));
}

#[test]
fn test_variadic_parameter() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let callable = interner.signature_function(
        Signature::new(Vec::new(), None).with_variadic(TypeId::NUMBER),
    );

    let good = call(1, &[(2, TypeId::NUMBER), (3, TypeId::NUMBER)]);
    let matched = match_signature(&ctx, callable, &good, &mut FastSink)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());

    let mut collector = ProblemCollector::new();
    let bad = call(1, &[(2, TypeId::NUMBER), (3, TypeId::STRING)]);
    let matched = match_signature(&ctx, callable, &bad, &mut collector)
        .unwrap()
        .unwrap();
    assert!(!matched.is_match());
    assert_eq!(collector.len(), 1);
    assert_eq!(collector.problems()[0].source_node, NodeId(3));
}

#[test]
fn test_trailing_multiple_results_fill_parameters() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let callable = interner.signature_function(Signature::new(
        vec![
            param(&interner, "a", TypeId::NUMBER),
            param(&interner, "b", TypeId::STRING),
        ],
        None,
    ));

    let pair = interner.multiple_results([TypeId::NUMBER, TypeId::STRING], false);
    let matched = match_signature(&ctx, callable, &call(1, &[(2, pair)]), &mut FastSink)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());

    // Only the last argument expands.
    let site = call(1, &[(2, pair), (3, TypeId::STRING)]);
    let matched = match_signature(&ctx, callable, &site, &mut FastSink)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());
}

#[test]
fn test_result_mismatch_is_prefixed() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let callable = interner.signature_function(Signature::new(
        vec![
            param(&interner, "a", TypeId::NUMBER),
            param(&interner, "b", TypeId::NUMBER),
        ],
        None,
    ));

    let mut collector = ProblemCollector::new();
    let pair = interner.multiple_results([TypeId::NUMBER, TypeId::STRING], false);
    match_signature(&ctx, callable, &call(1, &[(2, pair)]), &mut collector).unwrap();
    assert_eq!(
        messages(&collector),
        vec!["Result 2, type mismatch. Required: 'number' Found: 'string'"]
    );
    assert_eq!(collector.problems()[0].source_node, NodeId(2));
}

#[test]
fn test_excess_results_are_a_weak_warning() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let callable = interner.signature_function(Signature::new(
        vec![param(&interner, "a", TypeId::NUMBER)],
        None,
    ));

    let mut collector = ProblemCollector::new();
    let pair = interner.multiple_results([TypeId::NUMBER, TypeId::NUMBER], false);
    let matched = match_signature(&ctx, callable, &call(1, &[(2, pair)]), &mut collector)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());
    assert_eq!(messages(&collector), vec!["1 result is an excess argument."]);
    assert_eq!(collector.problems()[0].severity, ProblemSeverity::WeakWarning);

    let mut collector = ProblemCollector::new();
    let triple = interner.multiple_results([TypeId::NUMBER; 3], false);
    match_signature(&ctx, callable, &call(1, &[(2, triple)]), &mut collector).unwrap();
    assert_eq!(messages(&collector), vec!["2 results are excess arguments."]);
}

#[test]
fn test_variadic_result_checked_against_variadic_parameter() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let callable = interner.signature_function(
        Signature::new(Vec::new(), None).with_variadic(TypeId::NUMBER),
    );

    let numbers = interner.multiple_results([TypeId::NUMBER], true);
    let matched = match_signature(&ctx, callable, &call(1, &[(2, numbers)]), &mut FastSink)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());

    let mut collector = ProblemCollector::new();
    let strings = interner.multiple_results([TypeId::STRING], true);
    match_signature(&ctx, callable, &call(1, &[(2, strings)]), &mut collector).unwrap();
    assert_eq!(
        messages(&collector),
        vec!["Variadic result, type mismatch. Required: 'number' Found: 'string'"]
    );
}

#[test]
fn test_method_return_substitutes_receiver() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let clone = Signature::new(Vec::new(), Some(interner.self_class("Player"))).with_colon_call(true);
    let callable = interner.signature_function(clone);
    let hero = interner.class_ref("Hero");

    let site = CallSite::new(NodeId(1))
        .with_colon_call(true)
        .with_receiver(hero);
    let matched = match_signature(&ctx, callable, &site, &mut FastSink)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());
    assert_eq!(matched.return_ty, hero);
}

#[test]
fn test_dot_call_of_method_needs_self() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let player = interner.class_ref("Player");
    let move_to = Signature::new(vec![param(&interner, "x", TypeId::NUMBER)], None).with_colon_call(true);
    let callable = interner.signature_function(move_to);

    let mut collector = ProblemCollector::new();
    let site = CallSite::new(NodeId(1)).with_receiver(player);
    match_signature(&ctx, callable, &site, &mut collector).unwrap();
    assert_eq!(
        messages(&collector),
        vec![
            "Missing self argument.\n\nDid you mean to call the method with a colon?",
            "Missing argument: x: number",
        ]
    );

    let mut collector = ProblemCollector::new();
    let site = call(1, &[(2, TypeId::NUMBER), (3, TypeId::NUMBER)]).with_receiver(player);
    match_signature(&ctx, callable, &site, &mut collector).unwrap();
    assert_eq!(
        messages(&collector),
        vec![
            "Type mismatch. Required: 'Player' Found: 'number'.\n\nDid you mean to call the method with a colon?"
        ]
    );

    // Passing the receiver explicitly is fine.
    let site = call(1, &[(2, player), (3, TypeId::NUMBER)]).with_receiver(player);
    let matched = match_signature(&ctx, callable, &site, &mut FastSink)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());
}

#[test]
fn test_colon_call_of_plain_function_skips_first_parameter() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let callable = interner.signature_function(Signature::new(
        vec![
            param(&interner, "self", TypeId::UNKNOWN),
            param(&interner, "x", TypeId::STRING),
        ],
        None,
    ));

    let site = call(1, &[(2, TypeId::STRING)])
        .with_colon_call(true)
        .with_receiver(interner.class_ref("Player"));
    let matched = match_signature(&ctx, callable, &site, &mut FastSink)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());
}

#[test]
fn test_failed_candidates_name_their_signature() {
    init_tracing();
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let ctx = SearchContext::new(&interner, &store);
    let overload = Signature::new(vec![param(&interner, "a", TypeId::NUMBER)], Some(TypeId::VOID));
    let main = Signature::new(vec![param(&interner, "a", TypeId::STRING)], Some(TypeId::STRING));
    let callable = interner.function(main, vec![overload], TyFlags::empty());

    let mut collector = ProblemCollector::new();
    let matched = match_signature(&ctx, callable, &call(1, &[(5, TypeId::BOOLEAN)]), &mut collector)
        .unwrap()
        .unwrap();
    assert!(!matched.is_match());
    // The void overload is passed over for the fallback.
    assert_eq!(matched.return_ty, TypeId::STRING);
    assert_eq!(
        messages(&collector),
        vec![
            "Type mismatch. Required: 'number' Found: 'boolean'. In: fun(a: number): void\n",
            "Type mismatch. Required: 'string' Found: 'boolean'. In: fun(a: string): string\n",
        ]
    );
}

#[test]
fn test_canceled_query() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let token = CancellationToken::new();
    let ctx = SearchContext::new(&interner, &store).with_cancellation(token.clone());
    let callable = interner.signature_function(Signature::new(Vec::new(), None));

    assert!(match_signature(&ctx, callable, &call(1, &[]), &mut FastSink).is_ok());
    token.cancel();
    assert_eq!(
        match_signature(&ctx, callable, &call(1, &[]), &mut FastSink),
        Err(Canceled)
    );
}

/// Cancels the query as soon as a class declaration is looked up.
struct CancelOnLookup {
    store: DeclarationStore,
    token: CancellationToken,
}

impl DeclarationProvider for CancelOnLookup {
    fn class(&self, name: Atom) -> Option<Arc<ClassDecl>> {
        self.token.cancel();
        self.store.class(name)
    }

    fn alias(&self, name: Atom) -> Option<Arc<AliasDecl>> {
        self.store.alias(name)
    }
}

#[test]
fn test_canceled_during_member_walk() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    store.register_class(
        ClassDecl::new(interner.intern_string("Point"))
            .with_flags(TyFlags::SHAPE)
            .with_member(MemberInfo::named(interner.intern_string("x"), TypeId::NUMBER)),
    );
    store.register_class(ClassDecl::new(interner.intern_string("Empty")).with_flags(TyFlags::SHAPE));
    let token = CancellationToken::new();
    let provider = CancelOnLookup {
        store,
        token: token.clone(),
    };
    let ctx = SearchContext::new(&interner, &provider).with_cancellation(token);
    let callable = interner.signature_function(Signature::new(
        vec![param(&interner, "p", interner.doc_table("Point"))],
        None,
    ));

    let site = call(1, &[(2, interner.doc_table("Empty"))]);
    assert_eq!(match_signature(&ctx, callable, &site, &mut FastSink), Err(Canceled));
}

#[test]
fn test_call_site_from_inferred_nodes() {
    let interner = TypeInterner::new();
    let store = DeclarationStore::new();
    let pair = interner.multiple_results([TypeId::NUMBER, TypeId::BOOLEAN], false);
    store.set_node_type(NodeId(2), TypeId::STRING);
    store.set_node_type(NodeId(3), pair);
    let ctx = SearchContext::new(&interner, &store);

    let site = CallSite::infer(&ctx, NodeId(1), &[NodeId(2), NodeId(3)]);
    let types: Vec<TypeId> = site.args.iter().map(|arg| arg.ty).collect();
    assert_eq!(types, vec![TypeId::STRING, pair]);
    assert!(site.args.iter().all(|arg| !arg.is_table_literal));

    let callable = interner.signature_function(Signature::new(
        vec![
            param(&interner, "name", TypeId::STRING),
            param(&interner, "count", TypeId::NUMBER),
            param(&interner, "flag", TypeId::BOOLEAN),
        ],
        None,
    ));
    let matched = match_signature(&ctx, callable, &site, &mut FastSink)
        .unwrap()
        .unwrap();
    assert!(matched.is_match());

    let unknown = CallSite::infer(&ctx, NodeId(1), &[NodeId(99)]);
    assert_eq!(unknown.args[0].ty, TypeId::UNKNOWN);
}
