//! Variance engine.
//!
//! [`contravariant_of`] answers "may a value of type `source` flow into a
//! position of type `target`?". Every variant first consults the base rule
//! (unknown and nil sources, structural equality, union sources, shapes and
//! the source's superclass chain) and then adds its own acceptance rules.
//!
//! [`equals`] is semantic equality: aliases are compared by their targets
//! and shapes by mutual compatibility.

use crate::context::SearchContext;
use crate::members::{
    create_table_generic_from_members, find_indexer, find_member, integer_key, is_array,
    member_type, process_members, signatures_of, table_generic_args,
};
use crate::multiple_results::flatten;
use crate::problems::{FastSink, contravariant_of_shape};
use crate::recursion::GuardSubject;
use crate::resolve::{class_flags, is_shape, params_of, resolve, super_class};
use crate::signature::{signature_contravariant_of, signature_equals};
use crate::types::{
    MemberKey, MultipleResultsType, PrimitiveKind, Signature, TyFlags, TyKind, TypeData, TypeId,
    VarianceFlags,
};
use crate::union::{contains, union};
use luaty_common::limits;
use smallvec::SmallVec;
use tracing::trace;

// =============================================================================
// contravariant_of
// =============================================================================

pub fn contravariant_of(
    ctx: &SearchContext<'_>,
    target: TypeId,
    source: TypeId,
    flags: VarianceFlags,
) -> bool {
    if target == source {
        return true;
    }
    stacker::maybe_grow(limits::STACK_RED_ZONE, limits::STACK_GROWTH, || {
        contravariant_of_inner(ctx, target, source, flags)
    })
}

fn contravariant_of_inner(
    ctx: &SearchContext<'_>,
    target: TypeId,
    source: TypeId,
    flags: VarianceFlags,
) -> bool {
    let interner = ctx.interner();
    let target_data = interner.lookup(target);
    match &*target_data {
        TypeData::Unknown => interner.kind(source) != TyKind::MultipleResults,
        TypeData::Nil => source.is_nil() || base_contravariant_of(ctx, target, source, flags),
        TypeData::Void => source.is_void() || base_contravariant_of(ctx, target, source, flags),
        TypeData::Primitive(kind) => primitive_contravariant_of(ctx, *kind, target, source, flags),
        TypeData::Literal(_) => literal_contravariant_of(ctx, target, source, flags),
        TypeData::Array(base) => array_contravariant_of(ctx, target, *base, source, flags),
        TypeData::Class(_) => class_contravariant_of(ctx, target, source, flags),
        TypeData::GenericParam(param) => {
            if flags.contains(VarianceFlags::ABSTRACT_PARAMS) {
                param
                    .bound
                    .is_none_or(|bound| contravariant_of(ctx, bound, source, flags))
            } else {
                base_contravariant_of(ctx, target, source, flags)
            }
        }
        TypeData::Alias(alias) => {
            contravariant_of(ctx, alias.target, source, flags)
                || base_contravariant_of(ctx, target, source, flags)
        }
        TypeData::Union(members) => {
            base_contravariant_of(ctx, target, source, flags)
                || members
                    .iter()
                    .any(|member| contravariant_of(ctx, *member, source, flags))
        }
        TypeData::Generic { base, args } => {
            generic_contravariant_of(ctx, target, *base, args, source, flags)
        }
        TypeData::Function(function) => {
            base_contravariant_of(ctx, target, source, flags)
                || function_contravariant_of(ctx, function.signatures(), source, flags)
        }
        TypeData::MultipleResults(results) => {
            multiple_results_contravariant_of(ctx, results, source, flags)
        }
        TypeData::Snippet(_) => base_contravariant_of(ctx, target, source, flags),
    }
}

/// Whether the base rule lets `source` through before any structure is
/// looked at.
fn lenient_source(ctx: &SearchContext<'_>, source: TypeId, flags: VarianceFlags) -> bool {
    (source.is_unknown() && !flags.contains(VarianceFlags::STRICT_UNKNOWN))
        || (source.is_nil()
            && !flags.contains(VarianceFlags::STRICT_NIL)
            && !ctx.settings().strict_nil)
}

/// The rule every variant starts from.
pub fn base_contravariant_of(
    ctx: &SearchContext<'_>,
    target: TypeId,
    source: TypeId,
    flags: VarianceFlags,
) -> bool {
    if lenient_source(ctx, source, flags) {
        return true;
    }

    let interner = ctx.interner();
    let resolved = resolve(ctx, source);
    if equals(ctx, target, resolved) {
        return true;
    }
    if resolved != source {
        return contravariant_of(ctx, target, resolved, flags);
    }

    let source_data = interner.lookup(source);
    if let TypeData::Union(members) = &*source_data {
        return members
            .iter()
            .filter(|member| interner.kind(**member) != TyKind::Snippet)
            .all(|member| contravariant_of(ctx, target, *member, flags));
    }

    let structural = !flags.contains(VarianceFlags::NON_STRUCTURAL)
        || source_data.flags().contains(TyFlags::ANONYMOUS_TABLE);
    if structural
        && matches!(&*source_data, TypeData::Class(_) | TypeData::Generic { .. })
        && is_shape(ctx, target)
    {
        return ctx
            .with_recursion_guard("shape", GuardSubject::Pair(target, source), || {
                contravariant_of_shape(ctx, target, source, flags, None, None, &mut FastSink)
            })
            .unwrap_or_else(|| {
                trace!(target = target.0, source = source.0, "base_contravariant_of - shape re-entered");
                true
            });
    }

    super_class(ctx, source).is_some_and(|super_ty| {
        ctx.with_recursion_guard("super", GuardSubject::Pair(target, super_ty), || {
            contravariant_of(ctx, target, super_ty, flags)
        })
        .unwrap_or(false)
    })
}

fn primitive_contravariant_of(
    ctx: &SearchContext<'_>,
    kind: PrimitiveKind,
    target: TypeId,
    source: TypeId,
    flags: VarianceFlags,
) -> bool {
    if base_contravariant_of(ctx, target, source, flags) {
        return true;
    }
    let interner = ctx.interner();
    let resolved = resolve(ctx, source);
    let source_data = interner.lookup(resolved);
    if matches!(&*source_data, TypeData::Primitive(other) if *other == kind) {
        return true;
    }
    if flags.contains(VarianceFlags::STRICT_UNKNOWN) {
        return false;
    }
    match kind {
        PrimitiveKind::Function => source_data.kind() == TyKind::Function,
        PrimitiveKind::Table => {
            let source_base = match &*source_data {
                TypeData::Generic { base, .. } => *base,
                _ => resolved,
            };
            source_data.kind() == TyKind::Array
                || interner.kind(source_base) == TyKind::Class
                || source_base == TypeId::TABLE
        }
        _ => false,
    }
}

fn literal_contravariant_of(
    ctx: &SearchContext<'_>,
    target: TypeId,
    source: TypeId,
    flags: VarianceFlags,
) -> bool {
    let resolved = resolve(ctx, source);
    if resolved == target {
        return true;
    }
    if !flags.contains(VarianceFlags::STRICT_UNKNOWN)
        && class_flags(ctx, resolved).contains(TyFlags::UNKNOWN)
    {
        return true;
    }
    base_contravariant_of(ctx, target, source, flags | VarianceFlags::STRICT_NIL)
}

fn array_contravariant_of(
    ctx: &SearchContext<'_>,
    target: TypeId,
    base: TypeId,
    source: TypeId,
    flags: VarianceFlags,
) -> bool {
    if base_contravariant_of(ctx, target, source, flags) {
        return true;
    }

    let interner = ctx.interner();
    let resolved = resolve(ctx, source);
    let resolved_base = resolve(ctx, base);
    let widen = flags.contains(VarianceFlags::WIDEN_TABLES);

    match &*interner.lookup(resolved) {
        TypeData::Array(source_base) => {
            equals(ctx, resolved_base, *source_base)
                || (widen && contravariant_of(ctx, resolved_base, *source_base, flags))
        }
        TypeData::Class(_) if is_array(ctx, resolved) => {
            let mut element: Option<TypeId> = None;
            let all_accepted = process_members(ctx, resolved, true, &mut |member| {
                let Some(index) = member.index_ty() else {
                    return true;
                };
                if index != TypeId::NUMBER && integer_key(ctx, index).is_none() {
                    return true;
                }
                for value in expand_results(ctx, member_type(ctx, resolved, member)) {
                    if !contravariant_of(ctx, resolved_base, value, flags) {
                        return false;
                    }
                    element = Some(element.map_or(value, |acc| union(ctx, acc, value)));
                }
                true
            });
            all_accepted
                && (widen
                    || element.is_none_or(|element| equals(ctx, resolved_base, element))
                    || (resolved_base.is_unknown()
                        && !flags.contains(VarianceFlags::STRICT_UNKNOWN)))
        }
        _ => false,
    }
}

/// The values of a member: every entry of a multi-result, or the type.
pub(crate) fn expand_results(ctx: &SearchContext<'_>, ty: TypeId) -> SmallVec<[TypeId; 4]> {
    match &*ctx.interner().lookup(ty) {
        TypeData::MultipleResults(results) => results.list.clone(),
        _ => smallvec::smallvec![ty],
    }
}

fn class_contravariant_of(
    ctx: &SearchContext<'_>,
    target: TypeId,
    source: TypeId,
    flags: VarianceFlags,
) -> bool {
    if class_flags(ctx, target).contains(TyFlags::UNKNOWN) {
        return ctx.interner().kind(source) != TyKind::MultipleResults;
    }
    let resolved = resolve(ctx, target);
    if resolved != target {
        return contravariant_of(ctx, resolved, source, flags);
    }
    base_contravariant_of(ctx, target, source, flags)
}

fn generic_contravariant_of(
    ctx: &SearchContext<'_>,
    target: TypeId,
    base: TypeId,
    args: &[TypeId],
    source: TypeId,
    flags: VarianceFlags,
) -> bool {
    if lenient_source(ctx, source, flags) {
        return true;
    }
    let resolved_target = resolve(ctx, target);
    if resolved_target != target {
        return contravariant_of(ctx, resolved_target, source, flags);
    }

    let interner = ctx.interner();
    let resolved = resolve(ctx, source);
    let source_data = interner.lookup(resolved);
    if matches!(&*source_data, TypeData::Union(_)) {
        return base_contravariant_of(ctx, target, resolved, flags);
    }

    let resolved_base = resolve(ctx, base);
    let widen = flags.contains(VarianceFlags::WIDEN_TABLES);
    let same_base_generic = matches!(
        &*source_data,
        TypeData::Generic { base: other_base, .. } if equals(ctx, *other_base, resolved_base)
    );

    if is_shape(ctx, resolved_base)
        && (widen || !same_base_generic)
        && matches!(&*source_data, TypeData::Class(_) | TypeData::Generic { .. })
    {
        return ctx
            .with_recursion_guard("generic-shape", GuardSubject::Pair(target, resolved), || {
                generic_shape_contravariant_of(ctx, target, resolved, flags)
            })
            .unwrap_or(true);
    }

    if let TypeData::Array(source_base) = &*source_data {
        let Some((key, value)) = table_generic_args(ctx, target) else {
            return false;
        };
        let key_ok = key == TypeId::NUMBER
            || (key.is_unknown() && !flags.contains(VarianceFlags::STRICT_UNKNOWN));
        return key_ok
            && (equals(ctx, value, *source_base)
                || (widen && contravariant_of(ctx, value, *source_base, flags)));
    }

    let mut contravariant_params = false;
    let other: Option<(TypeId, SmallVec<[TypeId; 2]>)> = match &*source_data {
        TypeData::Generic {
            base: other_base,
            args: other_args,
        } => Some((*other_base, other_args.clone())),
        _ if resolved_base == TypeId::TABLE && args.len() == 2 => {
            if resolved == TypeId::TABLE {
                return args[0].is_unknown() && args[1].is_unknown();
            }
            if is_shape(ctx, resolved) {
                contravariant_params = widen;
                let synthesized = create_table_generic_from_members(ctx, resolved);
                table_generic_args(ctx, synthesized)
                    .map(|(key, value)| (TypeId::TABLE, smallvec::smallvec![key, value]))
            } else {
                None
            }
        }
        TypeData::Class(_) => Some((resolved, params_of(ctx, resolved).into_iter().collect())),
        _ => None,
    };

    if let Some((other_base, other_args)) = other
        && equals(ctx, resolved_base, other_base)
    {
        let strict_unknown = flags.contains(VarianceFlags::STRICT_UNKNOWN);
        let abstract_params = flags.contains(VarianceFlags::ABSTRACT_PARAMS);
        return args.len() == other_args.len()
            && args.iter().zip(other_args.iter()).all(|(arg, other_arg)| {
                equals(ctx, *arg, *other_arg)
                    || (!strict_unknown && other_arg.is_unknown())
                    || ((contravariant_params
                        || (abstract_params
                            && interner.kind(*arg) == TyKind::GenericParam))
                        && contravariant_of(ctx, *arg, *other_arg, flags))
            });
    }

    base_contravariant_of(ctx, target, resolved, flags)
}

/// Members of an instantiated shape generic against the source's members.
fn generic_shape_contravariant_of(
    ctx: &SearchContext<'_>,
    target: TypeId,
    source: TypeId,
    flags: VarianceFlags,
) -> bool {
    let interner = ctx.interner();
    process_members(ctx, target, true, &mut |member| {
        if member.ty.is_none() {
            return true;
        }
        let target_ty = member_type(ctx, target, member);
        let source_member = match member.key {
            MemberKey::Index(index) => find_indexer(ctx, source, index, false),
            MemberKey::Name(name) => find_member(ctx, source, name),
        };
        match source_member {
            None => contains(interner, target_ty, TypeId::NIL),
            Some(source_member) => {
                let source_ty = member_type(ctx, source, &source_member);
                contravariant_of(ctx, target_ty, source_ty, flags)
            }
        }
    })
}

fn function_contravariant_of<'s>(
    ctx: &SearchContext<'_>,
    target_signatures: impl Iterator<Item = &'s Signature>,
    source: TypeId,
    flags: VarianceFlags,
) -> bool {
    let interner = ctx.interner();
    let resolved = resolve(ctx, source);
    if resolved == TypeId::FUNCTION {
        let unknown_results = interner.unknown_results();
        return target_signatures.into_iter().any(|signature| {
            signature.params.is_empty()
                && signature.variadic == Some(TypeId::UNKNOWN)
                && signature.return_ty.is_none_or(|ty| ty == unknown_results)
        });
    }

    let source_signatures = signatures_of(ctx, resolved);
    if source_signatures.is_empty() {
        return false;
    }
    target_signatures.into_iter().any(|target_signature| {
        source_signatures.iter().any(|source_signature| {
            signature_contravariant_of(ctx, target_signature, source_signature, flags)
        })
    })
}

fn multiple_results_contravariant_of(
    ctx: &SearchContext<'_>,
    results: &MultipleResultsType,
    source: TypeId,
    flags: VarianceFlags,
) -> bool {
    let list = &results.list;
    let required = if results.variadic {
        list.len().saturating_sub(1)
    } else {
        list.len()
    };

    let flattened = flatten(ctx, source);
    let data = ctx.interner().lookup(flattened);
    let TypeData::MultipleResults(other) = &*data else {
        return required <= 1
            && list
                .first()
                .is_none_or(|first| contravariant_of(ctx, *first, source, flags));
    };

    if other.variadic {
        if !results.variadic {
            return false;
        }
    } else if other.list.len() < required {
        return false;
    }

    for (i, other_ty) in other.list.iter().enumerate() {
        let own = if i >= list.len() {
            match list.last() {
                Some(last) if results.variadic => *last,
                _ => return true,
            }
        } else {
            list[i]
        };
        if !contravariant_of(ctx, own, *other_ty, flags) {
            return false;
        }
    }
    true
}

// =============================================================================
// equals
// =============================================================================

pub fn equals(ctx: &SearchContext<'_>, a: TypeId, b: TypeId) -> bool {
    if a == b {
        return true;
    }
    let interner = ctx.interner();
    let data = interner.lookup(a);
    match &*data {
        TypeData::Unknown
        | TypeData::Nil
        | TypeData::Void
        | TypeData::Primitive(_)
        | TypeData::Literal(_) => resolve(ctx, b) == a,
        TypeData::Snippet(_) => false,
        TypeData::Array(base) => match &*interner.lookup(resolve(ctx, b)) {
            TypeData::Array(other_base) => equals(ctx, *base, *other_base),
            _ => false,
        },
        TypeData::Class(class) => {
            let resolved = resolve(ctx, a);
            if resolved != a {
                return equals(ctx, resolved, b);
            }
            let other = resolve(ctx, b);
            if other == a {
                return true;
            }
            if let TypeData::Class(other_class) = &*interner.lookup(other)
                && other_class.name == class.name
                && class_flags(ctx, a) == class_flags(ctx, other)
            {
                return true;
            }
            mutual_shapes(ctx, a, other)
        }
        TypeData::GenericParam(param) => match &*interner.lookup(resolve(ctx, b)) {
            TypeData::GenericParam(other) => {
                param.name == other.name
                    && match (param.bound, other.bound) {
                        (None, None) => true,
                        (Some(x), Some(y)) => equals(ctx, x, y),
                        _ => false,
                    }
            }
            _ => false,
        },
        TypeData::Alias(alias) => ctx
            .with_recursion_guard("equals-alias", GuardSubject::Pair(a, b), || {
                equals(ctx, alias.target, b)
            })
            .unwrap_or(false),
        TypeData::Union(_) => {
            let own = interner.union_members(resolve(ctx, a));
            let other = interner.union_members(resolve(ctx, b));
            own.len() == other.len()
                && own.iter().all(|member| {
                    other.contains(member)
                        || other.iter().any(|candidate| equals(ctx, *member, *candidate))
                })
        }
        TypeData::Generic { base, args } => {
            let resolved = resolve(ctx, a);
            if resolved != a {
                return equals(ctx, resolved, b);
            }
            let other = resolve(ctx, b);
            if let TypeData::Generic {
                base: other_base,
                args: other_args,
            } = &*interner.lookup(other)
                && args.len() == other_args.len()
                && equals(ctx, *base, *other_base)
                && args
                    .iter()
                    .zip(other_args.iter())
                    .all(|(x, y)| equals(ctx, *x, *y))
            {
                return true;
            }
            mutual_shapes(ctx, a, other)
        }
        TypeData::Function(function) => match &*interner.lookup(resolve(ctx, b)) {
            TypeData::Function(other) => {
                signature_equals(ctx, &function.main, &other.main)
                    && function.overloads.len() == other.overloads.len()
                    && function
                        .overloads
                        .iter()
                        .zip(other.overloads.iter())
                        .all(|(x, y)| signature_equals(ctx, x, y))
            }
            _ => false,
        },
        TypeData::MultipleResults(results) => match &*interner.lookup(resolve(ctx, b)) {
            TypeData::MultipleResults(other) => {
                results.variadic == other.variadic
                    && results.list.len() == other.list.len()
                    && results
                        .list
                        .iter()
                        .zip(other.list.iter())
                        .all(|(x, y)| equals(ctx, *x, *y))
            }
            _ => false,
        },
    }
}

/// Two shapes are equal when each accepts the other. A pair already being
/// compared is reported unequal so the caller falls through to its
/// structural check, which is where recursive shapes are assumed related.
fn mutual_shapes(ctx: &SearchContext<'_>, a: TypeId, b: TypeId) -> bool {
    if !is_shape(ctx, a) || !is_shape(ctx, b) {
        return false;
    }
    ctx.with_recursion_guard("shape-equals", GuardSubject::Pair(a, b), || {
        contravariant_of(ctx, a, b, VarianceFlags::empty())
            && contravariant_of(ctx, b, a, VarianceFlags::empty())
    })
    .unwrap_or(false)
}

#[cfg(test)]
#[path = "../tests/variance_tests.rs"]
mod tests;
