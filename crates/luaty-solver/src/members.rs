//! Member model.
//!
//! Members come from class declarations (own members, then the members of
//! the declaration's alias-name, then non-overridden superclass members).
//! Primitives and literals borrow the members of the class declared under
//! the primitive's name, so hosts can describe the `string` library.
//! `table<K, V>` and arrays expose synthetic members.

use crate::context::SearchContext;
use crate::recursion::GuardSubject;
use crate::resolve::{
    class_flags, generic_base_params, is_shape, process_super_classes, resolve,
    resolved_members, super_class,
};
use crate::substitute::{ChainSubstitutor, ParameterSubstitutor, substitute};
use crate::types::{
    MemberInfo, MemberKey, PrimitiveKind, Signature, TyFlags, TypeData, TypeId, VarianceFlags,
};
use crate::union::union;
use crate::variance::{contravariant_of, equals};
use luaty_common::Atom;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// Visit the members of `ty`. With `deep`, superclass members that are not
/// overridden follow the own members. Returns `false` when `f` stopped the
/// walk.
///
/// Cycles are tracked per walk: `f` may itself walk the members of `ty`
/// (a shape compared against its own subclass does).
pub fn process_members(
    ctx: &SearchContext<'_>,
    ty: TypeId,
    deep: bool,
    f: &mut dyn FnMut(&MemberInfo) -> bool,
) -> bool {
    let mut visited: FxHashSet<TypeId> = FxHashSet::default();
    walk_members(ctx, ty, deep, &mut visited, f)
}

fn walk_members(
    ctx: &SearchContext<'_>,
    ty: TypeId,
    deep: bool,
    visited: &mut FxHashSet<TypeId>,
    f: &mut dyn FnMut(&MemberInfo) -> bool,
) -> bool {
    if !visited.insert(ty) {
        return true;
    }
    let interner = ctx.interner();
    let data = interner.lookup(ty);
    match &*data {
        TypeData::Class(class) => {
            let resolved = resolve(ctx, ty);
            if resolved != ty {
                return walk_members(ctx, resolved, deep, visited, f);
            }
            let Some(decl) = ctx.class_decl(class.name) else {
                return !deep || walk_super_members(ctx, ty, &[], visited, f);
            };
            let mut own: Vec<MemberInfo> = decl.members.clone();
            if let Some(alias_name) = decl.alias_name
                && alias_name != decl.name
                && let Some(alias_decl) = ctx.class_decl(alias_name)
            {
                own.extend(alias_decl.members.iter().cloned());
            }
            for member in &own {
                if ctx.is_canceled() {
                    return true;
                }
                if !f(member) {
                    return false;
                }
            }
            !deep || walk_super_members(ctx, ty, &own, visited, f)
        }
        TypeData::GenericParam(param) => match param.bound {
            Some(bound) => walk_members(ctx, bound, deep, visited, f),
            None => true,
        },
        TypeData::Generic { base, .. } => {
            let mut own: Vec<MemberInfo> = Vec::new();
            let complete = walk_members(ctx, *base, false, visited, &mut |member| {
                own.push(member.clone());
                f(member)
            });
            complete && (!deep || walk_super_members(ctx, ty, &own, visited, f))
        }
        TypeData::Primitive(kind) => {
            let class = interner.class_ref(kind.name());
            walk_members(ctx, class, deep, visited, f)
        }
        TypeData::Literal(literal) => {
            walk_members(ctx, literal.kind.type_id(), deep, visited, f)
        }
        TypeData::Alias(_) => {
            let resolved = resolve(ctx, ty);
            resolved == ty || walk_members(ctx, resolved, deep, visited, f)
        }
        _ => true,
    }
}

fn walk_super_members(
    ctx: &SearchContext<'_>,
    ty: TypeId,
    own: &[MemberInfo],
    visited: &mut FxHashSet<TypeId>,
    f: &mut dyn FnMut(&MemberInfo) -> bool,
) -> bool {
    let mut seen: Vec<MemberInfo> = own.to_vec();
    process_super_classes(ctx, ty, |super_ty| {
        let mut inherited: Vec<MemberInfo> = Vec::new();
        let complete = walk_members(ctx, super_ty, false, visited, &mut |member| {
            if is_overridden(ctx, &seen, member) {
                return true;
            }
            inherited.push(member.clone());
            f(member)
        });
        seen.extend(inherited);
        complete
    })
}

fn is_overridden(ctx: &SearchContext<'_>, seen: &[MemberInfo], member: &MemberInfo) -> bool {
    seen.iter().any(|existing| match (existing.key, member.key) {
        (MemberKey::Name(a), MemberKey::Name(b)) => a == b,
        (MemberKey::Index(a), MemberKey::Index(b)) => {
            a == b || contravariant_of(ctx, a, b, VarianceFlags::STRICT_UNKNOWN)
        }
        _ => false,
    })
}

/// Members named `name`, own first. The effective member is the first
/// explicitly typed one, else the first one.
pub fn find_member(ctx: &SearchContext<'_>, ty: TypeId, name: Atom) -> Option<MemberInfo> {
    let interner = ctx.interner();
    if let Some(member) = table_generic_member(ctx, ty, &|key| {
        key == TypeId::STRING
            || contravariant_of(
                ctx,
                key,
                interner.string_literal(&interner.resolve_atom(name)),
                VarianceFlags::empty(),
            )
    }) {
        return Some(MemberInfo {
            key: MemberKey::Name(name),
            ..member
        });
    }

    let mut first: Option<MemberInfo> = None;
    let mut typed: Option<MemberInfo> = None;
    process_members(ctx, ty, true, &mut |member| {
        if member.name() != Some(name) {
            return true;
        }
        if member.explicitly_typed && typed.is_none() {
            typed = Some(member.clone());
            return false;
        }
        if first.is_none() {
            first = Some(member.clone());
        }
        true
    });
    typed.or(first)
}

/// The narrowest indexer of `ty` accepting `index` (with `exact`, equal to
/// it). Explicitly typed indexers win over inferred ones.
pub fn find_indexer(
    ctx: &SearchContext<'_>,
    ty: TypeId,
    index: TypeId,
    exact: bool,
) -> Option<MemberInfo> {
    let interner = ctx.interner();
    match &*interner.lookup(ty) {
        TypeData::Array(base) => {
            let accepts = if exact {
                index == TypeId::NUMBER
            } else {
                contravariant_of(ctx, TypeId::NUMBER, index, VarianceFlags::STRICT_UNKNOWN)
            };
            return accepts.then(|| MemberInfo::indexed(TypeId::NUMBER, *base));
        }
        TypeData::Generic { .. } => {
            if let Some(member) = table_generic_member(ctx, ty, &|key| {
                index == key || (!exact && contravariant_of(ctx, key, index, VarianceFlags::empty()))
            }) {
                return Some(member);
            }
        }
        _ => {}
    }

    let mut narrowest: Option<MemberInfo> = None;
    let mut narrowest_typed: Option<MemberInfo> = None;
    process_members(ctx, ty, true, &mut |member| {
        let Some(key) = member.index_ty() else {
            return true;
        };
        let matches = if exact {
            key == index || equals(ctx, key, index)
        } else {
            contravariant_of(ctx, key, index, VarianceFlags::STRICT_UNKNOWN)
        };
        if !matches {
            return true;
        }
        let slot = if member.explicitly_typed {
            &mut narrowest_typed
        } else {
            &mut narrowest
        };
        let narrower = match slot {
            Some(current) => current.index_ty().is_some_and(|current_key| {
                contravariant_of(ctx, current_key, key, VarianceFlags::STRICT_UNKNOWN)
            }),
            None => true,
        };
        if narrower {
            *slot = Some(member.clone());
        }
        true
    });
    narrowest_typed.or(narrowest)
}

/// The synthetic member of `table<K, V>` when `accepts(K)` holds.
fn table_generic_member(
    ctx: &SearchContext<'_>,
    ty: TypeId,
    accepts: &dyn Fn(TypeId) -> bool,
) -> Option<MemberInfo> {
    let (key, value) = table_generic_args(ctx, ty)?;
    accepts(key).then(|| MemberInfo::indexed(key, value))
}

/// `(K, V)` of a `table<K, V>` generic.
pub fn table_generic_args(ctx: &SearchContext<'_>, ty: TypeId) -> Option<(TypeId, TypeId)> {
    match &*ctx.interner().lookup(ty) {
        TypeData::Generic { base, args } if *base == TypeId::TABLE && args.len() == 2 => {
            Some((args[0], args[1]))
        }
        _ => None,
    }
}

fn unknown_fallback(ctx: &SearchContext<'_>, ty: TypeId) -> Option<TypeId> {
    (ctx.settings().unknown_indexable && class_flags(ctx, ty).contains(TyFlags::UNKNOWN))
        .then_some(TypeId::UNKNOWN)
}

/// The type of member `name` of `ty`, projected across unions and with
/// the owner's generic arguments applied.
pub fn guess_member_type(
    ctx: &SearchContext<'_>,
    ty: TypeId,
    name: Atom,
) -> Option<TypeId> {
    let interner = ctx.interner();
    let data = interner.lookup(ty);
    match &*data {
        TypeData::Union(members) => {
            return union_of(ctx, members.iter().map(|m| guess_member_type(ctx, *m, name)));
        }
        TypeData::Unknown => {
            return ctx.settings().unknown_indexable.then_some(TypeId::UNKNOWN);
        }
        TypeData::Primitive(PrimitiveKind::Table) => return Some(TypeId::UNKNOWN),
        TypeData::Literal(literal) => {
            return guess_member_type(ctx, literal.kind.type_id(), name);
        }
        TypeData::Alias(_) => {
            let resolved = resolve(ctx, ty);
            return if resolved == ty {
                None
            } else {
                guess_member_type(ctx, resolved, name)
            };
        }
        _ => {}
    }

    let Some(member) = find_member(ctx, ty, name) else {
        return unknown_fallback(ctx, ty);
    };
    Some(member_type(ctx, ty, &member))
}

/// The type stored under keys of type `index` in `ty`.
pub fn guess_indexer_type(
    ctx: &SearchContext<'_>,
    ty: TypeId,
    index: TypeId,
    exact: bool,
) -> Option<TypeId> {
    let interner = ctx.interner();
    let data = interner.lookup(ty);
    match &*data {
        TypeData::Union(members) => {
            return union_of(
                ctx,
                members.iter().map(|m| guess_indexer_type(ctx, *m, index, exact)),
            );
        }
        TypeData::Unknown => {
            return ctx.settings().unknown_indexable.then_some(TypeId::UNKNOWN);
        }
        TypeData::Primitive(PrimitiveKind::Table) => return Some(TypeId::UNKNOWN),
        TypeData::Literal(literal) => {
            return guess_indexer_type(ctx, literal.kind.type_id(), index, exact);
        }
        TypeData::Alias(_) => {
            let resolved = resolve(ctx, ty);
            return if resolved == ty {
                None
            } else {
                guess_indexer_type(ctx, resolved, index, exact)
            };
        }
        _ => {}
    }

    let mut result: Option<TypeId> = None;
    for candidate in resolved_members(ctx, index) {
        let Some(member) = find_indexer(ctx, ty, candidate, exact) else {
            if let Some(fallback) = unknown_fallback(ctx, ty) {
                return Some(fallback);
            }
            continue;
        };
        if member.ty.is_none() {
            return Some(TypeId::UNKNOWN);
        }
        let member_ty = member_type(ctx, ty, &member);
        result = Some(match result {
            Some(acc) => union(ctx, acc, member_ty),
            None => member_ty,
        });
    }
    result
}

/// A member's declared type with the owner's member substitutor applied.
/// Untyped members read as `any`.
pub fn member_type(ctx: &SearchContext<'_>, owner: TypeId, member: &MemberInfo) -> TypeId {
    let Some(ty) = member.ty else {
        return TypeId::UNKNOWN;
    };
    match member_substitutor(ctx, owner) {
        Some(mut substitutor) => substitute(ctx, ty, &mut substitutor),
        None => ty,
    }
}

fn union_of(ctx: &SearchContext<'_>, types: impl Iterator<Item = Option<TypeId>>) -> Option<TypeId> {
    types.flatten().reduce(|acc, ty| union(ctx, acc, ty))
}

/// The substitution that instantiates members inherited by `ty`: generic
/// arguments of `ty` itself, and those its superclasses were extended with.
pub fn member_substitutor(ctx: &SearchContext<'_>, ty: TypeId) -> Option<ChainSubstitutor> {
    ctx.with_recursion_guard("member-substitutor", GuardSubject::Type(ty), || {
        let interner = ctx.interner();
        let data = interner.lookup(ty);
        let inherited = super_class(ctx, ty).and_then(|sup| member_substitutor(ctx, sup));
        match &*data {
            TypeData::Generic { base, args } => {
                let params = generic_base_params(ctx, *base);
                if params.is_empty() {
                    return inherited;
                }
                Some(ChainSubstitutor::chain(
                    inherited,
                    ParameterSubstitutor::with_args(interner, &params, args),
                ))
            }
            _ => inherited,
        }
    })
    .flatten()
}

/// Call signatures of a callable type: overloads first, then the main one.
pub fn signatures_of(ctx: &SearchContext<'_>, ty: TypeId) -> Vec<Signature> {
    let interner = ctx.interner();
    let data = interner.lookup(ty);
    match &*data {
        TypeData::Function(function) => function.signatures().cloned().collect(),
        TypeData::Class(class) => {
            let resolved = resolve(ctx, ty);
            if resolved != ty {
                return signatures_of(ctx, resolved);
            }
            ctx.class_decl(class.name)
                .map(|decl| decl.signatures.clone())
                .unwrap_or_default()
        }
        TypeData::Alias(_) => {
            let resolved = resolve(ctx, ty);
            if resolved == ty {
                Vec::new()
            } else {
                signatures_of(ctx, resolved)
            }
        }
        _ => Vec::new(),
    }
}

/// `table<K, V>` equivalent of a shape: `K` unions the member keys (names as
/// string literals), `V` the member types.
pub fn create_table_generic_from_members(ctx: &SearchContext<'_>, ty: TypeId) -> TypeId {
    let interner = ctx.interner();
    let mut key: Option<TypeId> = None;
    let mut value: Option<TypeId> = None;

    process_members(ctx, ty, true, &mut |member| {
        let member_key = match member.key {
            MemberKey::Name(name) => interner.string_literal(&interner.resolve_atom(name)),
            MemberKey::Index(index) => index,
        };
        let member_value = member.ty.unwrap_or(TypeId::UNKNOWN);
        key = Some(key.map_or(member_key, |acc| union(ctx, acc, member_key)));
        value = Some(value.map_or(member_value, |acc| union(ctx, acc, member_value)));
        !(key == Some(TypeId::UNKNOWN) && value == Some(TypeId::UNKNOWN))
    });

    interner.generic(
        TypeId::TABLE,
        [
            key.unwrap_or(TypeId::UNKNOWN),
            value.unwrap_or(TypeId::UNKNOWN),
        ],
    )
}

/// Integer value of a number literal key such as `[3]`.
pub fn integer_key(ctx: &SearchContext<'_>, index: TypeId) -> Option<i64> {
    let interner = ctx.interner();
    match &*interner.lookup(index) {
        TypeData::Literal(literal) if literal.kind == PrimitiveKind::Number => {
            interner.resolve_atom(literal.value).parse::<i64>().ok()
        }
        _ => None,
    }
}

/// Whether `ty` is an array, or a shape whose keys are exactly `1..N` (or
/// that carries a `number` indexer).
pub fn is_array(ctx: &SearchContext<'_>, ty: TypeId) -> bool {
    let resolved = resolve(ctx, ty);
    let interner = ctx.interner();
    match &*interner.lookup(resolved) {
        TypeData::Array(_) => return true,
        TypeData::Class(_) if is_shape(ctx, resolved) => {}
        _ => return false,
    }

    let mut keys: FxHashSet<i64> = FxHashSet::default();
    let mut number_indexer = false;
    let only_integer_keys = process_members(ctx, resolved, true, &mut |member| {
        match member.index_ty() {
            Some(TypeId::NUMBER) => {
                number_indexer = true;
                true
            }
            Some(index) => match integer_key(ctx, index) {
                Some(key) => {
                    keys.insert(key);
                    true
                }
                None => false,
            },
            None => false,
        }
    });

    if !only_integer_keys {
        return false;
    }
    number_indexer || contiguous_from_one(&keys)
}

pub(crate) fn contiguous_from_one(keys: &FxHashSet<i64>) -> bool {
    let mut sorted: SmallVec<[i64; 8]> = keys.iter().copied().collect();
    sorted.sort_unstable();
    sorted.iter().enumerate().all(|(i, key)| *key == i as i64 + 1)
}

#[cfg(test)]
#[path = "../tests/members_tests.rs"]
mod tests;
