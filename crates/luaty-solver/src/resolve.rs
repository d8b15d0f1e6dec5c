//! Alias and class resolution, superclass walks.
//!
//! Named types are resolved on demand through the search context. A class
//! reference whose name is an alias expands to the alias target, an alias
//! expands to its target (instantiated when arguments are supplied), and a
//! generic over an alias expands to the instantiated body. Resolution of a
//! union resolves every member and tracks visited handles, so alias cycles
//! end in `void` instead of looping.

use crate::context::SearchContext;
use crate::substitute::{ParameterSubstitutor, substitute};
use crate::types::{PrimitiveKind, SELF_CLASS_SUFFIX, TyFlags, TypeData, TypeId};
use crate::union::union_all;
use luaty_common::NodeId;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::sync::Arc;

/// Handle flags merged with the declaration's flags.
pub fn class_flags(ctx: &SearchContext<'_>, ty: TypeId) -> TyFlags {
    let data = ctx.interner().lookup(ty);
    match &*data {
        TypeData::Class(class) => {
            let declared = ctx
                .class_decl(class.name)
                .map_or(TyFlags::empty(), |decl| decl.flags);
            class.flags | declared
        }
        other => other.flags(),
    }
}

/// Whether [`resolve_one`] could return something other than `ty`.
pub fn will_resolve(ctx: &SearchContext<'_>, ty: TypeId) -> bool {
    let interner = ctx.interner();
    let data = interner.lookup(ty);
    match &*data {
        TypeData::Class(_) => {
            !class_flags(ctx, ty).intersects(TyFlags::ANONYMOUS | TyFlags::GLOBAL)
        }
        TypeData::Alias(_) => true,
        TypeData::Generic { base, .. } => interner
            .union_members(*base)
            .iter()
            .any(|member| will_resolve(ctx, *member)),
        _ => false,
    }
}

/// One resolution step.
pub fn resolve_one(ctx: &SearchContext<'_>, ty: TypeId) -> TypeId {
    let interner = ctx.interner();
    let data = interner.lookup(ty);
    match &*data {
        TypeData::Class(class) => {
            if !will_resolve(ctx, ty) {
                return ty;
            }
            ctx.alias_decl(class.name).map_or(ty, |decl| decl.ty)
        }
        TypeData::Alias(alias) => alias.target,
        TypeData::Generic { base, args } => {
            let resolved = resolve_with_args(ctx, *base, args);
            if resolved == *base { ty } else { resolved }
        }
        _ => ty,
    }
}

/// Resolve `base` instantiated with `args`.
pub fn resolve_with_args(ctx: &SearchContext<'_>, base: TypeId, args: &[TypeId]) -> TypeId {
    let interner = ctx.interner();
    let data = interner.lookup(base);
    match &*data {
        TypeData::Class(class) => {
            if !will_resolve(ctx, base) {
                return base;
            }
            match ctx.alias_decl(class.name) {
                Some(decl) if args.is_empty() => decl.ty,
                Some(decl) => interner.generic(decl.ty, args.iter().copied()),
                None => base,
            }
        }
        TypeData::Alias(alias) => {
            if alias.params.is_empty() || args.is_empty() {
                alias.target
            } else {
                let mut params = ParameterSubstitutor::with_args(interner, &alias.params, args);
                substitute(ctx, alias.target, &mut params)
            }
        }
        _ => base,
    }
}

/// Fully resolved members of `ty` (each union member resolved until it no
/// longer changes). Members reached twice are reported once.
pub fn resolved_members(ctx: &SearchContext<'_>, ty: TypeId) -> SmallVec<[TypeId; 4]> {
    let interner = ctx.interner();
    let members = interner.union_members(ty);
    if !members.iter().any(|member| will_resolve(ctx, *member)) {
        return members;
    }

    let mut out: SmallVec<[TypeId; 4]> = SmallVec::new();
    let mut visited: FxHashSet<TypeId> = FxHashSet::default();
    let mut pending: Vec<TypeId> = members.into_iter().rev().collect();
    if pending.len() > 1 {
        visited.insert(ty);
    }

    while let Some(current) = pending.pop() {
        if ctx.is_canceled() {
            break;
        }
        if !visited.insert(current) {
            continue;
        }
        let resolved = resolve_one(ctx, current);
        if resolved == current {
            if !out.contains(&current) {
                out.push(current);
            }
        } else {
            pending.extend(interner.union_members(resolved).into_iter().rev());
        }
    }
    out
}

/// `ty` with every alias and alias-named class expanded. A cycle resolves
/// to `void`.
pub fn resolve(ctx: &SearchContext<'_>, ty: TypeId) -> TypeId {
    let interner = ctx.interner();
    let members = interner.union_members(ty);
    if !members.iter().any(|member| will_resolve(ctx, *member)) {
        return ty;
    }

    let resolved = resolved_members(ctx, ty);
    if resolved.len() == members.len() && resolved.iter().all(|r| members.contains(r)) {
        return ty;
    }
    match resolved.len() {
        0 => TypeId::VOID,
        1 => resolved[0],
        _ => union_all(ctx, resolved),
    }
}

/// The declared parameters of a class, alias or generic base.
pub fn params_of(ctx: &SearchContext<'_>, ty: TypeId) -> Vec<TypeId> {
    let data = ctx.interner().lookup(ty);
    match &*data {
        TypeData::Class(class) => ctx
            .class_decl(class.name)
            .map(|decl| decl.params.clone())
            .unwrap_or_default(),
        TypeData::Alias(alias) => alias.params.clone(),
        TypeData::Generic { base, .. } => params_of(ctx, *base),
        _ => Vec::new(),
    }
}

/// Parameters of a generic base after alias expansion: a class reference
/// named after a generic alias yields the alias's parameters.
pub fn generic_base_params(ctx: &SearchContext<'_>, base: TypeId) -> Vec<TypeId> {
    let data = ctx.interner().lookup(base);
    if let TypeData::Class(class) = &*data
        && !class_flags(ctx, base).intersects(TyFlags::ANONYMOUS | TyFlags::GLOBAL)
        && let Some(decl) = ctx.alias_decl(class.name)
    {
        return params_of(ctx, decl.ty);
    }
    params_of(ctx, base)
}

pub fn super_class(ctx: &SearchContext<'_>, ty: TypeId) -> Option<TypeId> {
    let interner = ctx.interner();
    let data = interner.lookup(ty);
    match &*data {
        TypeData::Literal(literal) => Some(literal.kind.type_id()),
        TypeData::Class(class) => {
            if let Some(decl) = ctx.class_decl(class.name)
                && let Some(super_class) = decl.super_class
            {
                return Some(super_class);
            }
            let name = interner.resolve_atom(class.name);
            name.strip_suffix(SELF_CLASS_SUFFIX)
                .map(|owner| interner.class_ref(owner))
        }
        TypeData::GenericParam(param) => param.bound,
        TypeData::Generic { base, args } => {
            let base_super = super_class(ctx, *base)?;
            if !matches!(&*interner.lookup(base_super), TypeData::Generic { .. }) {
                return Some(base_super);
            }
            let params = params_of(ctx, *base);
            if params.is_empty() {
                return Some(base_super);
            }
            let mut substitutor = ParameterSubstitutor::with_args(interner, &params, args);
            Some(substitute(ctx, base_super, &mut substitutor))
        }
        _ => None,
    }
}

/// Walk the superclass chain of `start` (excluding `start`). Stops when `f`
/// returns `false` (the result is then `false`), at the end of the chain, or
/// at the first superclass whose display name was already seen.
pub fn process_super_classes(
    ctx: &SearchContext<'_>,
    start: TypeId,
    mut f: impl FnMut(TypeId) -> bool,
) -> bool {
    let interner = ctx.interner();
    let mut seen: FxHashSet<Arc<str>> = FxHashSet::default();
    seen.insert(interner.display_name(start));
    let mut current = start;
    while let Some(next) = super_class(ctx, current) {
        if ctx.is_canceled() || !seen.insert(interner.display_name(next)) {
            break;
        }
        if !f(next) {
            return false;
        }
        current = next;
    }
    true
}

/// Whether compatibility with `ty` is decided by members rather than name.
pub fn is_shape(ctx: &SearchContext<'_>, ty: TypeId) -> bool {
    let data = ctx.interner().lookup(ty);
    match &*data {
        TypeData::Class(_) => {
            let resolved = resolve(ctx, ty);
            if resolved != ty {
                return is_shape(ctx, resolved);
            }
            class_flags(ctx, ty).contains(TyFlags::SHAPE)
        }
        TypeData::Generic { base, .. } => is_shape(ctx, *base),
        _ => false,
    }
}

/// Whether `ty` is an inline table type created for the table syntax at
/// `node`.
pub fn is_inline_table(ctx: &SearchContext<'_>, ty: TypeId, node: NodeId) -> bool {
    let data = ctx.interner().lookup(ty);
    let TypeData::Class(class) = &*data else {
        return false;
    };
    class.flags.contains(TyFlags::ANONYMOUS_TABLE)
        && ctx
            .class_decl(class.name)
            .is_some_and(|decl| decl.table_node == Some(node))
}

/// The truthiness of a value of type `ty`: `false` for `nil` and the
/// `false` literal, `boolean` when it can be either, `true` otherwise.
pub fn boolean_type(ctx: &SearchContext<'_>, ty: TypeId) -> TypeId {
    let interner = ctx.interner();
    let mut result: Option<TypeId> = None;
    for member in resolved_members(ctx, ty) {
        let truthiness = match &*interner.lookup(member) {
            TypeData::Nil => TypeId::FALSE,
            TypeData::Literal(_) if member == TypeId::FALSE => TypeId::FALSE,
            TypeData::Primitive(PrimitiveKind::Boolean) => TypeId::BOOLEAN,
            _ => TypeId::TRUE,
        };
        result = Some(match result {
            None => truthiness,
            Some(acc) if acc == truthiness => acc,
            Some(_) => TypeId::BOOLEAN,
        });
        if result == Some(TypeId::BOOLEAN) {
            break;
        }
    }
    result.unwrap_or(TypeId::TRUE)
}

#[cfg(test)]
#[path = "../tests/resolve_tests.rs"]
mod tests;
