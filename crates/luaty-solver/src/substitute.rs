//! Substitution engine.
//!
//! [`substitute`] rebuilds a type through a [`TypeSubstitutor`], visiting
//! children first and re-interning a node only when one of its children
//! actually changed. Unchanged subtrees keep their handle, so callers can
//! test `substituted == original` to learn whether anything happened.
//!
//! Substitutors override the hooks for the variants they care about:
//!
//! | Substitutor | Rewrites |
//! |---|---|
//! | [`AliasSubstitutor`] | alias references into their targets |
//! | [`ParameterSubstitutor`] | generic parameters into bound types |
//! | [`SelfSubstitutor`] | `X:self` receiver classes into the call receiver |
//! | [`ScopeSubstitutor`] | names into the generic parameter in scope |
//! | [`GenericParameterResolutionSubstitutor`] | aliases inside parameter bounds |
//! | [`ChainSubstitutor`] | any of the above, folded left to right |

use crate::context::SearchContext;
use crate::multiple_results::get_result;
use crate::resolve::{resolve, will_resolve};
use crate::types::{GenericParamInfo, Signature, TyFlags, TypeData, TypeId};
use crate::union::union_all;
use crate::TypeInterner;
use luaty_common::{Atom, NodeId};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::trace;

// =============================================================================
// Trait and dispatch
// =============================================================================

pub trait TypeSubstitutor {
    fn substitute_alias(&mut self, _ctx: &SearchContext<'_>, alias: TypeId) -> TypeId {
        alias
    }

    /// Called for `Class` and `GenericParam` values.
    fn substitute_class(&mut self, _ctx: &SearchContext<'_>, class: TypeId) -> TypeId {
        class
    }

    fn substitute_generic(&mut self, ctx: &SearchContext<'_>, generic: TypeId) -> TypeId {
        walk_generic(ctx, generic, self)
    }

    fn substitute_function(&mut self, ctx: &SearchContext<'_>, function: TypeId) -> TypeId {
        walk_function(ctx, function, self)
    }
}

pub fn substitute<S: TypeSubstitutor + ?Sized>(
    ctx: &SearchContext<'_>,
    ty: TypeId,
    substitutor: &mut S,
) -> TypeId {
    let interner = ctx.interner();
    let data = interner.lookup(ty);
    match &*data {
        TypeData::Alias(_) => substitutor.substitute_alias(ctx, ty),
        TypeData::Class(_) | TypeData::GenericParam(_) => substitutor.substitute_class(ctx, ty),
        TypeData::Generic { .. } => substitutor.substitute_generic(ctx, ty),
        TypeData::Function(_) => substitutor.substitute_function(ctx, ty),
        TypeData::Array(base) => {
            let substituted = get_result(ctx, substitute(ctx, *base, substitutor), 0);
            if substituted == *base {
                ty
            } else {
                interner.array(substituted)
            }
        }
        TypeData::Union(members) => {
            let mut changed = false;
            let substituted: SmallVec<[TypeId; 4]> = members
                .iter()
                .map(|member| {
                    let substituted = substitute(ctx, *member, substitutor);
                    changed |= substituted != *member;
                    substituted
                })
                .collect();
            if changed {
                union_all(ctx, substituted)
            } else {
                ty
            }
        }
        TypeData::MultipleResults(results) => {
            substitute_multiple_results(ctx, ty, &results.list, results.variadic, substitutor)
        }
        TypeData::Unknown
        | TypeData::Nil
        | TypeData::Void
        | TypeData::Primitive(_)
        | TypeData::Literal(_)
        | TypeData::Snippet(_) => ty,
    }
}

/// Nested multi-results are spliced into the outer list. A variadic outer
/// list instead folds each nested list into a running union, since its tail
/// position can only hold one type.
fn substitute_multiple_results<S: TypeSubstitutor + ?Sized>(
    ctx: &SearchContext<'_>,
    ty: TypeId,
    list: &[TypeId],
    variadic: bool,
    substitutor: &mut S,
) -> TypeId {
    let interner = ctx.interner();
    let mut changed = false;
    let mut result_variadic = variadic;
    let mut out: SmallVec<[TypeId; 4]> = SmallVec::with_capacity(list.len());
    let last = list.len().saturating_sub(1);

    for (i, item) in list.iter().enumerate() {
        let substituted = substitute(ctx, *item, substitutor);
        if substituted == *item {
            out.push(substituted);
            continue;
        }
        changed = true;
        match &*interner.lookup(substituted) {
            TypeData::MultipleResults(nested) if variadic => {
                let mut aggregate: Option<TypeId> = None;
                for member in &nested.list {
                    let next = match aggregate {
                        Some(acc) => crate::union::union(ctx, acc, *member),
                        None => *member,
                    };
                    aggregate = Some(next);
                    out.push(next);
                }
            }
            TypeData::MultipleResults(nested) => {
                if nested.variadic && i == last {
                    result_variadic = true;
                }
                out.extend(nested.list.iter().copied());
            }
            _ => out.push(substituted),
        }
    }

    if changed {
        interner.multiple_results(out, result_variadic)
    } else {
        ty
    }
}

/// Default generic walk: arguments (first value only), then the base.
pub fn walk_generic<S: TypeSubstitutor + ?Sized>(
    ctx: &SearchContext<'_>,
    generic: TypeId,
    substitutor: &mut S,
) -> TypeId {
    let interner = ctx.interner();
    let data = interner.lookup(generic);
    let TypeData::Generic { base, args } = &*data else {
        return generic;
    };

    let mut changed = false;
    let new_args: SmallVec<[TypeId; 2]> = args
        .iter()
        .map(|arg| {
            let substituted = get_result(ctx, substitute(ctx, *arg, substitutor), 0);
            changed |= substituted != *arg;
            substituted
        })
        .collect();
    let new_base = substitute(ctx, *base, substitutor);

    if changed || new_base != *base {
        interner.generic(new_base, new_args)
    } else {
        generic
    }
}

/// Default function walk: every signature, keeping the function flags.
pub fn walk_function<S: TypeSubstitutor + ?Sized>(
    ctx: &SearchContext<'_>,
    function: TypeId,
    substitutor: &mut S,
) -> TypeId {
    let interner = ctx.interner();
    let data = interner.lookup(function);
    let TypeData::Function(func) = &*data else {
        return function;
    };

    let main = substituted_signature(ctx, &func.main, substitutor);
    let mut overloads_changed = false;
    let overloads: Vec<Signature> = func
        .overloads
        .iter()
        .map(|overload| match substituted_signature(ctx, overload, substitutor) {
            Some(substituted) => {
                overloads_changed = true;
                substituted
            }
            None => overload.clone(),
        })
        .collect();

    if main.is_none() && !overloads_changed {
        return function;
    }
    let main = main.unwrap_or_else(|| func.main.clone());
    interner.function(main, overloads, func.flags)
}

pub fn substitute_signature<S: TypeSubstitutor + ?Sized>(
    ctx: &SearchContext<'_>,
    signature: &Signature,
    substitutor: &mut S,
) -> Signature {
    substituted_signature(ctx, signature, substitutor).unwrap_or_else(|| signature.clone())
}

/// `None` when nothing in the signature changed.
fn substituted_signature<S: TypeSubstitutor + ?Sized>(
    ctx: &SearchContext<'_>,
    signature: &Signature,
    substitutor: &mut S,
) -> Option<Signature> {
    let mut changed = false;
    let mut out = signature.clone();

    for param in &mut out.params {
        if let Some(ty) = param.ty {
            let substituted = get_result(ctx, substitute(ctx, ty, substitutor), 0);
            if substituted != ty {
                param.ty = Some(substituted);
                changed = true;
            }
        }
    }
    if let Some(ty) = signature.return_ty {
        let substituted = substitute(ctx, ty, substitutor);
        if substituted != ty {
            out.return_ty = Some(substituted);
            changed = true;
        }
    }
    if let Some(ty) = signature.variadic {
        let substituted = get_result(ctx, substitute(ctx, ty, substitutor), 0);
        if substituted != ty {
            out.variadic = Some(substituted);
            changed = true;
        }
    }

    changed.then_some(out)
}

// =============================================================================
// AliasSubstitutor
// =============================================================================

/// Expands aliases, including class references whose name is an alias.
/// An alias already being expanded is left as-is; a generic alias that
/// re-enters itself becomes `void`.
#[derive(Debug, Default)]
pub struct AliasSubstitutor {
    processing: FxHashSet<Atom>,
}

impl AliasSubstitutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TypeSubstitutor for AliasSubstitutor {
    fn substitute_alias(&mut self, ctx: &SearchContext<'_>, alias: TypeId) -> TypeId {
        let data = ctx.interner().lookup(alias);
        let TypeData::Alias(info) = &*data else {
            return alias;
        };
        if !info.params.is_empty() || !self.processing.insert(info.name) {
            return alias;
        }
        let expanded = substitute(ctx, info.target, self);
        self.processing.remove(&info.name);
        expanded
    }

    fn substitute_generic(&mut self, ctx: &SearchContext<'_>, generic: TypeId) -> TypeId {
        let interner = ctx.interner();
        let data = interner.lookup(generic);
        let TypeData::Generic { base, args } = &*data else {
            return generic;
        };

        let alias = match &*interner.lookup(*base) {
            TypeData::Alias(_) => Some(*base),
            TypeData::Class(class) if !class.flags.intersects(TyFlags::ANONYMOUS | TyFlags::GLOBAL) => {
                ctx.alias_decl(class.name).map(|decl| decl.ty)
            }
            _ => None,
        };
        let Some(alias) = alias else {
            return walk_generic(ctx, generic, self);
        };
        let alias_data = interner.lookup(alias);
        let TypeData::Alias(info) = &*alias_data else {
            return walk_generic(ctx, generic, self);
        };

        if !self.processing.insert(info.name) {
            trace!(alias = info.name.0, "AliasSubstitutor - generic alias cycle");
            return TypeId::VOID;
        }
        let mut params = ParameterSubstitutor::with_args(interner, &info.params, args);
        let instantiated = substitute(ctx, info.target, &mut params);
        let expanded = substitute(ctx, instantiated, self);
        self.processing.remove(&info.name);
        expanded
    }

    fn substitute_class(&mut self, ctx: &SearchContext<'_>, class: TypeId) -> TypeId {
        let data = ctx.interner().lookup(class);
        let TypeData::Class(info) = &*data else {
            return class;
        };
        if info.flags.intersects(TyFlags::ANONYMOUS | TyFlags::GLOBAL) {
            return class;
        }
        match ctx.alias_decl(info.name) {
            Some(decl) => substitute(ctx, decl.ty, self),
            None => class,
        }
    }
}

// =============================================================================
// ParameterSubstitutor
// =============================================================================

/// Replaces generic parameters (by qualified name) with bound types.
#[derive(Clone, Debug, Default)]
pub struct ParameterSubstitutor {
    map: FxHashMap<Atom, TypeId>,
}

impl ParameterSubstitutor {
    pub fn new(map: FxHashMap<Atom, TypeId>) -> Self {
        ParameterSubstitutor { map }
    }

    /// Pair declared parameters with arguments positionally; extra entries
    /// on either side are ignored.
    pub fn with_args(interner: &TypeInterner, params: &[TypeId], args: &[TypeId]) -> Self {
        let map = params
            .iter()
            .zip(args)
            .filter_map(|(param, arg)| match &*interner.lookup(*param) {
                TypeData::GenericParam(info) => Some((info.name, *arg)),
                _ => interner.class_name(*param).map(|name| (name, *arg)),
            })
            .collect();
        ParameterSubstitutor { map }
    }

    pub fn insert(&mut self, name: Atom, ty: TypeId) {
        self.map.insert(name, ty);
    }

    pub fn get(&self, name: Atom) -> Option<TypeId> {
        self.map.get(&name).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl TypeSubstitutor for ParameterSubstitutor {
    fn substitute_class(&mut self, ctx: &SearchContext<'_>, class: TypeId) -> TypeId {
        let interner = ctx.interner();
        let data = interner.lookup(class);
        match &*data {
            TypeData::GenericParam(info) => self.get(info.name).unwrap_or(class),
            TypeData::Class(info)
                if info.flags.contains(TyFlags::SHAPE)
                    && !info.flags.contains(TyFlags::ANONYMOUS_TABLE) =>
            {
                // A declared inline table that mentions enclosing generic
                // parameters is instantiated as a generic over itself.
                let Some(decl) = ctx.class_decl(info.name) else {
                    return class;
                };
                if decl.table_node.is_none() || decl.params.is_empty() {
                    return class;
                }
                let mut changed = false;
                let args: SmallVec<[TypeId; 2]> = decl
                    .params
                    .iter()
                    .map(|param| {
                        let substituted = substitute(ctx, *param, self);
                        changed |= substituted != *param;
                        substituted
                    })
                    .collect();
                if changed {
                    interner.generic(class, args)
                } else {
                    class
                }
            }
            _ => class,
        }
    }
}

// =============================================================================
// SelfSubstitutor
// =============================================================================

/// Replaces `X:self` classes with the receiver of a method call.
#[derive(Clone, Copy, Debug)]
pub struct SelfSubstitutor {
    receiver: TypeId,
}

impl SelfSubstitutor {
    pub fn new(receiver: TypeId) -> Self {
        SelfSubstitutor { receiver }
    }
}

impl TypeSubstitutor for SelfSubstitutor {
    fn substitute_class(&mut self, ctx: &SearchContext<'_>, class: TypeId) -> TypeId {
        if ctx.interner().is_self_class(class) {
            self.receiver
        } else {
            class
        }
    }
}

// =============================================================================
// ScopeSubstitutor
// =============================================================================

/// Rebinds a by-name class reference to the generic parameter of the same
/// name declared in the lexical scope of `scope`. Names with no parameter in
/// scope stay nominal, and parameters stay abstract.
#[derive(Clone, Copy, Debug)]
pub struct ScopeSubstitutor {
    scope: NodeId,
}

impl ScopeSubstitutor {
    pub fn new(scope: NodeId) -> Self {
        ScopeSubstitutor { scope }
    }
}

impl TypeSubstitutor for ScopeSubstitutor {
    fn substitute_class(&mut self, ctx: &SearchContext<'_>, class: TypeId) -> TypeId {
        let interner = ctx.interner();
        let data = interner.lookup(class);
        let TypeData::Class(info) = &*data else {
            return class;
        };
        if !info.flags.is_empty() {
            return class;
        }
        match ctx.scoped_type(self.scope, info.name) {
            Some(scoped) if matches!(&*interner.lookup(scoped), TypeData::GenericParam(_)) => scoped,
            _ => class,
        }
    }
}

// =============================================================================
// GenericParameterResolutionSubstitutor
// =============================================================================

/// Resolves aliases and class references reachable from generic parameter
/// bounds, so a bound written as an alias is compared by its target.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericParameterResolutionSubstitutor;

impl TypeSubstitutor for GenericParameterResolutionSubstitutor {
    fn substitute_class(&mut self, ctx: &SearchContext<'_>, class: TypeId) -> TypeId {
        let interner = ctx.interner();
        let data = interner.lookup(class);
        match &*data {
            TypeData::GenericParam(info) => {
                let Some(bound) = info.bound else {
                    return class;
                };
                let substituted = substitute(ctx, bound, self);
                if substituted == bound {
                    class
                } else {
                    interner.intern(TypeData::GenericParam(GenericParamInfo {
                        name: info.name,
                        var_name: info.var_name,
                        bound: Some(substituted),
                    }))
                }
            }
            TypeData::Class(info) if will_resolve(ctx, class) => {
                let resolved = resolve(ctx, class);
                if resolved == class {
                    return class;
                }
                ctx.with_search_guard(info.name, || substitute(ctx, resolved, self))
                    .unwrap_or(class)
            }
            _ => class,
        }
    }
}

// =============================================================================
// ChainSubstitutor
// =============================================================================

/// Applies each link in order, feeding the output of one into the next.
#[derive(Default)]
pub struct ChainSubstitutor {
    links: Vec<Box<dyn TypeSubstitutor>>,
}

impl ChainSubstitutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, link: impl TypeSubstitutor + 'static) -> Self {
        self.links.push(Box::new(link));
        self
    }

    pub fn append(mut self, other: ChainSubstitutor) -> Self {
        self.links.extend(other.links);
        self
    }

    /// `first` followed by `next`, where `first` may be absent.
    pub fn chain(first: Option<ChainSubstitutor>, next: impl TypeSubstitutor + 'static) -> Self {
        first.unwrap_or_default().then(next)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    fn fold(&mut self, ctx: &SearchContext<'_>, ty: TypeId) -> TypeId {
        self.links
            .iter_mut()
            .fold(ty, |ty, link| substitute(ctx, ty, link.as_mut()))
    }
}

impl TypeSubstitutor for ChainSubstitutor {
    fn substitute_alias(&mut self, ctx: &SearchContext<'_>, alias: TypeId) -> TypeId {
        self.fold(ctx, alias)
    }

    fn substitute_class(&mut self, ctx: &SearchContext<'_>, class: TypeId) -> TypeId {
        self.fold(ctx, class)
    }

    fn substitute_generic(&mut self, ctx: &SearchContext<'_>, generic: TypeId) -> TypeId {
        self.fold(ctx, generic)
    }

    fn substitute_function(&mut self, ctx: &SearchContext<'_>, function: TypeId) -> TypeId {
        self.fold(ctx, function)
    }
}

#[cfg(test)]
#[path = "../tests/substitute_tests.rs"]
mod tests;
