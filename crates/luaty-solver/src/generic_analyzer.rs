//! Generic parameter inference.
//!
//! A [`GenericAnalyzer`] walks a concrete argument type and the declared
//! parameter type side by side. Whenever the declared side reaches one of
//! the generic parameters being inferred, the concrete type found at the
//! same position becomes (or is merged into) that parameter's binding.
//!
//! Merging keeps whichever of the old and new binding accepts the other and
//! falls back to their union. A concrete type outside the parameter's bound
//! resets the binding to the abstract parameter.

use crate::context::SearchContext;
use crate::members::{
    create_table_generic_from_members, find_indexer, find_member, is_array, member_type,
    process_members,
};
use crate::multiple_results::{convolve, flatten};
use crate::resolve::{is_shape, params_of, resolve, resolved_members};
use crate::substitute::{GenericParameterResolutionSubstitutor, ParameterSubstitutor, substitute};
use crate::types::{MemberKey, TyFlags, TypeData, TypeId, VarianceFlags};
use crate::union::union;
use crate::variance::contravariant_of;
use indexmap::IndexMap;
use luaty_common::{Atom, NodeId, limits};
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use tracing::trace;

pub struct GenericAnalyzer<'c, 'a> {
    ctx: &'c SearchContext<'a>,
    /// Parameters being inferred, by qualified name.
    params: FxHashMap<Atom, TypeId>,
    bindings: IndexMap<Atom, TypeId, FxBuildHasher>,
    /// The concrete type at the current position of the walk.
    cur: TypeId,
    visited: FxHashSet<TypeId>,
    /// Argument nodes of the call being analyzed.
    call_nodes: FxHashSet<NodeId>,
}

impl<'c, 'a> GenericAnalyzer<'c, 'a> {
    pub fn new(ctx: &'c SearchContext<'a>, params: &[TypeId]) -> Self {
        let interner = ctx.interner();
        let params = params
            .iter()
            .filter_map(|param| match &*interner.lookup(*param) {
                TypeData::GenericParam(info) => Some((info.name, *param)),
                _ => None,
            })
            .collect();
        GenericAnalyzer {
            ctx,
            params,
            bindings: IndexMap::default(),
            cur: TypeId::VOID,
            visited: FxHashSet::default(),
            call_nodes: FxHashSet::default(),
        }
    }

    /// Table constructors written directly in these argument positions are
    /// compared with `WIDEN_TABLES`.
    pub fn with_call_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.call_nodes.extend(nodes);
        self
    }

    /// Bind parameters mentioned in `param` from the concrete `arg`.
    pub fn analyze(&mut self, arg: TypeId, param: TypeId) {
        let ctx = self.ctx;
        self.cur = arg;
        self.warp(arg, |this| this.accept(resolve(ctx, param)));
        self.cur = TypeId::VOID;
    }

    pub fn bindings(&self) -> &IndexMap<Atom, TypeId, FxBuildHasher> {
        &self.bindings
    }

    pub fn binding(&self, name: Atom) -> Option<TypeId> {
        self.bindings.get(&name).copied()
    }

    /// The inferred substitution. Parameters left unbound (or bound to
    /// `void`) fall back to their upper bound when they have one.
    pub fn into_substitutor(self) -> ParameterSubstitutor {
        let interner = self.ctx.interner();
        let mut map: FxHashMap<Atom, TypeId> = self
            .bindings
            .iter()
            .filter(|(_, ty)| !ty.is_void())
            .map(|(name, ty)| (*name, *ty))
            .collect();
        for (name, param) in &self.params {
            if map.contains_key(name) {
                continue;
            }
            if let TypeData::GenericParam(info) = &*interner.lookup(*param)
                && let Some(bound) = info.bound
            {
                map.insert(*name, bound);
            }
        }
        ParameterSubstitutor::new(map)
    }

    fn snapshot(&self) -> ParameterSubstitutor {
        ParameterSubstitutor::new(self.bindings.iter().map(|(k, v)| (*k, *v)).collect())
    }

    /// Run `f` with the walk positioned at `ty`. `void` positions are skipped.
    fn warp(&mut self, ty: TypeId, f: impl FnOnce(&mut Self)) {
        if ty.is_void() {
            return;
        }
        let saved = self.cur;
        self.cur = resolve(self.ctx, ty);
        f(self);
        self.cur = saved;
    }

    fn accept(&mut self, ty: TypeId) {
        if self.ctx.is_canceled() || !self.visited.insert(ty) {
            return;
        }
        self.visit(ty);
        self.visited.remove(&ty);
    }

    fn visit(&mut self, ty: TypeId) {
        let ctx = self.ctx;
        let data = ctx.interner().lookup(ty);
        match &*data {
            TypeData::Alias(alias) => self.accept(alias.target),
            TypeData::MultipleResults(results) => {
                let current = flatten(ctx, self.cur);
                match &*ctx.interner().lookup(current) {
                    TypeData::MultipleResults(other) => {
                        let pairs: Vec<_> = convolve(ctx, results, other, true).collect();
                        for (declared, concrete) in pairs {
                            self.warp(concrete.unwrap_or(TypeId::NIL), |this| {
                                this.accept(declared)
                            });
                        }
                    }
                    _ => {
                        if let Some(first) = results.list.first() {
                            self.accept(*first);
                        }
                    }
                }
            }
            TypeData::Class(_) => {
                self.visit_class_params(ty);
                if is_shape(ctx, ty) {
                    self.visit_shape(ty);
                }
            }
            TypeData::GenericParam(info) => self.bind(info.name),
            TypeData::Union(members) => {
                for member in members.iter() {
                    for resolved in resolved_members(ctx, *member) {
                        self.accept(resolved);
                    }
                }
            }
            TypeData::Array(base) => self.visit_array(*base),
            TypeData::Function(function) => {
                let Some(declared_return) = function.main.return_ty else {
                    return;
                };
                for source in resolved_members(ctx, self.cur) {
                    if let TypeData::Function(other) = &*ctx.interner().lookup(source)
                        && let Some(concrete_return) = other.main.return_ty
                    {
                        self.warp(concrete_return, |this| {
                            this.accept(resolve(ctx, declared_return))
                        });
                    }
                }
            }
            TypeData::Generic { base, args } => self.visit_generic(ty, *base, args),
            _ => {}
        }
    }

    fn bind(&mut self, name: Atom) {
        let Some(&param) = self.params.get(&name) else {
            return;
        };
        let ctx = self.ctx;
        let resolved_param = substitute(ctx, param, &mut GenericParameterResolutionSubstitutor);

        for concrete in resolved_members(ctx, self.cur) {
            let mapped = self.binding(name);
            let current = substitute(ctx, concrete, &mut self.snapshot());
            let within_bound = contravariant_of(
                ctx,
                resolved_param,
                current,
                VarianceFlags::ABSTRACT_PARAMS | VarianceFlags::STRICT_UNKNOWN,
            );

            let bound = if !within_bound {
                param
            } else {
                match mapped {
                    None => current,
                    Some(existing)
                        if contravariant_of(ctx, existing, current, self.variance_flags(current)) =>
                    {
                        existing
                    }
                    Some(existing)
                        if contravariant_of(ctx, current, existing, self.variance_flags(existing)) =>
                    {
                        current
                    }
                    Some(existing) => union(ctx, existing, current),
                }
            };
            trace!(param = name.0, ty = bound.0, within_bound, "GenericAnalyzer::bind");
            self.bindings.insert(name, bound);
        }
    }

    fn variance_flags(&self, ty: TypeId) -> VarianceFlags {
        if self.is_inline_table(ty) {
            VarianceFlags::STRICT_UNKNOWN | VarianceFlags::WIDEN_TABLES
        } else {
            VarianceFlags::STRICT_UNKNOWN
        }
    }

    /// Whether `ty` is a table constructor written in (or nested inside) an
    /// argument of the call.
    fn is_inline_table(&self, ty: TypeId) -> bool {
        let ctx = self.ctx;
        let data = ctx.interner().lookup(ty);
        let TypeData::Class(class) = &*data else {
            return false;
        };
        if !class.flags.contains(TyFlags::ANONYMOUS_TABLE) {
            return false;
        }
        let Some(mut node) = ctx.class_decl(class.name).and_then(|decl| decl.table_node) else {
            return false;
        };
        for _ in 0..limits::MAX_ANCESTOR_WALK {
            if self.call_nodes.contains(&node) {
                return true;
            }
            match ctx.parent(node) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
        false
    }

    /// Declared parameters of the concrete class against those of `class`.
    fn visit_class_params(&mut self, class: TypeId) {
        let ctx = self.ctx;
        let declared = params_of(ctx, class);
        if declared.is_empty() {
            return;
        }
        for source in resolved_members(ctx, self.cur) {
            if source == class || !matches!(&*ctx.interner().lookup(source), TypeData::Class(_)) {
                continue;
            }
            for (concrete, param) in params_of(ctx, source).into_iter().zip(&declared) {
                self.warp(concrete, |this| this.accept(resolve(ctx, *param)));
            }
        }
    }

    fn visit_shape(&mut self, shape: TypeId) {
        let ctx = self.ctx;
        for source in resolved_members(ctx, self.cur) {
            let mut pairs: Vec<(TypeId, TypeId)> = Vec::new();
            process_members(ctx, source, true, &mut |source_member| {
                let shape_member = match source_member.key {
                    MemberKey::Index(index) => find_indexer(ctx, shape, index, false),
                    MemberKey::Name(name) => find_member(ctx, shape, name),
                };
                if let Some(shape_member) = shape_member
                    && shape_member.ty.is_some()
                {
                    pairs.push((
                        member_type(ctx, source, source_member),
                        member_type(ctx, shape, &shape_member),
                    ));
                }
                true
            });
            for (concrete, declared) in pairs {
                self.warp(concrete, |this| this.accept(resolve(ctx, declared)));
            }
        }
    }

    fn visit_array(&mut self, base: TypeId) {
        let ctx = self.ctx;
        let declared = resolve(ctx, base);
        for source in resolved_members(ctx, self.cur) {
            match &*ctx.interner().lookup(source) {
                TypeData::Array(source_base) => {
                    self.warp(*source_base, |this| this.accept(declared));
                }
                TypeData::Class(_) if is_array(ctx, source) => {
                    let mut values: Vec<TypeId> = Vec::new();
                    process_members(ctx, source, true, &mut |member| {
                        values.push(member.ty.unwrap_or(TypeId::UNKNOWN));
                        true
                    });
                    for value in values {
                        self.warp(value, |this| this.accept(declared));
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_generic(&mut self, generic: TypeId, base: TypeId, args: &[TypeId]) {
        let ctx = self.ctx;
        let interner = ctx.interner();

        if base == TypeId::TABLE && args.len() == 2 {
            let (key, value) = (resolve(ctx, args[0]), resolve(ctx, args[1]));
            for source in resolved_members(ctx, self.cur) {
                if source == TypeId::TABLE {
                    self.warp(TypeId::UNKNOWN, |this| this.accept(key));
                    self.warp(TypeId::UNKNOWN, |this| this.accept(value));
                } else if let TypeData::Array(source_base) = &*interner.lookup(source) {
                    self.warp(TypeId::NUMBER, |this| this.accept(key));
                    self.warp(*source_base, |this| this.accept(value));
                } else if is_shape(ctx, source) {
                    let table = create_table_generic_from_members(ctx, source);
                    if let TypeData::Generic { args: table_args, .. } = &*interner.lookup(table) {
                        for (concrete, declared) in table_args.iter().zip([key, value]) {
                            self.warp(*concrete, |this| this.accept(declared));
                        }
                    }
                }
            }
        } else if is_shape(ctx, base) {
            self.visit_shape(generic);
        }

        let declared_base = resolve(ctx, base);
        for source in resolved_members(ctx, self.cur) {
            if let TypeData::Generic {
                base: source_base,
                args: source_args,
            } = &*interner.lookup(source)
            {
                if *source_base != declared_base {
                    self.warp(*source_base, |this| this.accept(declared_base));
                }
                for (concrete, declared) in source_args.iter().zip(args) {
                    self.warp(*concrete, |this| this.accept(resolve(ctx, *declared)));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/generic_analyzer_tests.rs"]
mod tests;
