//! Union algebra.
//!
//! Unions are kept minimal on construction: a member that another member
//! already accepts is dropped, `true | false` collapses to `boolean`, and
//! `any` absorbs everything except multi-results.

use crate::context::SearchContext;
use crate::recursion::GuardSubject;
use crate::types::{TyKind, TypeData, TypeId, VarianceFlags};
use crate::variance::contravariant_of;
use crate::TypeInterner;
use smallvec::SmallVec;

/// Flags used when deciding whether one member subsumes another.
const SUBSUMPTION_FLAGS: VarianceFlags = VarianceFlags::STRICT_NIL
    .union(VarianceFlags::STRICT_UNKNOWN)
    .union(VarianceFlags::NON_STRUCTURAL);

pub fn union(ctx: &SearchContext<'_>, a: TypeId, b: TypeId) -> TypeId {
    if a == b {
        return a;
    }
    if a.is_void() {
        return b;
    }
    if b.is_void() {
        return a;
    }
    union_all(ctx, [a, b])
}

pub fn union_all(ctx: &SearchContext<'_>, types: impl IntoIterator<Item = TypeId>) -> TypeId {
    let interner = ctx.interner();
    let mut flat: SmallVec<[TypeId; 4]> = SmallVec::new();
    for ty in types {
        flat.extend(interner.union_members(ty).into_iter().filter(|m| !m.is_void()));
    }

    let has_multiple_results = flat
        .iter()
        .any(|member| interner.kind(*member) == TyKind::MultipleResults);
    if !has_multiple_results && flat.iter().any(|member| member.is_unknown()) {
        return TypeId::UNKNOWN;
    }

    let mut builder = UnionBuilder {
        ctx,
        children: SmallVec::new(),
    };
    for member in flat {
        builder.insert(member);
    }
    builder.finish()
}

struct UnionBuilder<'c, 'a> {
    ctx: &'c SearchContext<'a>,
    children: SmallVec<[TypeId; 4]>,
}

impl UnionBuilder<'_, '_> {
    fn subsumes(&self, target: TypeId, source: TypeId) -> bool {
        self.ctx
            .with_recursion_guard("union", GuardSubject::Pair(target, source), || {
                contravariant_of(self.ctx, target, source, SUBSUMPTION_FLAGS)
            })
            .unwrap_or(false)
    }

    fn insert(&mut self, member: TypeId) {
        if self.children.contains(&member) {
            return;
        }
        if self.children.iter().any(|child| self.subsumes(*child, member)) {
            return;
        }

        let sibling = match member {
            TypeId::TRUE => Some(TypeId::FALSE),
            TypeId::FALSE => Some(TypeId::TRUE),
            _ => None,
        };
        if let Some(sibling) = sibling
            && let Some(pos) = self.children.iter().position(|c| *c == sibling)
        {
            self.children.remove(pos);
            self.insert(TypeId::BOOLEAN);
            return;
        }

        let children = std::mem::take(&mut self.children);
        self.children = children
            .into_iter()
            .filter(|child| !self.subsumes(member, *child))
            .collect();
        self.children.push(member);
    }

    fn finish(self) -> TypeId {
        match self.children.len() {
            0 => TypeId::VOID,
            1 => self.children[0],
            _ => self.ctx.interner().union_normalized(self.children),
        }
    }
}

/// `a` without the members of `b`.
///
/// Only members `b` accepts outright are removed; `number` minus `5` is
/// still `number`. Removing one boolean literal from `boolean` leaves the
/// other literal.
pub fn not(ctx: &SearchContext<'_>, a: TypeId, b: TypeId) -> TypeId {
    let interner = ctx.interner();
    let mut children = interner.union_members(a);

    for removed in interner.union_members(b) {
        if let Some(pos) = children.iter().position(|c| *c == removed) {
            children.remove(pos);
            continue;
        }
        match removed {
            TypeId::TRUE | TypeId::FALSE => {
                if let Some(pos) = children.iter().position(|c| *c == TypeId::BOOLEAN) {
                    children.remove(pos);
                    let remaining = if removed == TypeId::TRUE {
                        TypeId::FALSE
                    } else {
                        TypeId::TRUE
                    };
                    if !children.contains(&remaining) {
                        children.push(remaining);
                    }
                }
            }
            TypeId::BOOLEAN => children.retain(|c| *c != TypeId::TRUE && *c != TypeId::FALSE),
            _ => children.retain(|child| {
                !contravariant_of(ctx, removed, *child, VarianceFlags::STRICT_NIL)
            }),
        }
    }

    match children.len() {
        0 => TypeId::VOID,
        1 => children[0],
        _ => interner.union_normalized(children),
    }
}

/// Visit each member of a union, or the type itself.
pub fn each(interner: &TypeInterner, ty: TypeId, mut f: impl FnMut(TypeId)) {
    match &*interner.lookup(ty) {
        TypeData::Union(members) => members.iter().copied().for_each(&mut f),
        _ => f(ty),
    }
}

/// Whether `member` is `ty` or one of its union members.
pub fn contains(interner: &TypeInterner, ty: TypeId, member: TypeId) -> bool {
    ty == member || interner.union_members(ty).contains(&member)
}

#[cfg(test)]
#[path = "../tests/union_tests.rs"]
mod tests;
