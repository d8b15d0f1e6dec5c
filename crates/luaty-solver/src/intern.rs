//! Type interning.
//!
//! The [`TypeInterner`] is the arena every type value lives in. Interning the
//! same [`TypeData`] twice returns the same [`TypeId`], which makes handle
//! comparison the fast path of equality and lets substitution return its input
//! untouched when nothing changed.
//!
//! The arena is shared across threads; each query thread runs its own
//! [`SearchContext`](crate::SearchContext) against it.

use crate::format::TypeFormatter;
use crate::types::{
    AliasType, ClassType, FunctionType, GLOBAL_CLASS_PREFIX, GenericParamInfo, LiteralType,
    MultipleResultsType, PrimitiveKind, SELF_CLASS_SUFFIX, Signature, TyFlags, TyKind, TypeData,
    TypeId,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use luaty_common::{Atom, Interner};
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

pub struct TypeInterner {
    map: DashMap<TypeData, TypeId, FxBuildHasher>,
    types: RwLock<Vec<Arc<TypeData>>>,
    strings: Interner,
    display_names: DashMap<TypeId, Arc<str>, FxBuildHasher>,
}

impl TypeInterner {
    pub fn new() -> Self {
        let interner = TypeInterner {
            map: DashMap::with_hasher(FxBuildHasher),
            types: RwLock::new(Vec::with_capacity(64)),
            strings: Interner::new(),
            display_names: DashMap::with_hasher(FxBuildHasher),
        };

        // Order matches the `TypeId` constants.
        let true_atom = interner.intern_string("true");
        let false_atom = interner.intern_string("false");
        let intrinsics = [
            TypeData::Unknown,
            TypeData::Nil,
            TypeData::Void,
            TypeData::Primitive(PrimitiveKind::Boolean),
            TypeData::Primitive(PrimitiveKind::String),
            TypeData::Primitive(PrimitiveKind::Number),
            TypeData::Primitive(PrimitiveKind::Table),
            TypeData::Primitive(PrimitiveKind::Function),
            TypeData::Literal(LiteralType {
                kind: PrimitiveKind::Boolean,
                value: true_atom,
            }),
            TypeData::Literal(LiteralType {
                kind: PrimitiveKind::Boolean,
                value: false_atom,
            }),
        ];
        for (expected, data) in intrinsics.into_iter().enumerate() {
            let id = interner.intern(data);
            debug_assert_eq!(id.0 as usize, expected);
        }

        interner
    }

    // =========================================================================
    // Core
    // =========================================================================

    pub fn intern(&self, data: TypeData) -> TypeId {
        if let Some(id) = self.map.get(&data) {
            return *id;
        }

        match self.map.entry(data) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
                let id = TypeId(types.len() as u32);
                types.push(Arc::new(entry.key().clone()));
                entry.insert(id);
                id
            }
        }
    }

    /// The data behind a handle. Handles from another interner resolve to
    /// `Unknown`.
    pub fn lookup(&self, id: TypeId) -> Arc<TypeData> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        types
            .get(id.0 as usize)
            .cloned()
            .unwrap_or_else(|| types[TypeId::UNKNOWN.0 as usize].clone())
    }

    #[inline]
    pub fn kind(&self, id: TypeId) -> TyKind {
        self.lookup(id).kind()
    }

    #[inline]
    pub fn flags(&self, id: TypeId) -> TyFlags {
        self.lookup(id).flags()
    }

    pub fn len(&self) -> usize {
        self.types.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= TypeId::FIRST_USER as usize
    }

    pub fn intern_string(&self, text: &str) -> Atom {
        self.strings.intern(text)
    }

    pub fn resolve_atom(&self, atom: Atom) -> Arc<str> {
        self.strings.resolve(atom)
    }

    /// Display name, cached per handle.
    pub fn display_name(&self, id: TypeId) -> Arc<str> {
        if let Some(name) = self.display_names.get(&id) {
            return name.clone();
        }
        let rendered: Arc<str> = Arc::from(TypeFormatter::new(self).render(id));
        self.display_names.insert(id, rendered.clone());
        rendered
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn literal(&self, kind: PrimitiveKind, value: &str) -> TypeId {
        let value = self.intern_string(value);
        self.intern(TypeData::Literal(LiteralType { kind, value }))
    }

    pub fn string_literal(&self, value: &str) -> TypeId {
        self.literal(PrimitiveKind::String, value)
    }

    pub fn number_literal(&self, value: &str) -> TypeId {
        self.literal(PrimitiveKind::Number, value)
    }

    pub fn boolean_literal(&self, value: bool) -> TypeId {
        if value { TypeId::TRUE } else { TypeId::FALSE }
    }

    pub fn array(&self, base: TypeId) -> TypeId {
        self.intern(TypeData::Array(base))
    }

    pub fn class(&self, name: &str, flags: TyFlags) -> TypeId {
        let name = self.intern_string(name);
        self.class_atom(name, flags)
    }

    pub fn class_atom(&self, name: Atom, flags: TyFlags) -> TypeId {
        self.intern(TypeData::Class(ClassType { name, flags }))
    }

    /// A plain by-name reference, as written in an annotation.
    pub fn class_ref(&self, name: &str) -> TypeId {
        self.class(name, TyFlags::empty())
    }

    /// The type of an undeclared global variable.
    pub fn global(&self, name: &str) -> TypeId {
        self.class(&format!("{GLOBAL_CLASS_PREFIX}{name}"), TyFlags::GLOBAL)
    }

    /// The inline shape type of a table literal.
    pub fn table_literal(&self, name: &str) -> TypeId {
        self.class(name, TyFlags::ANONYMOUS_TABLE | TyFlags::SHAPE)
    }

    /// The inline shape type of a declared table annotation (`{ a: T }`).
    pub fn doc_table(&self, name: &str) -> TypeId {
        self.class(name, TyFlags::SHAPE)
    }

    /// The synthesized receiver type of methods declared on `class`.
    pub fn self_class(&self, class_name: &str) -> TypeId {
        self.class(
            &format!("{class_name}{SELF_CLASS_SUFFIX}"),
            TyFlags::ANONYMOUS,
        )
    }

    pub fn alias(&self, name: &str, params: Vec<TypeId>, target: TypeId) -> TypeId {
        let name = self.intern_string(name);
        self.intern(TypeData::Alias(AliasType {
            name,
            params,
            target,
        }))
    }

    pub fn generic(&self, base: TypeId, args: impl IntoIterator<Item = TypeId>) -> TypeId {
        self.intern(TypeData::Generic {
            base,
            args: args.into_iter().collect(),
        })
    }

    pub fn function(&self, main: Signature, overloads: Vec<Signature>, flags: TyFlags) -> TypeId {
        self.intern(TypeData::Function(Box::new(FunctionType {
            main,
            overloads,
            flags,
        })))
    }

    pub fn signature_function(&self, main: Signature) -> TypeId {
        let flags = if main.colon_call {
            TyFlags::SELF_FUNCTION
        } else {
            TyFlags::empty()
        };
        self.function(main, Vec::new(), flags)
    }

    /// Raw multi-result constructor. Nested multi-results are not flattened
    /// here; see [`crate::multiple_results`].
    pub fn multiple_results(&self, list: impl IntoIterator<Item = TypeId>, variadic: bool) -> TypeId {
        self.intern(TypeData::MultipleResults(MultipleResultsType {
            list: list.into_iter().collect(),
            variadic,
        }))
    }

    /// `any...`, the return type of a signature with no declared return.
    pub fn unknown_results(&self) -> TypeId {
        self.multiple_results([TypeId::UNKNOWN], true)
    }

    pub fn generic_param(&self, name: &str, var_name: &str, bound: Option<TypeId>) -> TypeId {
        let name = self.intern_string(name);
        let var_name = self.intern_string(var_name);
        self.intern(TypeData::GenericParam(GenericParamInfo {
            name,
            var_name,
            bound,
        }))
    }

    pub fn snippet(&self, text: &str) -> TypeId {
        let text = self.intern_string(text);
        self.intern(TypeData::Snippet(text))
    }

    /// Intern a union from already-normalized members: no nested unions, no
    /// `Void`, at least two entries. Members are ordered and deduplicated by
    /// display name here.
    pub(crate) fn union_normalized(&self, mut members: SmallVec<[TypeId; 4]>) -> TypeId {
        members.sort_by_cached_key(|member| self.display_name(*member));
        members.dedup_by(|a, b| a == b || self.display_name(*a) == self.display_name(*b));

        match members.len() {
            0 => TypeId::VOID,
            1 => members[0],
            _ => {
                trace!(count = members.len(), "TypeInterner::union_normalized");
                self.intern(TypeData::Union(members))
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Members of a union, or the type itself.
    pub fn union_members(&self, id: TypeId) -> SmallVec<[TypeId; 4]> {
        match &*self.lookup(id) {
            TypeData::Union(members) => members.clone(),
            _ => smallvec::smallvec![id],
        }
    }

    pub fn class_name(&self, id: TypeId) -> Option<Atom> {
        match &*self.lookup(id) {
            TypeData::Class(class) => Some(class.name),
            TypeData::GenericParam(param) => Some(param.name),
            _ => None,
        }
    }

    pub fn is_self_class(&self, id: TypeId) -> bool {
        match &*self.lookup(id) {
            TypeData::Class(class) => self.resolve_atom(class.name).ends_with(SELF_CLASS_SUFFIX),
            _ => false,
        }
    }

    /// Widen a literal to its primitive; other types are returned unchanged.
    pub fn primitive_type(&self, id: TypeId) -> TypeId {
        match &*self.lookup(id) {
            TypeData::Literal(literal) => literal.kind.type_id(),
            _ => id,
        }
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "../tests/intern_tests.rs"]
mod tests;
