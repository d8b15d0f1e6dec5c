//! Declaration layer boundary.
//!
//! The engine does not parse, index or resolve identifiers. Everything it
//! needs to know about named types comes through [`DeclarationProvider`]:
//!
//! - **Classes**: members, superclass, generic parameters, call signatures
//! - **Aliases**: generic parameters and target
//! - **Lexical scopes**: which generic parameter a name refers to at a node
//! - **Syntax ancestry**: used to rank diagnostics by nesting depth
//! - **Inference**: the type of an expression node
//!
//! [`DeclarationStore`] is a concurrent in-memory provider. Hosts that already
//! have an index implement the trait directly.

use crate::context::SearchContext;
use crate::types::{MemberInfo, Signature, TyFlags, TypeId};
use dashmap::DashMap;
use luaty_common::{Atom, NodeId};
use rustc_hash::FxBuildHasher;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::trace;

/// Global counter for assigning unique instance IDs to `DeclarationStore` instances.
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Declarations
// =============================================================================

/// A class (or inline table shape) as declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: Atom,
    pub flags: TyFlags,
    pub super_class: Option<TypeId>,
    /// Generic parameters, each a `GenericParam` type.
    pub params: Vec<TypeId>,
    pub members: Vec<MemberInfo>,
    /// Signatures of a callable class (`---@overload` on a class).
    pub signatures: Vec<Signature>,
    /// A second class name whose members are merged into this one.
    pub alias_name: Option<Atom>,
    /// The table constructor this shape was inferred from, if any.
    pub table_node: Option<NodeId>,
}

impl ClassDecl {
    pub fn new(name: Atom) -> Self {
        ClassDecl {
            name,
            flags: TyFlags::empty(),
            super_class: None,
            params: Vec::new(),
            members: Vec::new(),
            signatures: Vec::new(),
            alias_name: None,
            table_node: None,
        }
    }

    pub fn with_flags(mut self, flags: TyFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_super(mut self, super_class: TypeId) -> Self {
        self.super_class = Some(super_class);
        self
    }

    pub fn with_params(mut self, params: Vec<TypeId>) -> Self {
        self.params = params;
        self
    }

    pub fn with_member(mut self, member: MemberInfo) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = MemberInfo>) -> Self {
        self.members.extend(members);
        self
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    pub fn with_alias_name(mut self, alias_name: Atom) -> Self {
        self.alias_name = Some(alias_name);
        self
    }

    pub fn with_table_node(mut self, node: NodeId) -> Self {
        self.table_node = Some(node);
        self
    }
}

/// An alias as declared. `ty` is the interned `Alias` type value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasDecl {
    pub name: Atom,
    pub ty: TypeId,
}

// =============================================================================
// DeclarationProvider
// =============================================================================

pub trait DeclarationProvider {
    fn class(&self, name: Atom) -> Option<Arc<ClassDecl>>;

    fn alias(&self, name: Atom) -> Option<Arc<AliasDecl>>;

    /// The type a name denotes in the lexical scope enclosing `scope`, if the
    /// name is a scoped generic parameter there.
    fn scoped_type(&self, _scope: NodeId, _name: Atom) -> Option<TypeId> {
        None
    }

    fn parent(&self, _node: NodeId) -> Option<NodeId> {
        None
    }

    /// The inferred type of an expression node.
    fn infer(&self, _ctx: &SearchContext<'_>, _node: NodeId) -> Option<TypeId> {
        None
    }

    /// Whether declarations may currently be incomplete (indexing).
    fn is_dumb(&self) -> bool {
        false
    }
}

// =============================================================================
// DeclarationStore
// =============================================================================

/// Thread-safe in-memory declaration provider.
pub struct DeclarationStore {
    /// Unique instance ID for debugging (tracks which store instance this is)
    instance_id: u64,
    classes: DashMap<Atom, Arc<ClassDecl>, FxBuildHasher>,
    aliases: DashMap<Atom, Arc<AliasDecl>, FxBuildHasher>,
    scoped: DashMap<(NodeId, Atom), TypeId, FxBuildHasher>,
    parents: DashMap<NodeId, NodeId, FxBuildHasher>,
    node_types: DashMap<NodeId, TypeId, FxBuildHasher>,
    dumb: AtomicBool,
}

impl Default for DeclarationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclarationStore {
    pub fn new() -> Self {
        let instance_id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::SeqCst);
        trace!(instance_id, "DeclarationStore::new - creating new instance");
        DeclarationStore {
            instance_id,
            classes: DashMap::with_hasher(FxBuildHasher),
            aliases: DashMap::with_hasher(FxBuildHasher),
            scoped: DashMap::with_hasher(FxBuildHasher),
            parents: DashMap::with_hasher(FxBuildHasher),
            node_types: DashMap::with_hasher(FxBuildHasher),
            dumb: AtomicBool::new(false),
        }
    }

    /// Register (or replace) a class declaration.
    pub fn register_class(&self, decl: ClassDecl) {
        trace!(
            instance_id = self.instance_id,
            class = decl.name.0,
            members = decl.members.len(),
            "DeclarationStore::register_class"
        );
        self.classes.insert(decl.name, Arc::new(decl));
    }

    /// Register (or replace) an alias. `alias_ty` must be an `Alias` type.
    pub fn register_alias(&self, name: Atom, alias_ty: TypeId) {
        trace!(
            instance_id = self.instance_id,
            alias = name.0,
            ty = alias_ty.0,
            "DeclarationStore::register_alias"
        );
        self.aliases.insert(name, Arc::new(AliasDecl { name, ty: alias_ty }));
    }

    /// Declare that `name` means `ty` inside the scope rooted at `scope`.
    pub fn register_scoped_type(&self, scope: NodeId, name: Atom, ty: TypeId) {
        self.scoped.insert((scope, name), ty);
    }

    pub fn set_parent(&self, node: NodeId, parent: NodeId) {
        self.parents.insert(node, parent);
    }

    pub fn set_node_type(&self, node: NodeId, ty: TypeId) {
        self.node_types.insert(node, ty);
    }

    pub fn set_dumb(&self, dumb: bool) {
        self.dumb.store(dumb, Ordering::SeqCst);
    }

    pub fn contains_class(&self, name: Atom) -> bool {
        self.classes.contains_key(&name)
    }

    pub fn remove_class(&self, name: Atom) -> Option<Arc<ClassDecl>> {
        self.classes.remove(&name).map(|(_, decl)| decl)
    }

    pub fn stats(&self) -> DeclarationStoreStats {
        DeclarationStoreStats {
            classes: self.classes.len(),
            aliases: self.aliases.len(),
            scoped_types: self.scoped.len(),
            node_types: self.node_types.len(),
        }
    }
}

impl DeclarationProvider for DeclarationStore {
    fn class(&self, name: Atom) -> Option<Arc<ClassDecl>> {
        self.classes.get(&name).map(|entry| entry.clone())
    }

    fn alias(&self, name: Atom) -> Option<Arc<AliasDecl>> {
        self.aliases.get(&name).map(|entry| entry.clone())
    }

    fn scoped_type(&self, scope: NodeId, name: Atom) -> Option<TypeId> {
        // Walk outwards so inner scopes shadow outer ones.
        // Bounded by the number of recorded edges in case the host built a cycle.
        let mut current = Some(scope);
        let mut remaining = self.parents.len() + 1;
        while let Some(node) = current {
            if let Some(ty) = self.scoped.get(&(node, name)) {
                return Some(*ty);
            }
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            current = self.parent(node);
        }
        None
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(&node).map(|parent| *parent)
    }

    fn infer(&self, _ctx: &SearchContext<'_>, node: NodeId) -> Option<TypeId> {
        self.node_types.get(&node).map(|ty| *ty)
    }

    fn is_dumb(&self) -> bool {
        self.dumb.load(Ordering::SeqCst)
    }
}

/// Statistics about a declaration store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclarationStoreStats {
    pub classes: usize,
    pub aliases: usize,
    pub scoped_types: usize,
    pub node_types: usize,
}

#[cfg(test)]
#[path = "../tests/decl_tests.rs"]
mod tests;
