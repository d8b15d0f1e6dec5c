//! Per-query resolution state.
//!
//! A [`SearchContext`] is created for one query (a diagnostic pass over a
//! call, a hover, ...) and threaded by reference through every engine
//! operation. It owns nothing shared: the type arena and the declaration
//! provider are borrowed, everything else is interior-mutable state that
//! belongs to this query alone.
//!
//! The context is deliberately `!Sync`. Hosts that run queries on several
//! threads create one context per query; the guard sets and caches therefore
//! never need locks and never leak between threads.
//!
//! All scoped mutations (`with_index`, `with_dumb`, recursion guards) are
//! undone by RAII scopes, so an unwinding panic cannot leave a stale guard
//! entry behind.

use crate::TypeInterner;
use crate::decl::{AliasDecl, ClassDecl, DeclarationProvider};
use crate::recursion::{GuardKey, GuardSubject, RecursionGuard, RecursionProfile};
use crate::settings::SolverSettings;
use crate::substitute::{ScopeSubstitutor, substitute};
use crate::types::TypeId;
use luaty_common::{Atom, NodeId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::trace;

/// Index value meaning "all results of a multi-value expression".
pub const MULTIPLE_RESULTS_INDEX: i32 = -1;

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative cancellation signal shared between a host and its queries.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("type query canceled")]
pub struct Canceled;

// =============================================================================
// SearchContext
// =============================================================================

pub struct SearchContext<'a> {
    interner: &'a TypeInterner,
    decls: &'a dyn DeclarationProvider,
    settings: SolverSettings,
    cancellation: Option<CancellationToken>,

    index: Cell<i32>,
    supports_multiple_results: Cell<bool>,
    dumb: Cell<bool>,

    guard: RefCell<RecursionGuard<GuardKey>>,
    search_guard: RefCell<FxHashSet<Atom>>,

    classes: RefCell<FxHashMap<Atom, Option<Arc<ClassDecl>>>>,
    aliases: RefCell<FxHashMap<Atom, Option<Arc<AliasDecl>>>>,
    infer_cache: RefCell<FxHashMap<NodeId, Option<TypeId>>>,
}

impl<'a> SearchContext<'a> {
    pub fn new(interner: &'a TypeInterner, decls: &'a dyn DeclarationProvider) -> Self {
        SearchContext {
            interner,
            decls,
            settings: SolverSettings::default(),
            cancellation: None,
            index: Cell::new(0),
            supports_multiple_results: Cell::new(false),
            dumb: Cell::new(false),
            guard: RefCell::new(RecursionGuard::with_profile(RecursionProfile::SearchContext)),
            search_guard: RefCell::new(FxHashSet::default()),
            classes: RefCell::new(FxHashMap::default()),
            aliases: RefCell::new(FxHashMap::default()),
            infer_cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_recursion_profile(self, profile: RecursionProfile) -> Self {
        self.guard.replace(RecursionGuard::with_profile(profile));
        self
    }

    #[inline]
    pub fn interner(&self) -> &'a TypeInterner {
        self.interner
    }

    #[inline]
    pub fn decls(&self) -> &'a dyn DeclarationProvider {
        self.decls
    }

    #[inline]
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    // =========================================================================
    // Result index
    // =========================================================================

    /// Which value of a multi-value expression the caller wants, or
    /// [`MULTIPLE_RESULTS_INDEX`] for all of them.
    #[inline]
    pub fn index(&self) -> i32 {
        self.index.get()
    }

    #[inline]
    pub fn supports_multiple_results(&self) -> bool {
        self.supports_multiple_results.get()
    }

    pub fn with_index<T>(&self, index: i32, supports_multiple_results: bool, f: impl FnOnce() -> T) -> T {
        let _restore = IndexScope {
            ctx: self,
            index: self.index.replace(index),
            supports_multiple_results: self
                .supports_multiple_results
                .replace(supports_multiple_results),
        };
        f()
    }

    pub fn with_multiple_results<T>(&self, f: impl FnOnce() -> T) -> T {
        self.with_index(MULTIPLE_RESULTS_INDEX, true, f)
    }

    /// Evaluate an entry of an expression list: only the last entry may
    /// expand to several values.
    pub fn with_list_entry<T>(&self, last: bool, f: impl FnOnce() -> T) -> T {
        if last {
            self.with_multiple_results(f)
        } else {
            self.with_index(0, false, f)
        }
    }

    // =========================================================================
    // Dumb mode
    // =========================================================================

    /// Declarations may be incomplete. Lookups are skipped and named types
    /// behave as opaque nominal classes.
    #[inline]
    pub fn is_dumb(&self) -> bool {
        self.dumb.get() || self.decls.is_dumb()
    }

    pub fn with_dumb<T>(&self, f: impl FnOnce() -> T) -> T {
        let _restore = DumbScope {
            ctx: self,
            dumb: self.dumb.replace(true),
        };
        f()
    }

    // =========================================================================
    // Guards
    // =========================================================================

    /// Run `f` unless `(name, subject)` is already being computed further up
    /// the stack (or the guard's limits are exhausted), in which case `None`
    /// is returned without running it.
    pub fn with_recursion_guard<T>(
        &self,
        name: &'static str,
        subject: GuardSubject,
        f: impl FnOnce() -> T,
    ) -> Option<T> {
        let key = GuardKey {
            name,
            dumb: self.is_dumb(),
            subject,
        };
        let entered = self.guard.borrow_mut().enter(key);
        if entered.is_denied() {
            trace!(name, subject = ?subject, result = ?entered, "SearchContext::with_recursion_guard - denied");
            return None;
        }
        let _token = GuardToken { ctx: self, key };
        Some(f())
    }

    /// Name-keyed guard for self-referential global lookups.
    pub fn with_search_guard<T>(&self, name: Atom, f: impl FnOnce() -> T) -> Option<T> {
        if !self.search_guard.borrow_mut().insert(name) {
            trace!(name = name.0, "SearchContext::with_search_guard - denied");
            return None;
        }
        let _token = SearchGuardToken { ctx: self, name };
        Some(f())
    }

    #[cfg(test)]
    pub(crate) fn is_guarded(&self, name: &'static str, subject: GuardSubject) -> bool {
        self.guard.borrow().is_visiting(&GuardKey {
            name,
            dumb: self.is_dumb(),
            subject,
        })
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    pub fn class_decl(&self, name: Atom) -> Option<Arc<ClassDecl>> {
        if self.is_dumb() {
            return None;
        }
        if let Some(cached) = self.classes.borrow().get(&name) {
            return cached.clone();
        }
        let decl = self.decls.class(name);
        self.classes.borrow_mut().insert(name, decl.clone());
        decl
    }

    pub fn alias_decl(&self, name: Atom) -> Option<Arc<AliasDecl>> {
        if self.is_dumb() {
            return None;
        }
        if let Some(cached) = self.aliases.borrow().get(&name) {
            return cached.clone();
        }
        let decl = self.decls.alias(name);
        self.aliases.borrow_mut().insert(name, decl.clone());
        decl
    }

    /// The generic parameter `name` refers to inside the lexical scope of
    /// `scope`, if any.
    pub fn scoped_type(&self, scope: NodeId, name: Atom) -> Option<TypeId> {
        if self.is_dumb() {
            return None;
        }
        self.decls.scoped_type(scope, name)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.decls.parent(node)
    }

    // =========================================================================
    // Inference
    // =========================================================================

    /// The type of an expression node, with scoped generic parameters
    /// re-bound to the node's lexical scope.
    ///
    /// Results requested with [`MULTIPLE_RESULTS_INDEX`] are cached for the
    /// lifetime of this context. A node whose inference depends on itself
    /// yields `None` for the re-entrant request.
    pub fn infer(&self, node: NodeId) -> Option<TypeId> {
        let cacheable = self.index() == MULTIPLE_RESULTS_INDEX && !self.is_dumb();
        if cacheable {
            if let Some(cached) = self.infer_cache.borrow().get(&node) {
                trace!(node = node.0, "SearchContext::infer - cache hit");
                return *cached;
            }
        }

        let inferred = self
            .with_recursion_guard("infer", GuardSubject::Node(node), || {
                self.decls.infer(self, node)
            })
            .flatten()?;

        if cacheable {
            self.infer_cache.borrow_mut().insert(node, Some(inferred));
        }

        Some(substitute(self, inferred, &mut ScopeSubstitutor::new(node)))
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    pub fn is_canceled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_canceled)
    }

    pub fn check_canceled(&self) -> Result<(), Canceled> {
        if self.is_canceled() {
            Err(Canceled)
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Scopes
// =============================================================================

struct IndexScope<'c, 'a> {
    ctx: &'c SearchContext<'a>,
    index: i32,
    supports_multiple_results: bool,
}

impl Drop for IndexScope<'_, '_> {
    fn drop(&mut self) {
        self.ctx.index.set(self.index);
        self.ctx
            .supports_multiple_results
            .set(self.supports_multiple_results);
    }
}

struct DumbScope<'c, 'a> {
    ctx: &'c SearchContext<'a>,
    dumb: bool,
}

impl Drop for DumbScope<'_, '_> {
    fn drop(&mut self) {
        self.ctx.dumb.set(self.dumb);
    }
}

struct GuardToken<'c, 'a> {
    ctx: &'c SearchContext<'a>,
    key: GuardKey,
}

impl Drop for GuardToken<'_, '_> {
    fn drop(&mut self) {
        self.ctx.guard.borrow_mut().leave(self.key);
    }
}

struct SearchGuardToken<'c, 'a> {
    ctx: &'c SearchContext<'a>,
    name: Atom,
}

impl Drop for SearchGuardToken<'_, '_> {
    fn drop(&mut self) {
        self.ctx.search_guard.borrow_mut().remove(&self.name);
    }
}

#[cfg(test)]
#[path = "../tests/context_tests.rs"]
mod tests;
