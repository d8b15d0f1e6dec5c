//! Recursion guard for cycle detection, depth limiting,
//! and iteration bounding in recursive type computations.
//!
//! # Design
//!
//! Declarations in annotated Lua are freely mutually recursive: a class can
//! have a member typed as a generic of an alias whose body is a union that
//! mentions the class again. Every walk over that graph (variance checks,
//! alias expansion, structural comparison, inference) enters the shared
//! [`RecursionGuard`] of its [`SearchContext`](crate::SearchContext) with a
//! [`GuardKey`] naming the operation and the subject being processed.
//!
//! It combines three safety mechanisms:
//! 1. **Cycle detection** via a visiting set (`FxHashSet<K>`)
//! 2. **Depth limiting** to prevent stack overflow
//! 3. **Iteration bounding** to prevent runaway walks
//!
//! # Profiles
//!
//! [`RecursionProfile`] provides named presets so call sites state intent
//! instead of magic numbers:
//!
//! ```ignore
//! let guard = RecursionGuard::with_profile(RecursionProfile::SearchContext);
//! ```
//!
//! # Safety
//!
//! - **Debug leak detection**: In debug builds, dropping a guard with active entries
//!   triggers a panic, catching forgotten `leave()` calls.
//! - **Debug double-leave detection**: In debug builds, leaving a key that isn't in
//!   the visiting set triggers a panic.
//! - **Overflow protection**: Iteration counting uses saturating arithmetic.

use crate::types::TypeId;
use luaty_common::limits;
use luaty_common::{Atom, NodeId};
use rustc_hash::FxHashSet;
use std::hash::Hash;

// ---------------------------------------------------------------------------
// RecursionProfile
// ---------------------------------------------------------------------------

/// Named recursion limit presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionProfile {
    /// The shared guard of a search context. Covers every guarded operation
    /// of one query.
    SearchContext,

    /// Caller-supplied limits.
    Custom { max_depth: u32, max_iterations: u32 },
}

impl RecursionProfile {
    pub const fn max_depth(self) -> u32 {
        match self {
            Self::SearchContext => limits::MAX_GUARD_DEPTH,
            Self::Custom { max_depth, .. } => max_depth,
        }
    }

    pub const fn max_iterations(self) -> u32 {
        match self {
            Self::SearchContext => limits::MAX_GUARD_ITERATIONS,
            Self::Custom { max_iterations, .. } => max_iterations,
        }
    }
}

// ---------------------------------------------------------------------------
// RecursionResult
// ---------------------------------------------------------------------------

/// Outcome of [`RecursionGuard::enter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionResult {
    /// The key was not active; the caller must `leave` it afterwards.
    Entered,
    /// The key is already being processed further up the stack.
    Cycle,
    DepthExceeded,
    IterationExceeded,
}

impl RecursionResult {
    #[inline]
    pub fn is_entered(self) -> bool {
        matches!(self, Self::Entered)
    }

    #[inline]
    pub fn is_cycle(self) -> bool {
        matches!(self, Self::Cycle)
    }

    #[inline]
    pub fn is_exceeded(self) -> bool {
        matches!(self, Self::DepthExceeded | Self::IterationExceeded)
    }

    #[inline]
    pub fn is_denied(self) -> bool {
        !self.is_entered()
    }
}

// ---------------------------------------------------------------------------
// GuardKey
// ---------------------------------------------------------------------------

/// What a guard entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardSubject {
    Node(NodeId),
    Type(TypeId),
    Pair(TypeId, TypeId),
    Name(Atom),
}

/// Operation name plus subject identity. Keys taken in dumb mode are distinct
/// from keys taken with complete declarations, so a speculative pass never
/// blocks the precise one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuardKey {
    pub name: &'static str,
    pub dumb: bool,
    pub subject: GuardSubject,
}

// ---------------------------------------------------------------------------
// RecursionGuard
// ---------------------------------------------------------------------------

pub struct RecursionGuard<K: Hash + Eq + Copy> {
    visiting: FxHashSet<K>,
    depth: u32,
    iterations: u32,
    max_depth: u32,
    max_iterations: u32,
    exceeded: bool,
}

impl<K: Hash + Eq + Copy> RecursionGuard<K> {
    pub fn new(max_depth: u32, max_iterations: u32) -> Self {
        Self {
            visiting: FxHashSet::default(),
            depth: 0,
            iterations: 0,
            max_depth,
            max_iterations,
            exceeded: false,
        }
    }

    pub fn with_profile(profile: RecursionProfile) -> Self {
        Self::new(profile.max_depth(), profile.max_iterations())
    }

    /// Try to enter `key`. Only `Entered` must be paired with `leave`.
    pub fn enter(&mut self, key: K) -> RecursionResult {
        self.iterations = self.iterations.saturating_add(1);
        if self.iterations > self.max_iterations {
            self.exceeded = true;
            return RecursionResult::IterationExceeded;
        }
        if self.depth >= self.max_depth {
            self.exceeded = true;
            return RecursionResult::DepthExceeded;
        }
        if !self.visiting.insert(key) {
            return RecursionResult::Cycle;
        }
        self.depth += 1;
        RecursionResult::Entered
    }

    pub fn leave(&mut self, key: K) {
        let was_present = self.visiting.remove(&key);
        debug_assert!(
            was_present,
            "RecursionGuard::leave() called with a key that is not in the visiting set. \
             This indicates a double-leave or a leave without a matching enter()."
        );
        self.depth = self.depth.saturating_sub(1);
    }


    #[inline]
    pub fn is_visiting(&self, key: &K) -> bool {
        self.visiting.contains(key)
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    #[inline]
    pub fn is_exceeded(&self) -> bool {
        self.exceeded
    }
}

#[cfg(debug_assertions)]
impl<K: Hash + Eq + Copy> Drop for RecursionGuard<K> {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.visiting.is_empty() {
            panic!(
                "RecursionGuard dropped with {} active entries still in the visiting set. \
                 This indicates leaked enter() calls without matching leave() calls.",
                self.visiting.len(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_search_context_limits() {
        let p = RecursionProfile::SearchContext;
        assert_eq!(p.max_depth(), limits::MAX_GUARD_DEPTH);
        assert_eq!(p.max_iterations(), limits::MAX_GUARD_ITERATIONS);
    }

    #[test]
    fn enter_detects_cycle() {
        let mut guard: RecursionGuard<u32> = RecursionGuard::new(10, 100);
        assert_eq!(guard.enter(1), RecursionResult::Entered);
        assert_eq!(guard.enter(1), RecursionResult::Cycle);
        assert!(guard.is_visiting(&1));
        guard.leave(1);
        assert!(!guard.is_visiting(&1));
        assert_eq!(guard.depth(), 0);
    }

    #[test]
    fn enter_respects_depth_limit() {
        let mut guard: RecursionGuard<u32> = RecursionGuard::new(2, 100);
        assert!(guard.enter(1).is_entered());
        assert!(guard.enter(2).is_entered());
        assert_eq!(guard.enter(3), RecursionResult::DepthExceeded);
        assert!(guard.is_exceeded());
        guard.leave(2);
        guard.leave(1);
    }

    #[test]
    fn enter_respects_iteration_limit() {
        let mut guard: RecursionGuard<u32> = RecursionGuard::new(10, 2);
        assert!(guard.enter(1).is_entered());
        guard.leave(1);
        assert!(guard.enter(1).is_entered());
        guard.leave(1);
        assert_eq!(guard.enter(1), RecursionResult::IterationExceeded);
        assert_eq!(guard.iterations(), 3);
    }
}
