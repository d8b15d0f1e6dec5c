//! Centralized limits and thresholds for the luaty type engine.
//!
//! Recursion limits for individual solver guards are centralized in
//! `luaty_solver::recursion::RecursionProfile`; the constants here are the
//! shared values those profiles and other crates build on.

// =============================================================================
// Recursion Depth Limits
// =============================================================================

/// Maximum number of simultaneously active recursion-guard entries in one
/// search context.
///
/// Each nested variance check, alias expansion or inference request pushes an
/// entry. Deeply nested declarations (a class whose member is a generic of an
/// alias of a union of the same class ...) stay well below this; hitting it
/// means the type graph is effectively infinite and the engine answers
/// conservatively instead.
pub const MAX_GUARD_DEPTH: u32 = 256;

/// Maximum total guard entries over the lifetime of one search context.
pub const MAX_GUARD_ITERATIONS: u32 = 1_000_000;

/// Maximum nesting depth accepted by the binary type decoder.
pub const MAX_DECODE_DEPTH: u32 = 128;

// =============================================================================
// Stack Growth
// =============================================================================

/// Remaining stack below which the variance engine grows the stack.
pub const STACK_RED_ZONE: usize = 64 * 1024;

/// Size of each stack segment allocated when the red zone is reached.
pub const STACK_GROWTH: usize = 1024 * 1024;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Members scanned per cancellation check during member walks.
pub const CANCELLATION_CHECK_INTERVAL: usize = 64;

/// Maximum number of parent steps taken when measuring how deep a problem
/// sits below the checked expression.
pub const MAX_ANCESTOR_WALK: usize = 4096;
