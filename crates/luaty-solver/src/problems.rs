//! Problems: type mismatches as values.
//!
//! The variance engine answers yes or no. When a host wants to know *why*,
//! the checks in this module walk the same rules and report a [`Problem`]
//! for every incompatibility they find, anchored at the most specific
//! syntax node available.
//!
//! ## Sink pattern
//!
//! Every reporting check takes a `&mut dyn ProblemSink`:
//!
//! - **[`FastSink`]**: keeps nothing. Checks see `collects() == false` and
//!   stop at the first problem without formatting a message.
//! - **[`ProblemCollector`]** / **[`FnSink`]**: keep every problem. Checks
//!   keep going after a failure so all problems are reported.

use crate::context::SearchContext;
use crate::members::{
    contiguous_from_one, find_indexer, find_member, guess_indexer_type, integer_key, is_array,
    member_type, process_members,
};
use crate::resolve::{is_inline_table, is_shape, resolve, resolved_members};
use crate::types::{MemberKey, TyFlags, TyKind, TypeData, TypeId, VarianceFlags};
use crate::union::contains;
use crate::variance::{contravariant_of, equals, expand_results};
use indexmap::IndexMap;
use luaty_common::diagnostics::{diagnostic_messages, format_message};
use luaty_common::{NodeId, ProblemSeverity, limits};
use rustc_hash::{FxBuildHasher, FxHashSet};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// Problem and sinks
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Problem {
    /// The declaration the value was checked against, when known.
    pub target_node: Option<NodeId>,
    /// Where the problem should be highlighted.
    pub source_node: NodeId,
    pub message: String,
    pub severity: ProblemSeverity,
}

impl Problem {
    pub fn error(target_node: Option<NodeId>, source_node: NodeId, message: String) -> Self {
        Problem {
            target_node,
            source_node,
            message,
            severity: ProblemSeverity::Error,
        }
    }

    pub fn weak_warning(target_node: Option<NodeId>, source_node: NodeId, message: String) -> Self {
        Problem {
            target_node,
            source_node,
            message,
            severity: ProblemSeverity::WeakWarning,
        }
    }
}

pub trait ProblemSink {
    /// Whether reported problems are kept. Checks given a sink that does not
    /// collect stop at the first problem.
    fn collects(&self) -> bool;

    fn report(&mut self, problem: Problem);
}

/// Boolean-only checking.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastSink;

impl ProblemSink for FastSink {
    #[inline(always)]
    fn collects(&self) -> bool {
        false
    }

    #[inline(always)]
    fn report(&mut self, _problem: Problem) {}
}

#[derive(Clone, Debug, Default)]
pub struct ProblemCollector {
    problems: Vec<Problem>,
}

impl ProblemCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn into_problems(self) -> Vec<Problem> {
        self.problems
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

impl ProblemSink for ProblemCollector {
    fn collects(&self) -> bool {
        true
    }

    fn report(&mut self, problem: Problem) {
        self.problems.push(problem);
    }
}

/// Forwards every problem to a closure.
pub struct FnSink<F: FnMut(Problem)>(pub F);

impl<F: FnMut(Problem)> ProblemSink for FnSink<F> {
    fn collects(&self) -> bool {
        true
    }

    fn report(&mut self, problem: Problem) {
        (self.0)(problem);
    }
}

fn mismatch(
    ctx: &SearchContext<'_>,
    target_node: Option<NodeId>,
    source_node: NodeId,
    target: TypeId,
    source: TypeId,
) -> Problem {
    let interner = ctx.interner();
    Problem::error(
        target_node,
        source_node,
        format_message(
            diagnostic_messages::TYPE_MISMATCH,
            &[&interner.display_name(target), &interner.display_name(source)],
        ),
    )
}

/// The table constructor an inline table type was inferred from.
fn inline_table_node(ctx: &SearchContext<'_>, ty: TypeId) -> Option<NodeId> {
    let data = ctx.interner().lookup(ty);
    let TypeData::Class(class) = &*data else {
        return None;
    };
    if !class.flags.contains(TyFlags::ANONYMOUS_TABLE) {
        return None;
    }
    ctx.class_decl(class.name)?.table_node
}

// =============================================================================
// Shapes
// =============================================================================

/// Structural compatibility of `source` with the shape `target`.
///
/// Every target member must be present in `source` (or accept `nil`) with a
/// compatible type. Extra source members are allowed; a source member that
/// overlaps a differently keyed target indexer must match it exactly unless
/// `WIDEN_TABLES` is set.
pub fn contravariant_of_shape(
    ctx: &SearchContext<'_>,
    target: TypeId,
    source: TypeId,
    flags: VarianceFlags,
    target_node: Option<NodeId>,
    source_node: Option<NodeId>,
    sink: &mut dyn ProblemSink,
) -> bool {
    let interner = ctx.interner();
    let collect = sink.collects();
    let strict_unknown = flags.contains(VarianceFlags::STRICT_UNKNOWN);
    let mut ok = true;

    process_members(ctx, target, true, &mut |member| {
        if member.ty.is_none() {
            return true;
        }
        let target_ty = member_type(ctx, target, member);
        let source_member = match member.key {
            MemberKey::Index(index) => find_indexer(ctx, source, index, true),
            MemberKey::Name(name) => find_member(ctx, source, name),
        };

        let Some(source_member) = source_member else {
            if contains(interner, target_ty, TypeId::NIL) {
                return true;
            }
            ok = false;
            if collect {
                let member_name = match member.key {
                    MemberKey::Name(name) => interner.resolve_atom(name).to_string(),
                    MemberKey::Index(index) => format!("[{}]", interner.display_name(index)),
                };
                sink.report(Problem::error(
                    target_node,
                    source_node.or(member.node).unwrap_or(NodeId::NONE),
                    format_message(
                        diagnostic_messages::MISSING_MEMBER,
                        &[&member_name, &interner.display_name(target)],
                    ),
                ));
            }
            return collect;
        };

        let source_ty = member_type(ctx, source, &source_member);
        if !strict_unknown && source_ty.is_unknown() {
            return true;
        }
        let anchor = source_node.map(|node| source_member.node.unwrap_or(node));
        if !member_contravariant_of(ctx, target_ty, source_ty, flags, target_node, anchor, sink) {
            ok = false;
            return collect;
        }
        true
    });

    if !ok && !collect {
        return false;
    }

    // Named members were matched by name above.
    let mut source_indexers: Vec<(TypeId, Option<NodeId>)> = Vec::new();
    process_members(ctx, source, true, &mut |member| {
        if let MemberKey::Index(index) = member.key {
            source_indexers.push((index, member.node));
        }
        true
    });

    for (index, node) in source_indexers {
        let Some(target_member) = find_indexer(ctx, target, index, false) else {
            continue;
        };
        if target_member
            .index_ty()
            .is_some_and(|key| key == index || equals(ctx, key, index))
        {
            continue;
        }
        if target_member.ty.is_none() {
            continue;
        }
        let target_ty = member_type(ctx, target, &target_member);
        let source_ty = guess_indexer_type(ctx, source, index, true).unwrap_or(TypeId::UNKNOWN);
        if !strict_unknown && source_ty.is_unknown() {
            continue;
        }

        let anchor = source_node.map(|source_node| node.unwrap_or(source_node));
        let accepted = if flags.contains(VarianceFlags::WIDEN_TABLES) {
            member_contravariant_of(ctx, target_ty, source_ty, flags, target_node, anchor, sink)
        } else if equals(ctx, target_ty, source_ty) {
            true
        } else {
            if collect && let Some(anchor) = anchor {
                sink.report(mismatch(ctx, target_node, anchor, target_ty, source_ty));
            }
            false
        };
        if !accepted {
            ok = false;
            if !collect {
                break;
            }
        }
    }

    ok
}

/// One member pair. A nested inline table is checked member by member so
/// its problems land on its own fields.
fn member_contravariant_of(
    ctx: &SearchContext<'_>,
    target_ty: TypeId,
    source_ty: TypeId,
    flags: VarianceFlags,
    target_node: Option<NodeId>,
    anchor: Option<NodeId>,
    sink: &mut dyn ProblemSink,
) -> bool {
    if sink.collects()
        && anchor.is_some()
        && let Some(table_node) = inline_table_node(ctx, source_ty)
    {
        return check_contravariant(ctx, target_ty, source_ty, flags, target_node, table_node, sink);
    }
    if contravariant_of(ctx, target_ty, source_ty, flags) {
        return true;
    }
    if sink.collects()
        && let Some(anchor) = anchor
    {
        sink.report(mismatch(ctx, target_node, anchor, target_ty, source_ty));
    }
    false
}

// =============================================================================
// Reporting entry point
// =============================================================================

/// [`contravariant_of`] with problems.
///
/// When `target` is a union containing shapes and `source` is a table
/// literal (or array), each member is tried on its own. If all fail, the
/// members whose shallowest problem lies deepest below `source_node` are
/// the ones reported: they are the candidates the literal came closest to
/// matching.
pub fn check_contravariant(
    ctx: &SearchContext<'_>,
    target: TypeId,
    source: TypeId,
    flags: VarianceFlags,
    target_node: Option<NodeId>,
    source_node: NodeId,
    sink: &mut dyn ProblemSink,
) -> bool {
    if target == source {
        return true;
    }
    let interner = ctx.interner();
    let resolved_target = resolve(ctx, target);
    let literal_source =
        interner.kind(source) == TyKind::Array || is_inline_table(ctx, source, source_node);

    if !accepts_shape(ctx, resolved_target) || !literal_source {
        return unit_contravariant_of(
            ctx,
            resolved_target,
            source,
            flags,
            target_node,
            source_node,
            sink,
        );
    }

    if interner.kind(resolved_target) == TyKind::Union
        && contravariant_of(ctx, resolved_target, source, flags)
    {
        return true;
    }

    let mut candidates: IndexMap<Arc<str>, Vec<Problem>, FxBuildHasher> = IndexMap::default();
    for candidate in resolved_members(ctx, resolved_target) {
        let mut collector = ProblemCollector::new();
        if unit_contravariant_of(
            ctx,
            candidate,
            source,
            flags,
            target_node,
            source_node,
            &mut collector,
        ) {
            return true;
        }
        candidates.insert(interner.display_name(candidate), collector.into_problems());
    }

    let mut best: Vec<Arc<str>> = Vec::new();
    let mut best_depth: Option<usize> = None;
    for (name, problems) in &candidates {
        let Some(depth) = problems
            .iter()
            .map(|problem| depth_below(ctx, problem.source_node, source_node))
            .min()
        else {
            continue;
        };
        match best_depth {
            Some(current) if depth < current => {}
            Some(current) if depth == current => best.push(name.clone()),
            _ => {
                best.clear();
                best.push(name.clone());
                best_depth = Some(depth);
            }
        }
    }
    debug!(
        candidates = candidates.len(),
        best = best.len(),
        depth = ?best_depth,
        "check_contravariant - ranked union candidates"
    );

    let suffixed = best.len() > 1;
    for name in best {
        let Some(problems) = candidates.swap_remove(&name) else {
            continue;
        };
        for mut problem in problems {
            if suffixed {
                problem.message = format_message(
                    diagnostic_messages::UNION_CANDIDATE_SUFFIX,
                    &[&problem.message, &name],
                );
            }
            sink.report(problem);
        }
    }
    false
}

fn accepts_shape(ctx: &SearchContext<'_>, target: TypeId) -> bool {
    resolved_members(ctx, target)
        .into_iter()
        .any(|member| is_shape(ctx, resolve(ctx, member)))
}

/// Parent steps from `node` up to `root`.
fn depth_below(ctx: &SearchContext<'_>, node: NodeId, root: NodeId) -> usize {
    let mut depth = 0;
    let mut current = node;
    while current != root && depth < limits::MAX_ANCESTOR_WALK {
        let Some(parent) = ctx.parent(current) else {
            break;
        };
        depth += 1;
        current = parent;
    }
    depth
}

fn unit_contravariant_of(
    ctx: &SearchContext<'_>,
    target: TypeId,
    source: TypeId,
    flags: VarianceFlags,
    target_node: Option<NodeId>,
    source_node: NodeId,
    sink: &mut dyn ProblemSink,
) -> bool {
    let interner = ctx.interner();
    let target_data = interner.lookup(target);

    if let TypeData::Array(base) = &*target_data {
        let base = resolve(ctx, *base);
        let source_kind = interner.kind(source);
        if source_kind == TyKind::Class && is_shape(ctx, source) {
            return array_shape_contravariant_of(
                ctx,
                target,
                base,
                source,
                flags,
                target_node,
                source_node,
                sink,
            );
        }
        let array_like =
            source_kind == TyKind::Array || (source_kind == TyKind::Class && is_array(ctx, source));
        if !array_like && !contravariant_of(ctx, target, source, flags) {
            sink.report(mismatch(ctx, target_node, source_node, target, source));
            return false;
        }
    }

    let base = match &*target_data {
        TypeData::Generic { base, .. } => *base,
        _ => target,
    };
    if is_inline_table(ctx, source, source_node) && is_shape(ctx, base) {
        return contravariant_of_shape(
            ctx,
            target,
            source,
            flags | VarianceFlags::WIDEN_TABLES,
            target_node,
            Some(source_node),
            sink,
        );
    }

    if contravariant_of(ctx, target, source, flags) {
        return true;
    }
    sink.report(mismatch(ctx, target_node, source_node, target, source));
    false
}

/// A shape offered where an array is required: every key must be an
/// integer (or the `number` indexer), every value must fit the element
/// type, and the integer keys must run `1..N`.
fn array_shape_contravariant_of(
    ctx: &SearchContext<'_>,
    target: TypeId,
    base: TypeId,
    source: TypeId,
    flags: VarianceFlags,
    target_node: Option<NodeId>,
    source_node: NodeId,
    sink: &mut dyn ProblemSink,
) -> bool {
    let interner = ctx.interner();
    let inline = is_inline_table(ctx, source, source_node);
    let target_name = interner.display_name(target);
    let mut ok = true;
    let mut keys: FxHashSet<i64> = FxHashSet::default();
    let mut number_indexer = false;

    process_members(ctx, source, true, &mut |member| {
        let anchor = if inline {
            member.node.unwrap_or(source_node)
        } else {
            source_node
        };

        let field = match member.key {
            MemberKey::Index(TypeId::NUMBER) => {
                number_indexer = true;
                None
            }
            MemberKey::Index(index) => match integer_key(ctx, index) {
                Some(key) => {
                    keys.insert(key);
                    None
                }
                None => Some(format!("[{}]", interner.display_name(index))),
            },
            MemberKey::Name(name) => Some(interner.resolve_atom(name).to_string()),
        };
        if let Some(field) = field {
            ok = false;
            sink.report(Problem::error(
                target_node,
                anchor,
                format_message(diagnostic_messages::NON_ARRAY_FIELD, &[&target_name, &field]),
            ));
            return sink.collects();
        }

        for value in expand_results(ctx, member_type(ctx, source, member)) {
            if !check_contravariant(ctx, base, value, flags, target_node, anchor, sink) {
                ok = false;
                if !sink.collects() {
                    return false;
                }
            }
        }
        true
    });

    if ok && !number_indexer && !contiguous_from_one(&keys) {
        let found = format!("table<number, {}>", interner.display_name(base));
        sink.report(Problem::error(
            target_node,
            source_node,
            format_message(diagnostic_messages::TYPE_MISMATCH, &[&target_name, &found]),
        ));
        return false;
    }
    ok
}

#[cfg(test)]
#[path = "../tests/problems_tests.rs"]
mod tests;
