//! Call resolution: picking the signature a call binds to.
//!
//! [`match_signature`] narrows the callable's signatures to those that can
//! take the call's arguments, infers generic parameters for each candidate
//! and checks the arguments against the substituted parameters. The first
//! candidate with no error wins. When every candidate fails, a fallback
//! return type is still produced so inference can continue past a bad call.

use crate::context::{Canceled, SearchContext};
use crate::generic_analyzer::GenericAnalyzer;
use crate::multiple_results::{as_multiple_results, get_result};
use crate::problems::{FnSink, Problem, ProblemCollector, ProblemSink, check_contravariant};
use crate::resolve::is_inline_table;
use crate::signature::{
    SELF_PARAM, display_signature, find_candidate_signatures, process_declared_parameters,
    process_parameters,
};
use crate::substitute::{ChainSubstitutor, SelfSubstitutor, substitute_signature};
use crate::types::{Signature, TypeId, VarianceFlags};
use crate::variance::contravariant_of;
use luaty_common::NodeId;
use luaty_common::diagnostics::{decapitalize, diagnostic_messages, format_message};
use tracing::{debug, trace};

/// One argument expression of a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallArgument {
    pub node: NodeId,
    pub ty: TypeId,
    /// A table constructor written directly as the argument.
    pub is_table_literal: bool,
}

impl CallArgument {
    pub fn new(node: NodeId, ty: TypeId) -> Self {
        CallArgument {
            node,
            ty,
            is_table_literal: false,
        }
    }

    pub fn table_literal(node: NodeId, ty: TypeId) -> Self {
        CallArgument {
            node,
            ty,
            is_table_literal: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CallSite {
    /// The call expression; missing-argument problems are anchored here.
    pub node: NodeId,
    pub args: Vec<CallArgument>,
    /// `obj:method(...)` rather than `obj.method(...)`.
    pub colon_call: bool,
    /// Type of the expression the callee was reached through, if any.
    pub receiver: Option<TypeId>,
}

impl CallSite {
    pub fn new(node: NodeId) -> Self {
        CallSite {
            node,
            args: Vec::new(),
            colon_call: false,
            receiver: None,
        }
    }

    /// Build a call site by inferring each argument node. Only the last
    /// argument may produce multiple results.
    pub fn infer(ctx: &SearchContext<'_>, node: NodeId, arg_nodes: &[NodeId]) -> Self {
        let args = arg_nodes
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                let last = i + 1 == arg_nodes.len();
                let ty = ctx
                    .with_list_entry(last, || ctx.infer(*arg))
                    .unwrap_or(TypeId::UNKNOWN);
                CallArgument {
                    node: *arg,
                    ty,
                    is_table_literal: is_inline_table(ctx, ty, *arg),
                }
            })
            .collect();
        CallSite {
            node,
            args,
            colon_call: false,
            receiver: None,
        }
    }

    pub fn with_arg(mut self, arg: CallArgument) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_receiver(mut self, receiver: TypeId) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn with_colon_call(mut self, colon_call: bool) -> Self {
        self.colon_call = colon_call;
        self
    }
}

/// Outcome of resolving a call.
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureMatch {
    /// The declared signature that accepted the call, if any did.
    pub signature: Option<Signature>,
    /// That signature with receiver and inferred generics substituted.
    pub substituted: Option<Signature>,
    pub return_ty: TypeId,
}

impl SignatureMatch {
    pub fn is_match(&self) -> bool {
        self.signature.is_some()
    }
}

/// Argument values after expanding a trailing multi-result.
#[derive(Clone, Copy, Debug)]
struct ConcreteArg {
    ty: TypeId,
    /// Index of the argument expression the value came from.
    arg: usize,
}

fn concrete_args(ctx: &SearchContext<'_>, call: &CallSite) -> (Vec<ConcreteArg>, Option<ConcreteArg>) {
    let mut concrete = Vec::with_capacity(call.args.len());
    let mut variadic = None;
    for (i, arg) in call.args.iter().enumerate() {
        let last = i + 1 == call.args.len();
        match as_multiple_results(ctx, arg.ty).filter(|_| last) {
            Some(results) => {
                let mut values = results.list.as_slice();
                if results.variadic
                    && let Some((tail, fixed)) = values.split_last()
                {
                    variadic = Some(ConcreteArg { ty: *tail, arg: i });
                    values = fixed;
                }
                concrete.extend(values.iter().map(|ty| ConcreteArg { ty: *ty, arg: i }));
            }
            None => concrete.push(ConcreteArg {
                ty: get_result(ctx, arg.ty, 0),
                arg: i,
            }),
        }
    }
    (concrete, variadic)
}

/// Receiver substitution plus the generic bindings inferred from the call.
fn create_substitutor(
    ctx: &SearchContext<'_>,
    signature: &Signature,
    call: &CallSite,
) -> ChainSubstitutor {
    let mut substitutor = ChainSubstitutor::new();
    if let Some(receiver) = call.receiver {
        substitutor = substitutor.then(SelfSubstitutor::new(receiver));
    }
    if !signature.is_generic() {
        return substitutor;
    }

    let mut list: Vec<TypeId> = Vec::with_capacity(call.args.len() + 1);
    if call.colon_call
        && let Some(receiver) = call.receiver
    {
        list.push(receiver);
    }
    for (i, arg) in call.args.iter().enumerate() {
        let last = i + 1 == call.args.len();
        match as_multiple_results(ctx, arg.ty).filter(|_| last) {
            Some(results) => list.extend(results.list.iter().copied()),
            None => list.push(get_result(ctx, arg.ty, 0)),
        }
    }

    let mut analyzer = GenericAnalyzer::new(ctx, &signature.generic_params)
        .with_call_nodes(call.args.iter().map(|arg| arg.node));
    let mut next = 0;
    process_declared_parameters(signature, |index, param| {
        if let (Some(arg), Some(ty)) = (list.get(index), param.ty) {
            analyzer.analyze(*arg, ty);
        }
        next = index + 1;
        true
    });
    if let Some(variadic) = signature.variadic {
        for arg in list.iter().skip(next) {
            analyzer.analyze(*arg, variadic);
        }
    }
    substitutor.then(analyzer.into_substitutor())
}

/// Check `arg_ty` against `param_ty`, reporting through `problems` with
/// each message passed through `decorate`.
fn check_argument(
    ctx: &SearchContext<'_>,
    param_ty: TypeId,
    arg_ty: TypeId,
    arg: &CallArgument,
    collect: bool,
    problems: &mut ProblemCollector,
    decorate: impl Fn(String) -> String,
) -> bool {
    let flags = if arg.is_table_literal {
        VarianceFlags::WIDEN_TABLES
    } else {
        VarianceFlags::empty()
    };
    if !collect {
        return contravariant_of(ctx, param_ty, arg_ty, flags);
    }
    check_contravariant(
        ctx,
        param_ty,
        arg_ty,
        flags,
        None,
        arg.node,
        &mut FnSink(|problem: Problem| {
            problems.report(Problem {
                message: decorate(problem.message),
                ..problem
            })
        }),
    )
}

/// Check every argument of `call` against `signature` (already
/// substituted). Returns whether no error was found.
fn check_candidate(
    ctx: &SearchContext<'_>,
    signature: &Signature,
    call: &CallSite,
    concrete: &[ConcreteArg],
    variadic_arg: Option<ConcreteArg>,
    collect: bool,
    problems: &mut ProblemCollector,
) -> bool {
    let interner = ctx.interner();
    let self_name = interner.intern_string(SELF_PARAM);
    let arg_count = call.args.len();
    // Values past the written arguments come from a trailing multi-result.
    let from_results = |i: usize| {
        i >= arg_count
            && (concrete.len() > arg_count || (variadic_arg.is_some() && concrete.len() >= arg_count))
    };

    let mut ok = true;
    let mut parameter_count = 0;
    process_parameters(interner, signature, call.receiver, call.colon_call, |i, param| {
        parameter_count = i + 1;
        let self_slot = !call.colon_call && i == 0 && param.name == self_name;
        let value = concrete.get(i).copied();
        if value.is_none() && param.optional {
            return true;
        }

        if value.is_none() {
            ok = false;
            if collect {
                let message = if self_slot {
                    diagnostic_messages::MISSING_SELF_ARGUMENT.to_string()
                } else {
                    format_message(
                        diagnostic_messages::MISSING_ARGUMENT,
                        &[
                            &interner.resolve_atom(param.name),
                            &interner.display_name(param.ty_or_unknown()),
                        ],
                    )
                };
                problems.report(Problem::error(None, call.node, message));
            }
            if variadic_arg.is_none() {
                return true;
            }
        }

        let Some(value) = value.or(variadic_arg) else {
            return true;
        };
        let accepted = check_argument(
            ctx,
            param.ty_or_unknown(),
            value.ty,
            &call.args[value.arg],
            collect,
            problems,
            |message| {
                let mut message = if from_results(i) {
                    format_message(
                        diagnostic_messages::RESULT_PREFIX,
                        &[&(i + 1).to_string(), &decapitalize(&message)],
                    )
                } else {
                    message
                };
                if self_slot {
                    message.push_str(diagnostic_messages::DID_YOU_MEAN_COLON);
                }
                message
            },
        );
        ok &= accepted;
        if !ok && !collect {
            return false;
        }
        true
    });

    if !ok && !collect {
        return false;
    }

    if parameter_count < concrete.len() {
        if let Some(variadic) = signature.variadic {
            for value in &concrete[parameter_count..] {
                let ty = get_result(ctx, value.ty, 0);
                ok &= check_argument(
                    ctx,
                    variadic,
                    ty,
                    &call.args[value.arg],
                    collect,
                    problems,
                    |message| message,
                );
            }
        } else if parameter_count < arg_count {
            ok = false;
            if collect {
                for arg in &call.args[parameter_count..] {
                    problems.report(Problem::error(
                        None,
                        arg.node,
                        diagnostic_messages::TOO_MANY_ARGUMENTS.to_string(),
                    ));
                }
            }
        } else if collect && let Some(last) = call.args.last() {
            let excess = concrete.len() - parameter_count;
            let message = if excess == 1 {
                diagnostic_messages::EXCESS_RESULT.to_string()
            } else {
                format_message(diagnostic_messages::EXCESS_RESULTS, &[&excess.to_string()])
            };
            problems.report(Problem::weak_warning(None, last.node, message));
        }
    } else if let (Some(variadic), Some(value)) = (signature.variadic, variadic_arg) {
        ok &= check_argument(
            ctx,
            variadic,
            value.ty,
            &call.args[value.arg],
            collect,
            problems,
            |message| {
                format_message(
                    diagnostic_messages::VARIADIC_RESULT_PREFIX,
                    &[&decapitalize(&message)],
                )
            },
        );
    }

    ok
}

/// Resolve a call of `callable`.
///
/// Problems of the accepted candidate (weak warnings only) are reported to
/// `sink`. When no candidate accepts the call, the problems of every
/// candidate are reported, each suffixed with the signature it belongs to
/// when there was more than one. Returns `Ok(None)` when `callable` has no
/// signatures at all.
pub fn match_signature(
    ctx: &SearchContext<'_>,
    callable: TypeId,
    call: &CallSite,
    sink: &mut dyn ProblemSink,
) -> Result<Option<SignatureMatch>, Canceled> {
    ctx.check_canceled()?;
    let interner = ctx.interner();
    let collect = sink.collects();
    let (concrete, variadic_arg) = concrete_args(ctx, call);
    let candidates = find_candidate_signatures(ctx, callable, call.args.len(), call.colon_call);
    if candidates.is_empty() {
        return Ok(None);
    }

    let mut failures: Vec<(&Signature, Vec<Problem>)> = Vec::new();
    let mut fallback: Option<TypeId> = None;
    for candidate in &candidates {
        ctx.check_canceled()?;
        let mut substitutor = create_substitutor(ctx, candidate, call);
        let substituted = substitute_signature(ctx, candidate, &mut substitutor);

        let mut problems = ProblemCollector::new();
        let accepted = check_candidate(
            ctx,
            &substituted,
            call,
            &concrete,
            variadic_arg,
            collect,
            &mut problems,
        );
        // A canceled member walk reports success.
        ctx.check_canceled()?;
        if accepted {
            for problem in problems.into_problems() {
                sink.report(problem);
            }
            let return_ty = substituted
                .return_ty
                .unwrap_or_else(|| interner.unknown_results());
            debug!(
                callable = callable.0,
                candidate = %display_signature(interner, candidate),
                "match_signature: accepted"
            );
            return Ok(Some(SignatureMatch {
                signature: Some(candidate.clone()),
                substituted: Some(substituted),
                return_ty,
            }));
        }

        trace!(
            callable = callable.0,
            candidate = %display_signature(interner, candidate),
            problems = problems.len(),
            "match_signature: rejected"
        );
        if fallback.is_none() && substituted.return_ty != Some(TypeId::VOID) {
            fallback = Some(
                substituted
                    .return_ty
                    .unwrap_or_else(|| interner.unknown_results()),
            );
        }
        if collect {
            failures.push((candidate, problems.into_problems()));
        }
    }

    let several = candidates.len() > 1;
    for (candidate, problems) in failures {
        let shown = display_signature(interner, candidate);
        for mut problem in problems {
            if several {
                problem.message = format_message(
                    diagnostic_messages::IN_SIGNATURE_SUFFIX,
                    &[&problem.message, &shown],
                );
            }
            sink.report(problem);
        }
    }

    Ok(Some(SignatureMatch {
        signature: None,
        substituted: None,
        return_ty: fallback.unwrap_or(TypeId::VOID),
    }))
}

#[cfg(test)]
#[path = "../tests/matcher_tests.rs"]
mod tests;
