//! Signature comparison and call-shape helpers.

use crate::context::SearchContext;
use crate::members::signatures_of;
use crate::types::{ParamInfo, Signature, TyFlags, TypeId, VarianceFlags};
use crate::variance::{contravariant_of, equals};
use crate::TypeInterner;

/// Name of the parameter synthesized for a method receiver.
pub const SELF_PARAM: &str = "self";

fn optional_equals(ctx: &SearchContext<'_>, a: Option<TypeId>, b: Option<TypeId>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => equals(ctx, a, b),
        (None, None) => true,
        _ => false,
    }
}

pub fn signature_equals(ctx: &SearchContext<'_>, a: &Signature, b: &Signature) -> bool {
    a.colon_call == b.colon_call
        && optional_equals(ctx, a.return_ty, b.return_ty)
        && optional_equals(ctx, a.variadic, b.variadic)
        && a.params.len() == b.params.len()
        && a.params.iter().zip(&b.params).all(|(x, y)| {
            x.optional == y.optional && equals(ctx, x.ty_or_unknown(), y.ty_or_unknown())
        })
        && a.generic_params.len() == b.generic_params.len()
        && a.generic_params
            .iter()
            .zip(&b.generic_params)
            .all(|(x, y)| equals(ctx, *x, *y))
}

/// Whether a function with signature `source` may stand in for `target`.
///
/// Parameters are compared in reverse: every parameter `source` declares
/// must exist in `target` and accept what `target` would be passed. Return
/// types are compared forwards; an undeclared target return accepts any.
pub fn signature_contravariant_of(
    ctx: &SearchContext<'_>,
    target: &Signature,
    source: &Signature,
    flags: VarianceFlags,
) -> bool {
    for (i, source_param) in source.params.iter().enumerate() {
        let Some(target_param) = target.params.get(i) else {
            return false;
        };
        if !contravariant_of(
            ctx,
            source_param.ty_or_unknown(),
            target_param.ty_or_unknown(),
            flags,
        ) {
            return false;
        }
    }

    match (target.return_ty, source.return_ty) {
        (Some(target_return), Some(source_return)) => {
            contravariant_of(ctx, target_return, source_return, flags)
        }
        (None, Some(_)) => true,
        (Some(_), None) => false,
        (None, None) => true,
    }
}

/// A `self` parameter typed as the receiver (or `any`).
pub fn self_param(interner: &TypeInterner, receiver: Option<TypeId>) -> ParamInfo {
    ParamInfo::new(
        interner.intern_string(SELF_PARAM),
        receiver.unwrap_or(TypeId::UNKNOWN),
    )
}

/// Walk the parameters a call fills, positionally.
///
/// A colon call of a dot-declared signature passes the receiver as the
/// first declared parameter, which is therefore skipped. A dot call of a
/// colon-declared signature passes `self` explicitly as the first argument,
/// so a `self` parameter is synthesized in front.
pub fn process_parameters(
    interner: &TypeInterner,
    signature: &Signature,
    receiver: Option<TypeId>,
    colon_style: bool,
    mut f: impl FnMut(usize, &ParamInfo) -> bool,
) {
    let mut index = 0;
    let mut skip = 0;
    if colon_style && !signature.colon_call {
        skip = 1;
    } else if !colon_style && signature.colon_call {
        if !f(index, &self_param(interner, receiver)) {
            return;
        }
        index += 1;
    }

    for param in signature.params.iter().skip(skip) {
        if !f(index, param) {
            return;
        }
        index += 1;
    }
}

/// Walk declared parameters at the positions they occupy in the full
/// argument list of a call (receiver included).
pub fn process_declared_parameters(
    signature: &Signature,
    mut f: impl FnMut(usize, &ParamInfo) -> bool,
) {
    let offset = usize::from(signature.colon_call);
    for (i, param) in signature.params.iter().enumerate() {
        if !f(i + offset, param) {
            return;
        }
    }
}

/// Signatures of `callable` that can take `arg_count` arguments: those with
/// at least that many parameters, or a variadic. When none can, the last
/// signature (the main one) is the only candidate.
///
/// `colon_style` is the call syntax; a method called with the other syntax
/// shifts the count by the receiver.
pub fn find_candidate_signatures(
    ctx: &SearchContext<'_>,
    callable: TypeId,
    arg_count: usize,
    colon_style: bool,
) -> Vec<Signature> {
    let method = ctx.interner().flags(callable).contains(TyFlags::SELF_FUNCTION);
    let arg_count = if method && !colon_style {
        arg_count.saturating_sub(1)
    } else if !method && colon_style {
        arg_count + 1
    } else {
        arg_count
    };

    let mut signatures = signatures_of(ctx, callable);
    let Some(last) = signatures.last().cloned() else {
        return Vec::new();
    };
    signatures
        .retain(|signature| signature.params.len() >= arg_count || signature.variadic.is_some());
    if signatures.is_empty() {
        signatures.push(last);
    }
    signatures
}

/// `fun(...): R` style display of a signature.
pub fn display_signature(interner: &TypeInterner, signature: &Signature) -> String {
    crate::format::TypeFormatter::new(interner).render_signature(signature)
}

#[cfg(test)]
#[path = "../tests/signature_tests.rs"]
mod tests;
