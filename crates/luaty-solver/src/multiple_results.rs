//! Multi-value positions.
//!
//! A [`MultipleResultsType`] models a call result or vararg list: a fixed
//! prefix of positions and, when variadic, an unbounded repetition of the
//! last entry. Unions whose members are multi-results are merged position
//! by position before any positional query.

use crate::context::SearchContext;
use crate::types::{MultipleResultsType, TypeData, TypeId};
use crate::union::union;
use smallvec::SmallVec;

/// Merge a union of multi-results into one multi-result. Non-union types
/// are returned unchanged, and a union that merges into a single position
/// collapses to that position's type.
pub fn flatten(ctx: &SearchContext<'_>, ty: TypeId) -> TypeId {
    let interner = ctx.interner();
    let data = interner.lookup(ty);
    let TypeData::Union(members) = &*data else {
        return ty;
    };

    let mut positions: SmallVec<[TypeId; 4]> = SmallVec::new();
    let mut variadic_tail: Option<TypeId> = None;
    let mut first_member = true;

    for member in members {
        let member_data = interner.lookup(*member);
        let result_count = match &*member_data {
            TypeData::MultipleResults(results) => {
                let last_index = results.list.len().saturating_sub(1);
                for (index, result) in results.list.iter().enumerate() {
                    if index < positions.len() {
                        positions[index] = union(ctx, positions[index], *result);
                    } else if !results.variadic || index < last_index {
                        let widened = match variadic_tail {
                            Some(tail) => union(ctx, tail, *result),
                            None => *result,
                        };
                        // Earlier members produced fewer values here.
                        positions.push(if first_member {
                            widened
                        } else {
                            union(ctx, widened, TypeId::NIL)
                        });
                    }
                }

                if results.variadic
                    && let Some(&tail) = results.list.last()
                {
                    for position in positions.iter_mut().skip(results.list.len()) {
                        *position = union(ctx, *position, tail);
                    }
                    variadic_tail = Some(match variadic_tail {
                        Some(existing) => union(ctx, existing, tail),
                        None => tail,
                    });
                    positions.len()
                } else {
                    results.list.len()
                }
            }
            _ => {
                match positions.first_mut() {
                    Some(first) => *first = union(ctx, *first, *member),
                    None => positions.push(*member),
                }
                1
            }
        };

        for position in positions.iter_mut().skip(result_count) {
            *position = union(ctx, *position, TypeId::NIL);
        }
        first_member = false;
    }

    if positions.len() == 1 && variadic_tail.is_none() {
        return positions[0];
    }
    if let Some(tail) = variadic_tail {
        positions.push(tail);
    }
    interner.multiple_results(positions, variadic_tail.is_some())
}

/// The type at zero-based position `index` of a (possibly multi-valued)
/// type. Positions past a variadic prefix may be absent at runtime and so
/// include `nil`.
pub fn get_result(ctx: &SearchContext<'_>, ty: TypeId, index: usize) -> TypeId {
    let flattened = flatten(ctx, ty);
    let data = ctx.interner().lookup(flattened);
    let TypeData::MultipleResults(results) = &*data else {
        return if index == 0 { flattened } else { TypeId::NIL };
    };
    let Some(&last) = results.list.last() else {
        return TypeId::NIL;
    };
    let last_index = results.list.len() - 1;

    if index < last_index {
        get_result(ctx, results.list[index], 0)
    } else if results.variadic {
        let tail = union(
            ctx,
            get_result(ctx, last, 0),
            get_result(ctx, last, index - last_index),
        );
        union(ctx, TypeId::NIL, tail)
    } else {
        get_result(ctx, last, index - last_index)
    }
}

/// The multi-result view of a type, if it is one after flattening.
pub fn as_multiple_results(ctx: &SearchContext<'_>, ty: TypeId) -> Option<MultipleResultsType> {
    match &*ctx.interner().lookup(flatten(ctx, ty)) {
        TypeData::MultipleResults(results) => Some(results.clone()),
        _ => None,
    }
}

/// Pair the positions of `first` with those of `second`.
///
/// The walk follows `first`: a variadic `first` keeps yielding its tail (as
/// `nil | tail`) until `second` is exhausted. With
/// `supports_multiple_results`, the last position of `first` receives the
/// remainder of `second` as one multi-result.
pub fn convolve<'c, 'a>(
    ctx: &'c SearchContext<'a>,
    first: &MultipleResultsType,
    second: &MultipleResultsType,
    supports_multiple_results: bool,
) -> Convolve<'c, 'a> {
    Convolve {
        ctx,
        first: first.clone(),
        second: second.clone(),
        supports_multiple_results,
        index1: 0,
        index2: 0,
    }
}

pub struct Convolve<'c, 'a> {
    ctx: &'c SearchContext<'a>,
    first: MultipleResultsType,
    second: MultipleResultsType,
    supports_multiple_results: bool,
    index1: usize,
    index2: usize,
}

impl Iterator for Convolve<'_, '_> {
    type Item = (TypeId, Option<TypeId>);

    fn next(&mut self) -> Option<Self::Item> {
        let list1 = &self.first.list;
        let list2 = &self.second.list;
        let has_next = if self.first.variadic {
            self.index2 <= list2.len()
        } else {
            self.index1 < list1.len()
        };
        if !has_next {
            return None;
        }
        let last1 = list1.last().copied()?;
        let last_index1 = list1.len() - 1;
        let last_index2 = list2.len().saturating_sub(1);

        let ty1 = if self.first.variadic && self.index1 >= last_index1 {
            union(self.ctx, TypeId::NIL, last1)
        } else {
            list1[self.index1]
        };

        let ty2 = if self.supports_multiple_results && self.index1 == last_index1 {
            if self.index2 >= last_index2 {
                match list2.last() {
                    Some(&tail) if self.second.variadic => {
                        Some(self.ctx.interner().multiple_results([tail], true))
                    }
                    _ => list2.get(self.index2).copied(),
                }
            } else {
                Some(self.ctx.interner().multiple_results(
                    list2[self.index2..].iter().copied(),
                    self.second.variadic,
                ))
            }
        } else if self.second.variadic && self.index2 >= last_index2 && !list2.is_empty() {
            Some(union(self.ctx, TypeId::NIL, list2[last_index2]))
        } else {
            list2.get(self.index2).copied()
        };

        self.index1 += 1;
        self.index2 += 1;
        Some((ty1, ty2))
    }
}

#[cfg(test)]
#[path = "../tests/multiple_results_tests.rs"]
mod tests;
