//! Type inference and compatibility engine for annotated Lua.
//!
//! This crate owns the type value model and the algorithms that run over
//! it:
//!
//! - **Interning**: every type is a `TypeData` value behind a `TypeId`
//!   handle, so handle equality is O(1)
//! - **Resolution**: aliases, generic instantiations and by-name classes are
//!   resolved lazily through a [`SearchContext`] that also carries the
//!   recursion guards and caches of one query
//! - **Variance**: [`contravariant_of`] decides assignability, and the
//!   reporting checks in [`problems`] explain a failure
//! - **Calls**: [`match_signature`] picks an overload, infers generic
//!   parameters from the arguments and produces the call's return type
//!
//! Declarations (class members, superclasses, alias bodies) come from the
//! host through [`DeclarationProvider`]; [`DeclarationStore`] is an
//! in-memory implementation.
pub mod codec;
pub mod context;
pub mod decl;
mod format;
pub mod generic_analyzer;
mod intern;
pub mod matcher;
pub mod members;
pub mod multiple_results;
pub mod problems;
pub mod recursion;
pub mod resolve;
pub mod settings;
pub mod signature;
pub mod substitute;
pub mod types;
pub mod union;
pub mod variance;

pub use codec::{DecodeError, decode, encode};
pub use context::{CancellationToken, Canceled, MULTIPLE_RESULTS_INDEX, SearchContext};
pub use decl::{AliasDecl, ClassDecl, DeclarationProvider, DeclarationStore};
pub use format::TypeFormatter;
pub use generic_analyzer::GenericAnalyzer;
pub use intern::TypeInterner;
pub use matcher::{CallArgument, CallSite, SignatureMatch, match_signature};
pub use problems::{
    FastSink, FnSink, Problem, ProblemCollector, ProblemSink, check_contravariant,
    contravariant_of_shape,
};
pub use recursion::RecursionProfile;
pub use settings::{SettingsError, SolverSettings};
pub use substitute::{
    AliasSubstitutor, ChainSubstitutor, GenericParameterResolutionSubstitutor,
    ParameterSubstitutor, ScopeSubstitutor, SelfSubstitutor, TypeSubstitutor, substitute,
};
pub use types::{
    AliasType, ClassType, FunctionType, GenericParamInfo, LiteralType, MemberInfo, MemberKey,
    MultipleResultsType, ParamInfo, PrimitiveKind, Signature, TyFlags, TyKind, TypeData, TypeId,
    VarianceFlags,
};
pub use union::{not, union, union_all};
pub use variance::{contravariant_of, equals};
