//! Type value model.
//!
//! Every type the engine reasons about is a [`TypeData`] value interned in the
//! [`TypeInterner`](crate::TypeInterner) and addressed by a [`TypeId`].
//! Values are immutable; "changing" a type always produces a new handle via
//! union, subtraction or substitution.
//!
//! Classes and aliases are referenced by *name*. Their declarations (members,
//! superclass, generic parameters, alias bodies) live in the declaration layer
//! and are fetched lazily through the [`SearchContext`](crate::SearchContext),
//! which keeps mutually-referential declarations from forming owned cycles.

use bitflags::bitflags;
use luaty_common::{Atom, NodeId};
use smallvec::SmallVec;

// =============================================================================
// TypeId
// =============================================================================

/// Handle to an interned type value.
///
/// Handle equality implies type equality, but not the other way round: a
/// class reference and the alias it resolves to have different handles and
/// are still `equals`. Use [`crate::equals`] for semantic comparison.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const UNKNOWN: TypeId = TypeId(0);
    pub const NIL: TypeId = TypeId(1);
    pub const VOID: TypeId = TypeId(2);
    pub const BOOLEAN: TypeId = TypeId(3);
    pub const STRING: TypeId = TypeId(4);
    pub const NUMBER: TypeId = TypeId(5);
    pub const TABLE: TypeId = TypeId(6);
    pub const FUNCTION: TypeId = TypeId(7);
    pub const TRUE: TypeId = TypeId(8);
    pub const FALSE: TypeId = TypeId(9);

    /// First id handed out for non-intrinsic types.
    pub const FIRST_USER: u32 = 10;

    #[inline]
    pub const fn is_intrinsic(self) -> bool {
        self.0 < Self::FIRST_USER
    }

    #[inline]
    pub const fn is_unknown(self) -> bool {
        self.0 == Self::UNKNOWN.0
    }

    #[inline]
    pub const fn is_void(self) -> bool {
        self.0 == Self::VOID.0
    }

    #[inline]
    pub const fn is_nil(self) -> bool {
        self.0 == Self::NIL.0
    }
}

// =============================================================================
// Flags
// =============================================================================

bitflags! {
    /// Per-type modifiers. Not part of the kind tag, but part of identity for
    /// classes (two class handles with the same name and different flags are
    /// distinct).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TyFlags: u32 {
        const ANONYMOUS = 0x1;
        const GLOBAL = 0x2;
        const SELF_FUNCTION = 0x4;
        const ANONYMOUS_TABLE = 0x8;
        const SHAPE = 0x10;
        const UNKNOWN = 0x20;
    }
}

bitflags! {
    /// Per-call modifiers for [`crate::contravariant_of`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VarianceFlags: u32 {
        /// `Unknown` on the source side is no longer compatible with everything.
        const STRICT_UNKNOWN = 0x1;
        /// Target generic parameters accept anything their bound accepts.
        const ABSTRACT_PARAMS = 0x2;
        /// Table-valued sources are compared covariantly (literal tables).
        const WIDEN_TABLES = 0x4;
        /// `nil` on the source side is no longer compatible with everything.
        const STRICT_NIL = 0x8;
        /// Shapes are compared nominally unless the source is a table literal.
        const NON_STRUCTURAL = 0x10;
    }
}

// =============================================================================
// Kinds
// =============================================================================

/// The kind tag of a type value. The discriminant is the serialized tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TyKind {
    Unknown = 0,
    Primitive = 1,
    Array = 2,
    Function = 3,
    Class = 4,
    Alias = 5,
    Union = 6,
    Generic = 7,
    Nil = 8,
    Void = 9,
    MultipleResults = 10,
    GenericParam = 11,
    PrimitiveLiteral = 12,
    Snippet = 13,
}

impl TyKind {
    pub const fn from_tag(tag: u8) -> Option<TyKind> {
        Some(match tag {
            0 => TyKind::Unknown,
            1 => TyKind::Primitive,
            2 => TyKind::Array,
            3 => TyKind::Function,
            4 => TyKind::Class,
            5 => TyKind::Alias,
            6 => TyKind::Union,
            7 => TyKind::Generic,
            8 => TyKind::Nil,
            9 => TyKind::Void,
            10 => TyKind::MultipleResults,
            11 => TyKind::GenericParam,
            12 => TyKind::PrimitiveLiteral,
            13 => TyKind::Snippet,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrimitiveKind {
    String = 0,
    Number = 1,
    Boolean = 2,
    Table = 3,
    Function = 4,
}

impl PrimitiveKind {
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Table => "table",
            PrimitiveKind::Function => "function",
        }
    }

    pub const fn from_tag(tag: u8) -> Option<PrimitiveKind> {
        Some(match tag {
            0 => PrimitiveKind::String,
            1 => PrimitiveKind::Number,
            2 => PrimitiveKind::Boolean,
            3 => PrimitiveKind::Table,
            4 => PrimitiveKind::Function,
            _ => return None,
        })
    }

    /// The singleton handle of this primitive.
    pub const fn type_id(self) -> TypeId {
        match self {
            PrimitiveKind::String => TypeId::STRING,
            PrimitiveKind::Number => TypeId::NUMBER,
            PrimitiveKind::Boolean => TypeId::BOOLEAN,
            PrimitiveKind::Table => TypeId::TABLE,
            PrimitiveKind::Function => TypeId::FUNCTION,
        }
    }
}

// =============================================================================
// Variant payloads
// =============================================================================

/// A literal type such as `"ok"`, `42` or `true`. Number literals keep their
/// source text so `1` and `1.0` stay distinct, as they do in annotations.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LiteralType {
    pub kind: PrimitiveKind,
    pub value: Atom,
}

/// A by-name class reference. The declaration is looked up lazily.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassType {
    pub name: Atom,
    pub flags: TyFlags,
}

/// A named alias with its (possibly parameterized) target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AliasType {
    pub name: Atom,
    /// Generic parameters, each a `GenericParam` type.
    pub params: Vec<TypeId>,
    pub target: TypeId,
}

/// A generic parameter placeholder.
///
/// `name` is the qualified scope name (unique per declaring scope) and is the
/// identity of the parameter; `var_name` is what the user wrote.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericParamInfo {
    pub name: Atom,
    pub var_name: Atom,
    pub bound: Option<TypeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParamInfo {
    pub name: Atom,
    pub ty: Option<TypeId>,
    pub optional: bool,
}

impl ParamInfo {
    pub fn new(name: Atom, ty: TypeId) -> Self {
        ParamInfo {
            name,
            ty: Some(ty),
            optional: false,
        }
    }

    pub fn untyped(name: Atom) -> Self {
        ParamInfo {
            name,
            ty: None,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[inline]
    pub fn ty_or_unknown(&self) -> TypeId {
        self.ty.unwrap_or(TypeId::UNKNOWN)
    }
}

/// One callable signature of a function type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    /// Declared with `:`; the receiver is an implicit first argument.
    pub colon_call: bool,
    /// Signature-scoped generic parameters, each a `GenericParam` type.
    pub generic_params: Vec<TypeId>,
    pub params: Vec<ParamInfo>,
    pub variadic: Option<TypeId>,
    pub return_ty: Option<TypeId>,
}

impl Signature {
    pub fn new(params: Vec<ParamInfo>, return_ty: Option<TypeId>) -> Self {
        Signature {
            colon_call: false,
            generic_params: Vec::new(),
            params,
            variadic: None,
            return_ty,
        }
    }

    pub fn with_colon_call(mut self, colon_call: bool) -> Self {
        self.colon_call = colon_call;
        self
    }

    pub fn with_variadic(mut self, variadic: TypeId) -> Self {
        self.variadic = Some(variadic);
        self
    }

    pub fn with_generic_params(mut self, generic_params: Vec<TypeId>) -> Self {
        self.generic_params = generic_params;
        self
    }

    #[inline]
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub main: Signature,
    /// Checked before `main`, in declaration order.
    pub overloads: Vec<Signature>,
    pub flags: TyFlags,
}

impl FunctionType {
    /// Overloads first, then the main signature.
    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.overloads.iter().chain(std::iter::once(&self.main))
    }
}

/// Zero or more positional values; when `variadic`, the last type repeats.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MultipleResultsType {
    pub list: SmallVec<[TypeId; 4]>,
    pub variadic: bool,
}

/// The interned representation of a type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    Unknown,
    Nil,
    Void,
    Primitive(PrimitiveKind),
    Literal(LiteralType),
    Array(TypeId),
    Class(ClassType),
    Alias(AliasType),
    /// Two or more members, sorted by display name, no nested unions.
    Union(SmallVec<[TypeId; 4]>),
    Generic {
        base: TypeId,
        args: SmallVec<[TypeId; 2]>,
    },
    Function(Box<FunctionType>),
    MultipleResults(MultipleResultsType),
    GenericParam(GenericParamInfo),
    /// Verbatim type text the host could not parse; never compatible with
    /// anything but itself.
    Snippet(Atom),
}

impl TypeData {
    pub fn kind(&self) -> TyKind {
        match self {
            TypeData::Unknown => TyKind::Unknown,
            TypeData::Nil => TyKind::Nil,
            TypeData::Void => TyKind::Void,
            TypeData::Primitive(_) => TyKind::Primitive,
            TypeData::Literal(_) => TyKind::PrimitiveLiteral,
            TypeData::Array(_) => TyKind::Array,
            TypeData::Class(_) => TyKind::Class,
            TypeData::Alias(_) => TyKind::Alias,
            TypeData::Union(_) => TyKind::Union,
            TypeData::Generic { .. } => TyKind::Generic,
            TypeData::Function(_) => TyKind::Function,
            TypeData::MultipleResults(_) => TyKind::MultipleResults,
            TypeData::GenericParam(_) => TyKind::GenericParam,
            TypeData::Snippet(_) => TyKind::Snippet,
        }
    }

    pub fn flags(&self) -> TyFlags {
        match self {
            TypeData::Class(class) => class.flags,
            TypeData::Function(function) => function.flags,
            _ => TyFlags::empty(),
        }
    }
}

// =============================================================================
// Members
// =============================================================================

/// How a member is addressed: by field name or by an index type
/// (`[1]`, `[string]`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKey {
    Name(Atom),
    Index(TypeId),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberInfo {
    pub key: MemberKey,
    /// `None` when the declaration layer could not determine a type.
    pub ty: Option<TypeId>,
    pub explicitly_typed: bool,
    /// The declaring syntax, used to anchor nested problems.
    pub node: Option<NodeId>,
}

impl MemberInfo {
    pub fn named(name: Atom, ty: TypeId) -> Self {
        MemberInfo {
            key: MemberKey::Name(name),
            ty: Some(ty),
            explicitly_typed: true,
            node: None,
        }
    }

    pub fn indexed(index: TypeId, ty: TypeId) -> Self {
        MemberInfo {
            key: MemberKey::Index(index),
            ty: Some(ty),
            explicitly_typed: true,
            node: None,
        }
    }

    pub fn at(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn inferred(mut self) -> Self {
        self.explicitly_typed = false;
        self
    }

    #[inline]
    pub fn name(&self) -> Option<Atom> {
        match self.key {
            MemberKey::Name(name) => Some(name),
            MemberKey::Index(_) => None,
        }
    }

    #[inline]
    pub fn index_ty(&self) -> Option<TypeId> {
        match self.key {
            MemberKey::Name(_) => None,
            MemberKey::Index(ty) => Some(ty),
        }
    }
}

/// Suffix marking the synthesized "self" class of a method receiver.
pub const SELF_CLASS_SUFFIX: &str = ":self";

/// Prefix of class names synthesized for globals.
pub const GLOBAL_CLASS_PREFIX: &str = "$";
