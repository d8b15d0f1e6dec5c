//! Compact binary form of type values.
//!
//! Each value is written as its kind tag (one byte), its flags (u32 LE) and
//! a variant payload. Nested types are written inline, so a decoded value
//! is re-interned bottom-up and comes back as the same handle in the same
//! arena. Strings are length-prefixed UTF-8, lists are count-prefixed and
//! optional values carry a presence byte.

use crate::intern::TypeInterner;
use crate::types::{
    AliasType, ClassType, FunctionType, GenericParamInfo, LiteralType, MultipleResultsType,
    ParamInfo, PrimitiveKind, Signature, TyFlags, TyKind, TypeData, TypeId,
};
use luaty_common::limits::MAX_DECODE_DEPTH;
use smallvec::SmallVec;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input at byte {0}")]
    Truncated(usize),
    #[error("unknown {what} tag {tag} at byte {offset}")]
    BadTag {
        what: &'static str,
        tag: u8,
        offset: usize,
    },
    #[error("invalid UTF-8 in string at byte {0}")]
    BadUtf8(usize),
    #[error("{0} trailing bytes after type value")]
    TrailingBytes(usize),
    #[error("type nesting exceeds the decode depth limit")]
    TooDeep,
}

// =============================================================================
// Encoding
// =============================================================================

pub fn encode(interner: &TypeInterner, ty: TypeId) -> Vec<u8> {
    let mut encoder = Encoder {
        interner,
        out: Vec::new(),
    };
    encoder.ty(ty);
    encoder.out
}

struct Encoder<'a> {
    interner: &'a TypeInterner,
    out: Vec<u8>,
}

impl Encoder<'_> {
    fn u8(&mut self, value: u8) {
        self.out.push(value);
    }

    fn u32(&mut self, value: u32) {
        self.out.extend_from_slice(&value.to_le_bytes());
    }

    fn len(&mut self, len: usize) {
        self.u32(u32::try_from(len).unwrap_or(u32::MAX));
    }

    fn bool(&mut self, value: bool) {
        self.u8(u8::from(value));
    }

    fn str(&mut self, atom: luaty_common::Atom) {
        let text = self.interner.resolve_atom(atom);
        self.len(text.len());
        self.out.extend_from_slice(text.as_bytes());
    }

    fn opt(&mut self, ty: Option<TypeId>) {
        match ty {
            Some(ty) => {
                self.u8(1);
                self.ty(ty);
            }
            None => self.u8(0),
        }
    }

    fn list(&mut self, types: &[TypeId]) {
        self.len(types.len());
        for ty in types {
            self.ty(*ty);
        }
    }

    fn signature(&mut self, signature: &Signature) {
        self.bool(signature.colon_call);
        self.list(&signature.generic_params);
        self.len(signature.params.len());
        for param in &signature.params {
            self.str(param.name);
            self.bool(param.optional);
            self.opt(param.ty);
        }
        self.opt(signature.variadic);
        self.opt(signature.return_ty);
    }

    fn ty(&mut self, ty: TypeId) {
        let data = self.interner.lookup(ty);
        self.u8(data.kind() as u8);
        self.u32(data.flags().bits());
        match &*data {
            TypeData::Unknown | TypeData::Nil | TypeData::Void => {}
            TypeData::Primitive(kind) => self.u8(*kind as u8),
            TypeData::Literal(literal) => {
                self.u8(literal.kind as u8);
                self.str(literal.value);
            }
            TypeData::Array(base) => self.ty(*base),
            TypeData::Class(class) => self.str(class.name),
            TypeData::Alias(alias) => {
                self.str(alias.name);
                self.list(&alias.params);
                self.ty(alias.target);
            }
            TypeData::Union(members) => self.list(members),
            TypeData::Generic { base, args } => {
                self.ty(*base);
                self.list(args);
            }
            TypeData::Function(function) => {
                self.signature(&function.main);
                self.len(function.overloads.len());
                for overload in &function.overloads {
                    self.signature(overload);
                }
            }
            TypeData::MultipleResults(results) => {
                self.bool(results.variadic);
                self.list(&results.list);
            }
            TypeData::GenericParam(param) => {
                self.str(param.name);
                self.str(param.var_name);
                self.opt(param.bound);
            }
            TypeData::Snippet(text) => self.str(*text),
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one type value occupying all of `bytes`.
pub fn decode(interner: &TypeInterner, bytes: &[u8]) -> Result<TypeId, DecodeError> {
    let mut decoder = Decoder {
        interner,
        bytes,
        pos: 0,
        depth: 0,
    };
    let ty = decoder.ty()?;
    let rest = bytes.len() - decoder.pos;
    if rest != 0 {
        return Err(DecodeError::TrailingBytes(rest));
    }
    Ok(ty)
}

struct Decoder<'a> {
    interner: &'a TypeInterner,
    bytes: &'a [u8],
    pos: usize,
    depth: u32,
}

impl<'a> Decoder<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::Truncated(self.pos))?;
        let bytes: &'a [u8] = self.bytes;
        let slice = &bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// A count, rejected early when it cannot fit in the remaining input.
    fn len(&mut self) -> Result<usize, DecodeError> {
        let at = self.pos;
        let len = self.u32()? as usize;
        if len > self.bytes.len() - self.pos {
            return Err(DecodeError::Truncated(at));
        }
        Ok(len)
    }

    fn bool(&mut self) -> Result<bool, DecodeError> {
        let at = self.pos;
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(DecodeError::BadTag {
                what: "bool",
                tag,
                offset: at,
            }),
        }
    }

    fn str(&mut self) -> Result<luaty_common::Atom, DecodeError> {
        let len = self.len()?;
        let at = self.pos;
        let bytes = self.take(len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::BadUtf8(at))?;
        Ok(self.interner.intern_string(text))
    }

    fn opt(&mut self) -> Result<Option<TypeId>, DecodeError> {
        if self.bool()? { Ok(Some(self.ty()?)) } else { Ok(None) }
    }

    fn list(&mut self) -> Result<Vec<TypeId>, DecodeError> {
        let len = self.len()?;
        let mut list = Vec::with_capacity(len);
        for _ in 0..len {
            list.push(self.ty()?);
        }
        Ok(list)
    }

    fn signature(&mut self) -> Result<Signature, DecodeError> {
        let colon_call = self.bool()?;
        let generic_params = self.list()?;
        let count = self.len()?;
        let mut params = Vec::with_capacity(count);
        for _ in 0..count {
            let name = self.str()?;
            let optional = self.bool()?;
            let ty = self.opt()?;
            params.push(ParamInfo { name, ty, optional });
        }
        Ok(Signature {
            colon_call,
            generic_params,
            params,
            variadic: self.opt()?,
            return_ty: self.opt()?,
        })
    }

    fn primitive(&mut self) -> Result<PrimitiveKind, DecodeError> {
        let at = self.pos;
        let tag = self.u8()?;
        PrimitiveKind::from_tag(tag).ok_or(DecodeError::BadTag {
            what: "primitive",
            tag,
            offset: at,
        })
    }

    fn ty(&mut self) -> Result<TypeId, DecodeError> {
        if self.depth >= MAX_DECODE_DEPTH {
            return Err(DecodeError::TooDeep);
        }
        self.depth += 1;
        let ty = self.ty_inner();
        self.depth -= 1;
        ty
    }

    fn ty_inner(&mut self) -> Result<TypeId, DecodeError> {
        let at = self.pos;
        let tag = self.u8()?;
        let kind = TyKind::from_tag(tag).ok_or(DecodeError::BadTag {
            what: "kind",
            tag,
            offset: at,
        })?;
        let flags = TyFlags::from_bits_truncate(self.u32()?);
        let interner = self.interner;

        let data = match kind {
            TyKind::Unknown => return Ok(TypeId::UNKNOWN),
            TyKind::Nil => return Ok(TypeId::NIL),
            TyKind::Void => return Ok(TypeId::VOID),
            TyKind::Primitive => return Ok(self.primitive()?.type_id()),
            TyKind::PrimitiveLiteral => {
                let kind = self.primitive()?;
                TypeData::Literal(LiteralType {
                    kind,
                    value: self.str()?,
                })
            }
            TyKind::Array => TypeData::Array(self.ty()?),
            TyKind::Class => TypeData::Class(ClassType {
                name: self.str()?,
                flags,
            }),
            TyKind::Alias => {
                let name = self.str()?;
                let params = self.list()?;
                TypeData::Alias(AliasType {
                    name,
                    params,
                    target: self.ty()?,
                })
            }
            TyKind::Union => return Ok(interner.union_normalized(SmallVec::from_vec(self.list()?))),
            TyKind::Generic => {
                let base = self.ty()?;
                TypeData::Generic {
                    base,
                    args: SmallVec::from_vec(self.list()?),
                }
            }
            TyKind::Function => {
                let main = self.signature()?;
                let count = self.len()?;
                let mut overloads = Vec::with_capacity(count);
                for _ in 0..count {
                    overloads.push(self.signature()?);
                }
                TypeData::Function(Box::new(FunctionType {
                    main,
                    overloads,
                    flags,
                }))
            }
            TyKind::MultipleResults => {
                let variadic = self.bool()?;
                TypeData::MultipleResults(MultipleResultsType {
                    list: SmallVec::from_vec(self.list()?),
                    variadic,
                })
            }
            TyKind::GenericParam => {
                let name = self.str()?;
                let var_name = self.str()?;
                TypeData::GenericParam(GenericParamInfo {
                    name,
                    var_name,
                    bound: self.opt()?,
                })
            }
            TyKind::Snippet => TypeData::Snippet(self.str()?),
        };
        Ok(interner.intern(data))
    }
}

#[cfg(test)]
#[path = "../tests/codec_tests.rs"]
mod tests;
