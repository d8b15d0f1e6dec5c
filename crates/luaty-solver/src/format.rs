//! Display names.
//!
//! Rendering is purely syntactic: it never consults declarations, so it can
//! run without a search context and its output can be cached per handle.
//! Union member order depends on these names.

use crate::TypeInterner;
use crate::types::{GLOBAL_CLASS_PREFIX, PrimitiveKind, Signature, TyFlags, TypeData, TypeId};
use std::fmt::Write;

pub struct TypeFormatter<'a> {
    interner: &'a TypeInterner,
}

impl<'a> TypeFormatter<'a> {
    pub fn new(interner: &'a TypeInterner) -> Self {
        TypeFormatter { interner }
    }

    pub fn render(&self, id: TypeId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out);
        out
    }

    pub fn render_signature(&self, signature: &Signature) -> String {
        let mut out = String::from("fun");
        self.signature_into(signature, &mut out);
        out
    }

    fn render_into(&self, id: TypeId, out: &mut String) {
        let data = self.interner.lookup(id);
        match &*data {
            TypeData::Unknown => out.push_str("any"),
            TypeData::Nil => out.push_str("nil"),
            TypeData::Void => out.push_str("void"),
            TypeData::Primitive(kind) => out.push_str(kind.name()),
            TypeData::Literal(literal) => {
                let value = self.interner.resolve_atom(literal.value);
                if literal.kind == PrimitiveKind::String {
                    out.push('"');
                    for ch in value.chars() {
                        match ch {
                            '"' => out.push_str("\\\""),
                            '\\' => out.push_str("\\\\"),
                            '\n' => out.push_str("\\n"),
                            _ => out.push(ch),
                        }
                    }
                    out.push('"');
                } else {
                    out.push_str(&value);
                }
            }
            TypeData::Array(base) => {
                let parenthesize = self.needs_parentheses(*base);
                if parenthesize {
                    out.push('(');
                }
                self.render_into(*base, out);
                if parenthesize {
                    out.push(')');
                }
                out.push_str("[]");
            }
            TypeData::Class(class) => {
                let name = self.interner.resolve_atom(class.name);
                if class.flags.contains(TyFlags::ANONYMOUS_TABLE) {
                    out.push_str("table");
                } else if class.flags.contains(TyFlags::GLOBAL) {
                    let var_name = name.strip_prefix(GLOBAL_CLASS_PREFIX).unwrap_or(&*name);
                    let _ = write!(out, "[global {var_name}]");
                } else if class.flags.contains(TyFlags::ANONYMOUS)
                    && !self.interner.is_self_class(id)
                {
                    let _ = write!(out, "[local {name}]");
                } else {
                    out.push_str(&name);
                }
            }
            TypeData::Alias(alias) => out.push_str(&self.interner.resolve_atom(alias.name)),
            TypeData::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" | ");
                    }
                    let parenthesize = matches!(
                        &*self.interner.lookup(*member),
                        TypeData::Function(_) | TypeData::MultipleResults(_)
                    );
                    if parenthesize {
                        out.push('(');
                    }
                    self.render_into(*member, out);
                    if parenthesize {
                        out.push(')');
                    }
                }
            }
            TypeData::Generic { base, args } => {
                match &*self.interner.lookup(*base) {
                    TypeData::Class(class) => {
                        out.push_str(&self.interner.resolve_atom(class.name))
                    }
                    _ => self.render_into(*base, out),
                }
                out.push('<');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(*arg, out);
                }
                out.push('>');
            }
            TypeData::Function(function) => {
                out.push_str("fun");
                self.signature_into(&function.main, out);
            }
            TypeData::MultipleResults(results) => {
                for (i, ty) in results.list.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(*ty, out);
                }
                if results.variadic {
                    out.push_str("...");
                }
            }
            TypeData::GenericParam(param) => {
                out.push_str(&self.interner.resolve_atom(param.var_name));
                if let Some(bound) = param.bound {
                    out.push_str(" : ");
                    self.render_into(bound, out);
                }
            }
            TypeData::Snippet(text) => out.push_str(&self.interner.resolve_atom(*text)),
        }
    }

    fn signature_into(&self, signature: &Signature, out: &mut String) {
        out.push('(');
        for (i, param) in signature.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&self.interner.resolve_atom(param.name));
            out.push_str(": ");
            self.parenthesized_bound_into(param.ty_or_unknown(), out);
        }
        if let Some(variadic) = signature.variadic {
            if !signature.params.is_empty() {
                out.push_str(", ");
            }
            out.push_str("...: ");
            self.render_into(variadic, out);
        }
        out.push(')');

        if let Some(return_ty) = signature.return_ty {
            out.push_str(": ");
            let parenthesize = matches!(&*self.interner.lookup(return_ty), TypeData::Union(_))
                || self.is_bounded_param(return_ty);
            if parenthesize {
                out.push('(');
            }
            self.render_into(return_ty, out);
            if parenthesize {
                out.push(')');
            }
        }
    }

    fn parenthesized_bound_into(&self, ty: TypeId, out: &mut String) {
        if self.is_bounded_param(ty) {
            out.push('(');
            self.render_into(ty, out);
            out.push(')');
        } else {
            self.render_into(ty, out);
        }
    }

    fn needs_parentheses(&self, ty: TypeId) -> bool {
        matches!(
            &*self.interner.lookup(ty),
            TypeData::Union(_) | TypeData::Function(_)
        ) || self.is_bounded_param(ty)
    }

    fn is_bounded_param(&self, ty: TypeId) -> bool {
        matches!(
            &*self.interner.lookup(ty),
            TypeData::GenericParam(param) if param.bound.is_some()
        )
    }
}

#[cfg(test)]
#[path = "../tests/format_tests.rs"]
mod tests;
