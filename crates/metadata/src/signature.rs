//! Signature blob decoding and type naming (II.23.2)
//!
//! Decoding has two failure levels. A structurally broken blob is a
//! [`MetadataError`]; a well-formed type that simply has no full name
//! (generic parameters, function pointers) decodes to an inner
//! [`Unresolvable`] so that the bytes after it are still consumed correctly.

use std::collections::HashMap;

use asminfo_core::{NameKind, Resolution, Unresolvable};

use crate::error::{MetadataError, Result};
use crate::reader::ByteReader;
use crate::root::Metadata;
use crate::tables::{col, CodedIndex, TableId};

/// Maximum nesting of signature elements and enclosing types
const MAX_DEPTH: usize = 64;
/// Highest array rank the runtime accepts
const MAX_ARRAY_RANK: u32 = 32;

pub(crate) mod element {
    pub(crate) const VOID: u8 = 0x01;
    pub(crate) const BOOLEAN: u8 = 0x02;
    pub(crate) const CHAR: u8 = 0x03;
    pub(crate) const I1: u8 = 0x04;
    pub(crate) const U1: u8 = 0x05;
    pub(crate) const I2: u8 = 0x06;
    pub(crate) const U2: u8 = 0x07;
    pub(crate) const I4: u8 = 0x08;
    pub(crate) const U4: u8 = 0x09;
    pub(crate) const I8: u8 = 0x0A;
    pub(crate) const U8: u8 = 0x0B;
    pub(crate) const R4: u8 = 0x0C;
    pub(crate) const R8: u8 = 0x0D;
    pub(crate) const STRING: u8 = 0x0E;
    pub(crate) const PTR: u8 = 0x0F;
    pub(crate) const BYREF: u8 = 0x10;
    pub(crate) const VALUETYPE: u8 = 0x11;
    pub(crate) const CLASS: u8 = 0x12;
    pub(crate) const VAR: u8 = 0x13;
    pub(crate) const ARRAY: u8 = 0x14;
    pub(crate) const GENERICINST: u8 = 0x15;
    pub(crate) const TYPEDBYREF: u8 = 0x16;
    pub(crate) const I: u8 = 0x18;
    pub(crate) const U: u8 = 0x19;
    pub(crate) const FNPTR: u8 = 0x1B;
    pub(crate) const OBJECT: u8 = 0x1C;
    pub(crate) const SZARRAY: u8 = 0x1D;
    pub(crate) const MVAR: u8 = 0x1E;
    pub(crate) const CMOD_REQD: u8 = 0x1F;
    pub(crate) const CMOD_OPT: u8 = 0x20;
    pub(crate) const SENTINEL: u8 = 0x41;
    pub(crate) const PINNED: u8 = 0x45;

    pub(crate) const FIELD: u8 = 0x06;
    pub(crate) const GENERIC: u8 = 0x10;
    pub(crate) const HASTHIS: u8 = 0x20;
}

use element as et;

/// A decoded name, or why the type has none
pub(crate) type Decoded = Result<Resolution<String>>;

/// Return and parameter types of a method signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MethodSig {
    pub(crate) ret: Resolution<String>,
    pub(crate) params: Vec<Resolution<String>>,
}

fn primitive(code: u8) -> Option<&'static str> {
    Some(match code {
        et::VOID => "System.Void",
        et::BOOLEAN => "System.Boolean",
        et::CHAR => "System.Char",
        et::I1 => "System.SByte",
        et::U1 => "System.Byte",
        et::I2 => "System.Int16",
        et::U2 => "System.UInt16",
        et::I4 => "System.Int32",
        et::U4 => "System.UInt32",
        et::I8 => "System.Int64",
        et::U8 => "System.UInt64",
        et::R4 => "System.Single",
        et::R8 => "System.Double",
        et::STRING => "System.String",
        et::TYPEDBYREF => "System.TypedReference",
        et::I => "System.IntPtr",
        et::U => "System.UIntPtr",
        et::OBJECT => "System.Object",
        _ => return None,
    })
}

fn unnamed(reason: impl Into<String>) -> Unresolvable {
    Unresolvable::new(NameKind::Type, reason)
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

fn array_suffix(rank: u32) -> String {
    match rank {
        1 => "[*]".to_string(),
        n => format!("[{}]", ",".repeat(n as usize - 1)),
    }
}

fn too_deep() -> MetadataError {
    MetadataError::MalformedSignature(format!("nesting deeper than {MAX_DEPTH}"))
}

/// Collapse both failure levels into a resolution for one member
pub(crate) fn settle(decoded: Decoded, kind: NameKind) -> Resolution<String> {
    match decoded {
        Ok(name) => name.map_err(|u| u.as_kind(kind)),
        Err(e) => Err(Unresolvable::new(kind, e.to_string())),
    }
}

/// Decodes signatures against one module's tables
#[derive(Debug, Clone, Copy)]
pub(crate) struct SigDecoder<'m, 'a> {
    meta: &'m Metadata<'a>,
    enclosing: &'m HashMap<u32, u32>,
}

impl<'m, 'a> SigDecoder<'m, 'a> {
    pub(crate) fn new(meta: &'m Metadata<'a>, enclosing: &'m HashMap<u32, u32>) -> Self {
        Self { meta, enclosing }
    }

    /// Full name of a TypeDef row
    pub(crate) fn type_def_name(&self, row: u32) -> Decoded {
        self.type_def_name_at(row, 0)
    }

    fn type_def_name_at(&self, row: u32, depth: usize) -> Decoded {
        if depth > MAX_DEPTH {
            return Err(too_deep());
        }
        let def = self.meta.tables.row(TableId::TypeDef, row)?;
        let name = self.meta.strings.get(def.get(col::TYPE_DEF_NAME))?;
        if name.is_empty() {
            return Ok(Err(unnamed(format!("TypeDef row {row} has no name"))));
        }
        if let Some(outer) = self.enclosing.get(&row) {
            let outer = self.type_def_name_at(*outer, depth + 1)?;
            return Ok(outer.map(|outer| format!("{outer}+{name}")));
        }
        let namespace = self.meta.strings.get(def.get(col::TYPE_DEF_NAMESPACE))?;
        Ok(Ok(qualify(namespace, name)))
    }

    fn type_ref_name(&self, row: u32, depth: usize) -> Decoded {
        if depth > MAX_DEPTH {
            return Err(too_deep());
        }
        let tref = self.meta.tables.row(TableId::TypeRef, row)?;
        let name = self.meta.strings.get(tref.get(col::TYPE_REF_NAME))?;
        if name.is_empty() {
            return Ok(Err(unnamed(format!("TypeRef row {row} has no name"))));
        }
        let scope = CodedIndex::ResolutionScope.decode(tref.get(col::TYPE_REF_SCOPE));
        if let Some((TableId::TypeRef, outer)) = scope {
            if outer != 0 {
                let outer = self.type_ref_name(outer, depth + 1)?;
                return Ok(outer.map(|outer| format!("{outer}+{name}")));
            }
        }
        let namespace = self.meta.strings.get(tref.get(col::TYPE_REF_NAMESPACE))?;
        Ok(Ok(qualify(namespace, name)))
    }

    fn type_spec_name(&self, row: u32, depth: usize) -> Decoded {
        let spec = self.meta.tables.row(TableId::TypeSpec, row)?;
        let blob = self.meta.blobs.get(spec.get(col::TYPE_SPEC_SIGNATURE))?;
        self.ty(&mut ByteReader::new(blob), depth + 1)
    }

    /// Resolve a compressed TypeDefOrRef token
    fn token_name(&self, coded: u32, depth: usize) -> Decoded {
        match CodedIndex::TypeDefOrRef.decode(coded) {
            Some((TableId::TypeDef, row)) => self.type_def_name_at(row, depth),
            Some((TableId::TypeRef, row)) => self.type_ref_name(row, depth),
            Some((TableId::TypeSpec, row)) => self.type_spec_name(row, depth),
            _ => Err(MetadataError::MalformedSignature(format!(
                "invalid TypeDefOrRef token {coded:#x}"
            ))),
        }
    }

    /// Type of a field signature
    pub(crate) fn field(&self, blob: &[u8]) -> Decoded {
        let mut r = ByteReader::new(blob);
        let kind = r.read_u8()?;
        if kind & 0x0F != et::FIELD {
            return Err(MetadataError::MalformedSignature(format!(
                "expected field signature, found calling convention {kind:#04x}"
            )));
        }
        self.ty(&mut r, 0)
    }

    /// Return and parameter types of a method signature
    pub(crate) fn method(&self, blob: &[u8]) -> Result<MethodSig> {
        self.method_at(&mut ByteReader::new(blob), 0)
    }

    fn method_at(&self, r: &mut ByteReader<'_>, depth: usize) -> Result<MethodSig> {
        let conv = r.read_u8()?;
        if conv & 0x0F == et::FIELD {
            return Err(MetadataError::MalformedSignature(
                "expected method signature, found field signature".into(),
            ));
        }
        if conv & et::GENERIC != 0 {
            let _generic_params = r.read_compressed()?;
        }
        let count = r.read_compressed()? as usize;
        let ret = self.ty(r, depth + 1)?;
        let mut params = Vec::with_capacity(count.min(r.remaining()));
        for _ in 0..count {
            if r.peek_u8()? == et::SENTINEL {
                r.skip(1)?;
            }
            params.push(self.ty(r, depth + 1)?);
        }
        Ok(MethodSig { ret, params })
    }

    fn ty(&self, r: &mut ByteReader<'_>, depth: usize) -> Decoded {
        if depth > MAX_DEPTH {
            return Err(too_deep());
        }
        let code = r.read_u8()?;
        if let Some(name) = primitive(code) {
            return Ok(Ok(name.to_string()));
        }
        match code {
            et::PTR => Ok(self.ty(r, depth + 1)?.map(|t| format!("{t}*"))),
            et::BYREF => Ok(self.ty(r, depth + 1)?.map(|t| format!("{t}&"))),
            et::SZARRAY => Ok(self.ty(r, depth + 1)?.map(|t| format!("{t}[]"))),
            et::VALUETYPE | et::CLASS => {
                let token = r.read_compressed()?;
                self.token_name(token, depth + 1)
            }
            et::VAR => {
                let n = r.read_compressed()?;
                Ok(Err(unnamed(format!("generic type parameter !{n}"))))
            }
            et::MVAR => {
                let n = r.read_compressed()?;
                Ok(Err(unnamed(format!("generic method parameter !!{n}"))))
            }
            et::ARRAY => {
                let elem = self.ty(r, depth + 1)?;
                let rank = r.read_compressed()?;
                if rank == 0 || rank > MAX_ARRAY_RANK {
                    return Err(MetadataError::MalformedSignature(format!(
                        "array of rank {rank}"
                    )));
                }
                let sizes = r.read_compressed()?;
                for _ in 0..sizes {
                    r.read_compressed()?;
                }
                let bounds = r.read_compressed()?;
                for _ in 0..bounds {
                    r.read_compressed()?;
                }
                Ok(elem.map(|t| format!("{t}{}", array_suffix(rank))))
            }
            et::GENERICINST => {
                let kind = r.read_u8()?;
                if kind != et::CLASS && kind != et::VALUETYPE {
                    return Err(MetadataError::MalformedSignature(format!(
                        "generic instantiation of element type {kind:#04x}"
                    )));
                }
                let base = self.token_name(r.read_compressed()?, depth + 1)?;
                let count = r.read_compressed()? as usize;
                let mut args = Vec::with_capacity(count.min(r.remaining()));
                for _ in 0..count {
                    args.push(self.ty(r, depth + 1)?);
                }
                Ok(base.and_then(|base| {
                    let args = args.into_iter().collect::<Resolution<Vec<_>>>()?;
                    let rendered: Vec<String> = args.iter().map(|a| format!("[{a}]")).collect();
                    Ok(format!("{base}[{}]", rendered.join(",")))
                }))
            }
            et::FNPTR => {
                self.method_at(r, depth + 1)?;
                Ok(Err(unnamed("function pointer")))
            }
            et::CMOD_REQD | et::CMOD_OPT => {
                r.read_compressed()?;
                self.ty(r, depth + 1)
            }
            et::PINNED => self.ty(r, depth + 1),
            other => Err(MetadataError::MalformedSignature(format!(
                "unexpected element type {other:#04x}"
            ))),
        }
    }
}
