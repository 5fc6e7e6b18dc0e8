//! Module view over a parsed image
//!
//! [`ClrModule`] is what the introspector hands back for one load context.
//! Type, field and method descriptors are thin `(module, row)` handles; all
//! name resolution happens lazily when the extractor asks for it.

use std::collections::HashMap;

use asminfo_core::{
    LoadedModule, MemberDescriptor, MethodDescriptor, NameKind, Resolution, TypeDescriptor,
    Unresolvable,
};
use tracing::debug;

use crate::error::Result;
use crate::flags;
use crate::pe::PeImage;
use crate::root::Metadata;
use crate::signature::{settle, MethodSig, SigDecoder};
use crate::tables::{col, TableId};

/// Maximum enclosing-type chain followed when checking visibility
const MAX_NESTING: usize = 64;

/// A managed module loaded from one image
#[derive(Debug)]
pub struct ClrModule<'a> {
    meta: Metadata<'a>,
    /// nested TypeDef row → enclosing TypeDef row
    enclosing: HashMap<u32, u32>,
}

impl<'a> ClrModule<'a> {
    /// Parse a PE image carrying CLI metadata
    pub fn parse(image: &'a [u8]) -> Result<Self> {
        let pe = PeImage::parse(image)?;
        let meta = Metadata::parse(pe.metadata()?)?;

        let mut enclosing = HashMap::new();
        for row in 1..=meta.tables.rows(TableId::NestedClass) {
            let nested = meta.tables.row(TableId::NestedClass, row)?;
            enclosing.insert(
                nested.get(col::NESTED_CLASS_NESTED),
                nested.get(col::NESTED_CLASS_ENCLOSING),
            );
        }

        debug!(
            runtime = meta.version,
            types = meta.tables.rows(TableId::TypeDef),
            nested = enclosing.len(),
            "parsed CLI module"
        );

        Ok(Self { meta, enclosing })
    }

    /// Runtime version string from the metadata root
    pub fn runtime_version(&self) -> &'a str {
        self.meta.version
    }

    /// Number of TypeDef rows, including non-exported ones
    pub fn type_count(&self) -> u32 {
        self.meta.tables.rows(TableId::TypeDef)
    }

    fn decoder(&self) -> SigDecoder<'_, 'a> {
        SigDecoder::new(&self.meta, &self.enclosing)
    }

    fn type_flags(&self, row: u32) -> Option<u32> {
        self.meta
            .tables
            .row(TableId::TypeDef, row)
            .ok()
            .map(|def| def.get(col::TYPE_DEF_FLAGS))
    }

    /// Public, or nested-public all the way up to a public type
    fn is_exported(&self, row: u32) -> bool {
        let mut current = row;
        for _ in 0..MAX_NESTING {
            let Some(attrs) = self.type_flags(current) else {
                return false;
            };
            match attrs & flags::TYPE_VISIBILITY_MASK {
                flags::TYPE_PUBLIC => return !self.enclosing.contains_key(&current),
                flags::TYPE_NESTED_PUBLIC => match self.enclosing.get(&current) {
                    Some(outer) => current = *outer,
                    None => return false,
                },
                _ => return false,
            }
        }
        false
    }

    /// Exported TypeDef rows in table order
    pub fn exported_rows(&self) -> Vec<u32> {
        (1..=self.type_count())
            .filter(|row| self.is_exported(*row))
            .collect()
    }

    /// Physical rows of `list` owned by `owner_row` of `owner`
    ///
    /// Owner rows store the first index of a run that ends where the next
    /// owner row's run starts. When the pointer table is populated, the run
    /// indexes the pointer table, which maps to physical rows.
    fn member_rows(
        &self,
        owner: TableId,
        owner_row: u32,
        list_col: usize,
        list: TableId,
        ptr: TableId,
    ) -> Result<Vec<u32>> {
        let tables = &self.meta.tables;
        let indirect = tables.rows(ptr) > 0;
        let logical_rows = if indirect {
            tables.rows(ptr)
        } else {
            tables.rows(list)
        };

        let start = tables.row(owner, owner_row)?.get(list_col).max(1);
        let end = if owner_row < tables.rows(owner) {
            tables.row(owner, owner_row + 1)?.get(list_col)
        } else {
            logical_rows + 1
        };
        let end = end.min(logical_rows + 1);
        if start >= end {
            return Ok(Vec::new());
        }

        (start..end)
            .map(|logical| {
                if indirect {
                    Ok(tables.row(ptr, logical)?.get(col::PTR_TARGET))
                } else {
                    Ok(logical)
                }
            })
            .collect()
    }

    fn string(&self, index: u32) -> Result<&'a str> {
        self.meta.strings.get(index)
    }
}

impl LoadedModule for ClrModule<'_> {
    fn exported_types(&self) -> Vec<Box<dyn TypeDescriptor + '_>> {
        self.exported_rows()
            .into_iter()
            .map(|row| Box::new(ClrType { module: self, row }) as Box<dyn TypeDescriptor + '_>)
            .collect()
    }
}

fn malformed(kind: NameKind, err: impl std::fmt::Display) -> Unresolvable {
    Unresolvable::new(kind, err.to_string())
}

struct ClrType<'m, 'a> {
    module: &'m ClrModule<'a>,
    row: u32,
}

impl TypeDescriptor for ClrType<'_, '_> {
    fn full_name(&self) -> Resolution<String> {
        settle(self.module.decoder().type_def_name(self.row), NameKind::Type)
    }

    fn short_name(&self) -> Option<String> {
        let def = self.module.meta.tables.row(TableId::TypeDef, self.row).ok()?;
        self.module
            .string(def.get(col::TYPE_DEF_NAME))
            .ok()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    fn fields(&self) -> Resolution<Vec<Box<dyn MemberDescriptor + '_>>> {
        let module = self.module;
        let rows = module
            .member_rows(
                TableId::TypeDef,
                self.row,
                col::TYPE_DEF_FIELD_LIST,
                TableId::Field,
                TableId::FieldPtr,
            )
            .map_err(|e| malformed(NameKind::Field, e))?;

        let mut fields: Vec<Box<dyn MemberDescriptor + '_>> = Vec::new();
        for row in rows {
            let field = module
                .meta
                .tables
                .row(TableId::Field, row)
                .map_err(|e| malformed(NameKind::Field, e))?;
            if flags::is_public_member(field.get(col::FIELD_FLAGS) as u16) {
                fields.push(Box::new(ClrField { module, row }));
            }
        }
        Ok(fields)
    }

    fn methods(&self) -> Resolution<Vec<Box<dyn MethodDescriptor + '_>>> {
        let module = self.module;
        let rows = module
            .member_rows(
                TableId::TypeDef,
                self.row,
                col::TYPE_DEF_METHOD_LIST,
                TableId::MethodDef,
                TableId::MethodPtr,
            )
            .map_err(|e| malformed(NameKind::Method, e))?;

        let mut methods: Vec<Box<dyn MethodDescriptor + '_>> = Vec::new();
        for row in rows {
            let method = module
                .meta
                .tables
                .row(TableId::MethodDef, row)
                .map_err(|e| malformed(NameKind::Method, e))?;
            if !flags::is_public_member(method.get(col::METHOD_FLAGS) as u16) {
                continue;
            }
            let name = module
                .string(method.get(col::METHOD_NAME))
                .map_err(|e| malformed(NameKind::Method, e))?;
            if name == flags::CONSTRUCTOR || name == flags::TYPE_INITIALIZER {
                continue;
            }
            methods.push(Box::new(ClrMethod { module, row }));
        }
        Ok(methods)
    }
}

struct ClrField<'m, 'a> {
    module: &'m ClrModule<'a>,
    row: u32,
}

impl MemberDescriptor for ClrField<'_, '_> {
    fn ident(&self) -> Resolution<String> {
        let field = self
            .module
            .meta
            .tables
            .row(TableId::Field, self.row)
            .map_err(|e| malformed(NameKind::Field, e))?;
        match self.module.string(field.get(col::FIELD_NAME)) {
            Ok("") => Err(Unresolvable::new(
                NameKind::Field,
                format!("Field row {} has no name", self.row),
            )),
            Ok(name) => Ok(name.to_string()),
            Err(e) => Err(malformed(NameKind::Field, e)),
        }
    }

    fn ty_full_name(&self) -> Resolution<String> {
        let module = self.module;
        let decoded = module
            .meta
            .tables
            .row(TableId::Field, self.row)
            .and_then(|field| module.meta.blobs.get(field.get(col::FIELD_SIGNATURE)))
            .and_then(|blob| module.decoder().field(blob));
        settle(decoded, NameKind::FieldType)
    }
}

struct ClrMethod<'m, 'a> {
    module: &'m ClrModule<'a>,
    row: u32,
}

impl ClrMethod<'_, '_> {
    fn signature(&self, kind: NameKind) -> Resolution<MethodSig> {
        let module = self.module;
        module
            .meta
            .tables
            .row(TableId::MethodDef, self.row)
            .and_then(|method| module.meta.blobs.get(method.get(col::METHOD_SIGNATURE)))
            .and_then(|blob| module.decoder().method(blob))
            .map_err(|e| malformed(kind, e))
    }

    /// Parameter names by position; sequence 0 names the return value
    fn param_names(&self, count: usize) -> Result<Vec<String>> {
        let module = self.module;
        let rows = module.member_rows(
            TableId::MethodDef,
            self.row,
            col::METHOD_PARAM_LIST,
            TableId::Param,
            TableId::ParamPtr,
        )?;
        let mut names = vec![String::new(); count];
        for row in rows {
            let param = module.meta.tables.row(TableId::Param, row)?;
            let sequence = param.get(col::PARAM_SEQUENCE) as usize;
            if sequence == 0 || sequence > count {
                continue;
            }
            names[sequence - 1] = module.string(param.get(col::PARAM_NAME))?.to_string();
        }
        Ok(names)
    }
}

impl MethodDescriptor for ClrMethod<'_, '_> {
    fn ident(&self) -> Resolution<String> {
        let method = self
            .module
            .meta
            .tables
            .row(TableId::MethodDef, self.row)
            .map_err(|e| malformed(NameKind::Method, e))?;
        match self.module.string(method.get(col::METHOD_NAME)) {
            Ok("") => Err(Unresolvable::new(
                NameKind::Method,
                format!("MethodDef row {} has no name", self.row),
            )),
            Ok(name) => Ok(name.to_string()),
            Err(e) => Err(malformed(NameKind::Method, e)),
        }
    }

    fn return_ty_full_name(&self) -> Resolution<String> {
        self.signature(NameKind::ReturnType)?
            .ret
            .map_err(|u| u.as_kind(NameKind::ReturnType))
    }

    fn params(&self) -> Resolution<Vec<Box<dyn MemberDescriptor + '_>>> {
        let sig = self.signature(NameKind::ParameterType)?;
        let names = self
            .param_names(sig.params.len())
            .map_err(|e| malformed(NameKind::Parameter, e))?;
        Ok(names
            .into_iter()
            .zip(sig.params)
            .map(|(ident, ty)| Box::new(ClrParam { ident, ty }) as Box<dyn MemberDescriptor + '_>)
            .collect())
    }
}

struct ClrParam {
    ident: String,
    ty: Resolution<String>,
}

impl MemberDescriptor for ClrParam {
    fn ident(&self) -> Resolution<String> {
        Ok(self.ident.clone())
    }

    fn ty_full_name(&self) -> Resolution<String> {
        self.ty
            .clone()
            .map_err(|u| u.as_kind(NameKind::ParameterType))
    }
}
