//! Scan Service Test Suite
//!
//! Exercises the public facade end to end: one-shot scans, the persistent
//! service loop, load-context isolation and recycling, against both the
//! ECMA-335 introspector and an in-memory one.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test scan_service
//! cargo test --test scan_service isolation::
//! ```

use std::io::Write;
use std::sync::Arc;

use asminfo::metadata::{flags, ImageBuilder, SigType};
use asminfo::{
    IdentTy, Introspector, LoadContext, LoadedModule, MemberDescriptor, MethodDescriptor,
    NameKind, Resolution, ScanError, ScanResult, Scanner, TypeDescriptor, TypeRecord,
    Unresolvable,
};
use tempfile::NamedTempFile;

// Test modules
pub mod extraction;
pub mod isolation;
pub mod lifecycle;
pub mod properties;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Write `bytes` to a fresh temp file
pub fn module_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file
}

/// ECMA-335 image with `Shared.Widget { <field>: Int32 }`
pub fn widget_image(field: &str) -> Vec<u8> {
    let mut b = ImageBuilder::new("Widget.dll");
    b.begin_type("Shared", "Widget", flags::TYPE_PUBLIC);
    b.field(field, flags::MEMBER_PUBLIC, &SigType::Int32);
    b.build()
}

/// The canonical `Foo { x: Int32; Bar(y: String) -> Boolean }` record
pub fn foo_record() -> TypeRecord {
    let mut record = TypeRecord::new("Foo", Some("Foo".into()));
    record.fields.push(IdentTy::new("x", "Int32"));
    record.methods.push(asminfo::MethodRecord {
        ident: "Bar".into(),
        args: vec![IdentTy::new("y", "String")],
        return_ty_full_name: "Boolean".into(),
    });
    record
}

/// A module image for [`DocumentIntrospector`]
pub fn document_image(records: Vec<TypeRecord>) -> Vec<u8> {
    ScanResult { collection: records }.to_json().unwrap().into_bytes()
}

/// Scanner over [`DocumentIntrospector`] with a small context cap
pub fn document_scanner(cap: usize) -> Scanner {
    Scanner::builder()
        .introspector(Arc::new(DocumentIntrospector))
        .max_live_contexts(cap)
        .build()
        .unwrap()
}

// =============================================================================
// IN-MEMORY INTROSPECTOR
// =============================================================================

/// Reads images that are themselves scan documents.
///
/// Any name starting with `!` has no full name and fails to resolve.
pub struct DocumentIntrospector;

fn resolve(name: &str, kind: NameKind) -> Resolution<String> {
    if name.starts_with('!') {
        Err(Unresolvable::new(kind, format!("no full name for {name}")))
    } else {
        Ok(name.to_string())
    }
}

struct DocumentModule(ScanResult);

struct DocumentType<'a>(&'a TypeRecord);

struct DocumentMember<'a>(&'a IdentTy, NameKind);

struct DocumentMethod<'a>(&'a asminfo::MethodRecord);

impl Introspector for DocumentIntrospector {
    fn name(&self) -> &'static str {
        "document"
    }

    fn load<'ctx>(
        &self,
        context: &'ctx LoadContext,
    ) -> Result<Box<dyn LoadedModule + 'ctx>, ScanError> {
        let text = std::str::from_utf8(context.image())
            .map_err(|e| ScanError::load(context.path().display(), e.to_string()))?;
        let document = ScanResult::from_json(text)
            .map_err(|e| ScanError::load(context.path().display(), e.to_string()))?;
        Ok(Box::new(DocumentModule(document)))
    }
}

impl LoadedModule for DocumentModule {
    fn exported_types(&self) -> Vec<Box<dyn TypeDescriptor + '_>> {
        self.0
            .collection
            .iter()
            .map(|t| Box::new(DocumentType(t)) as Box<dyn TypeDescriptor + '_>)
            .collect()
    }
}

impl TypeDescriptor for DocumentType<'_> {
    fn full_name(&self) -> Resolution<String> {
        resolve(&self.0.full_name, NameKind::Type)
    }

    fn short_name(&self) -> Option<String> {
        self.0.short_name.clone()
    }

    fn fields(&self) -> Resolution<Vec<Box<dyn MemberDescriptor + '_>>> {
        Ok(self
            .0
            .fields
            .iter()
            .map(|f| Box::new(DocumentMember(f, NameKind::FieldType)) as Box<dyn MemberDescriptor + '_>)
            .collect())
    }

    fn methods(&self) -> Resolution<Vec<Box<dyn MethodDescriptor + '_>>> {
        Ok(self
            .0
            .methods
            .iter()
            .map(|m| Box::new(DocumentMethod(m)) as Box<dyn MethodDescriptor + '_>)
            .collect())
    }
}

impl MemberDescriptor for DocumentMember<'_> {
    fn ident(&self) -> Resolution<String> {
        Ok(self.0.ident.clone())
    }

    fn ty_full_name(&self) -> Resolution<String> {
        resolve(&self.0.ty_full_name, self.1)
    }
}

impl MethodDescriptor for DocumentMethod<'_> {
    fn ident(&self) -> Resolution<String> {
        Ok(self.0.ident.clone())
    }

    fn return_ty_full_name(&self) -> Resolution<String> {
        resolve(&self.0.return_ty_full_name, NameKind::ReturnType)
    }

    fn params(&self) -> Resolution<Vec<Box<dyn MemberDescriptor + '_>>> {
        Ok(self
            .0
            .args
            .iter()
            .map(|p| Box::new(DocumentMember(p, NameKind::ParameterType)) as Box<dyn MemberDescriptor + '_>)
            .collect())
    }
}
