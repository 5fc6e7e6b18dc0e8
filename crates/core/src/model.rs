//! Normalized metadata model
//!
//! These are the records one scan produces. They are built fresh per request,
//! serialized, and dropped; nothing here is shared across requests.
//!
//! ## Wire Shape
//!
//! ```json
//! {"collection":[{"full_name":"Foo","short_name":"Foo",
//!   "fields":[{"ident":"x","ty_full_name":"Int32"}],
//!   "methods":[{"ident":"Bar","args":[{"ident":"y","ty_full_name":"String"}],
//!               "return_ty_full_name":"Boolean"}]}]}
//! ```
//!
//! Field declaration order below is the serialized key order.

use serde::{Deserialize, Serialize};

/// A named, typed value: a field or a method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IdentTy {
    /// Identifier of the field or parameter
    pub ident: String,
    /// Full name of the value's type
    pub ty_full_name: String,
}

impl IdentTy {
    /// Conceptual attribute names, in serialized order
    pub const ATTRIBUTES: &'static [&'static str] = &["Ident", "TyFullName"];

    /// Create a new typed identifier
    pub fn new(ident: impl Into<String>, ty_full_name: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            ty_full_name: ty_full_name.into(),
        }
    }
}

/// One method of an exported type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MethodRecord {
    /// Method name
    pub ident: String,
    /// Parameters in declaration order
    pub args: Vec<IdentTy>,
    /// Full name of the return type
    pub return_ty_full_name: String,
}

impl MethodRecord {
    /// Conceptual attribute names, in serialized order
    pub const ATTRIBUTES: &'static [&'static str] = &["Ident", "Args", "ReturnTyFullName"];
}

/// One exported type of a module.
///
/// `full_name` is the natural key within a single [`ScanResult`]. Uniqueness
/// across a module is assumed, not enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TypeRecord {
    /// Globally unique (within the module) type name
    pub full_name: String,
    /// Display name; serialized as `null` when absent
    pub short_name: Option<String>,
    /// Fields in enumeration order
    pub fields: Vec<IdentTy>,
    /// Methods in enumeration order
    pub methods: Vec<MethodRecord>,
}

impl TypeRecord {
    /// Conceptual attribute names, in serialized order
    pub const ATTRIBUTES: &'static [&'static str] = &["FullName", "ShortName", "Fields", "Methods"];

    /// Create an empty record for the given type name
    pub fn new(full_name: impl Into<String>, short_name: Option<String>) -> Self {
        Self {
            full_name: full_name.into(),
            short_name,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }
}

/// Everything one scan extracted from one module.
///
/// Order follows the introspector's enumeration order and is never sorted.
/// An empty scan still serializes the `collection` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScanResult {
    /// Extracted types
    pub collection: Vec<TypeRecord>,
}

impl ScanResult {
    /// Conceptual attribute names, in serialized order
    pub const ATTRIBUTES: &'static [&'static str] = &["Collection"];

    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, keeping enumeration order
    pub fn push(&mut self, record: TypeRecord) {
        self.collection.push(record);
    }

    /// Number of extracted types
    pub fn len(&self) -> usize {
        self.collection.len()
    }

    /// True when no type was extracted
    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Look up a record by full name (first match)
    pub fn find(&self, full_name: &str) -> Option<&TypeRecord> {
        self.collection.iter().find(|t| t.full_name == full_name)
    }

    /// Render the compact JSON document
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a JSON document produced by [`ScanResult::to_json`]
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
