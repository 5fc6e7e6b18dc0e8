//! In-memory module writer
//!
//! Produces small, well-formed managed PE images: one `.text` section
//! holding the CLI header and the metadata root with `#~`, `#Strings`,
//! `#US`, `#GUID` and `#Blob` streams. No IL is emitted; the reader never
//! looks at method bodies.
//!
//! Types are built sequentially. Fields and methods attach to the type most
//! recently opened with [`ImageBuilder::begin_type`], which matches how the
//! TypeDef member runs are laid out on disk.
//!
//! ```
//! use asminfo_metadata::{flags, ImageBuilder, SigType};
//!
//! let mut builder = ImageBuilder::new("Shapes.dll");
//! builder.begin_type("Shapes", "Circle", flags::TYPE_PUBLIC);
//! builder.field("Radius", flags::MEMBER_PUBLIC, &SigType::Double);
//! let image = builder.build();
//! assert_eq!(&image[..2], b"MZ");
//! ```

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::flags;
use crate::reader::compress_u32;
use crate::root::METADATA_SIGNATURE;
use crate::signature::element as et;
use crate::tables::{
    CodedIndex, TableId, Widths, HEAP_BLOB_WIDE, HEAP_STRING_WIDE, TABLE_COUNT,
};

const FILE_ALIGNMENT: usize = 0x200;
const SECTION_ALIGNMENT: u32 = 0x2000;
const TEXT_RVA: u32 = 0x2000;
const CLI_HEADER_SIZE: u32 = 72;
const RUNTIME_VERSION: &[u8] = b"v4.0.30319";
const SORTED_TABLES: u64 = 0x0000_1600_3301_FA00;

/// Reference to a type row, usable inside signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeToken {
    table: TableId,
    row: u32,
}

impl TypeToken {
    /// Table holding the row
    pub fn table(&self) -> TableId {
        self.table
    }

    /// 1-based row
    pub fn row(&self) -> u32 {
        self.row
    }

    fn coded(self) -> u32 {
        CodedIndex::TypeDefOrRef
            .encode(self.table, self.row)
            .unwrap_or(0)
    }
}

/// A type as written into a signature blob
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SigType {
    Void,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    String,
    Object,
    IntPtr,
    UIntPtr,
    TypedReference,
    /// Reference type by token
    Class(TypeToken),
    /// Value type by token
    ValueType(TypeToken),
    /// Single-dimensional zero-based array
    SzArray(Box<SigType>),
    /// General array of the given rank
    Array(Box<SigType>, u32),
    ByRef(Box<SigType>),
    Ptr(Box<SigType>),
    /// Instantiation of a generic class
    GenericInst(TypeToken, Vec<SigType>),
    /// Generic type parameter `!n`
    Var(u32),
    /// Generic method parameter `!!n`
    MVar(u32),
    /// Function pointer: return type and parameters
    FnPtr(Box<SigType>, Vec<SigType>),
    /// Optional custom modifier applied to a type
    Modified(TypeToken, Box<SigType>),
}

impl SigType {
    /// `T[]`
    pub fn sz_array(elem: SigType) -> Self {
        SigType::SzArray(Box::new(elem))
    }

    /// `T&`
    pub fn by_ref(elem: SigType) -> Self {
        SigType::ByRef(Box::new(elem))
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            SigType::Void => out.push(et::VOID),
            SigType::Boolean => out.push(et::BOOLEAN),
            SigType::Char => out.push(et::CHAR),
            SigType::SByte => out.push(et::I1),
            SigType::Byte => out.push(et::U1),
            SigType::Int16 => out.push(et::I2),
            SigType::UInt16 => out.push(et::U2),
            SigType::Int32 => out.push(et::I4),
            SigType::UInt32 => out.push(et::U4),
            SigType::Int64 => out.push(et::I8),
            SigType::UInt64 => out.push(et::U8),
            SigType::Single => out.push(et::R4),
            SigType::Double => out.push(et::R8),
            SigType::String => out.push(et::STRING),
            SigType::Object => out.push(et::OBJECT),
            SigType::IntPtr => out.push(et::I),
            SigType::UIntPtr => out.push(et::U),
            SigType::TypedReference => out.push(et::TYPEDBYREF),
            SigType::Class(token) => {
                out.push(et::CLASS);
                compress_u32(token.coded(), out);
            }
            SigType::ValueType(token) => {
                out.push(et::VALUETYPE);
                compress_u32(token.coded(), out);
            }
            SigType::SzArray(elem) => {
                out.push(et::SZARRAY);
                elem.encode(out);
            }
            SigType::Array(elem, rank) => {
                out.push(et::ARRAY);
                elem.encode(out);
                compress_u32(*rank, out);
                compress_u32(0, out);
                compress_u32(0, out);
            }
            SigType::ByRef(elem) => {
                out.push(et::BYREF);
                elem.encode(out);
            }
            SigType::Ptr(elem) => {
                out.push(et::PTR);
                elem.encode(out);
            }
            SigType::GenericInst(base, args) => {
                out.push(et::GENERICINST);
                out.push(et::CLASS);
                compress_u32(base.coded(), out);
                compress_u32(args.len() as u32, out);
                for arg in args {
                    arg.encode(out);
                }
            }
            SigType::Var(n) => {
                out.push(et::VAR);
                compress_u32(*n, out);
            }
            SigType::MVar(n) => {
                out.push(et::MVAR);
                compress_u32(*n, out);
            }
            SigType::FnPtr(ret, params) => {
                out.push(et::FNPTR);
                out.push(0);
                compress_u32(params.len() as u32, out);
                ret.encode(out);
                for param in params {
                    param.encode(out);
                }
            }
            SigType::Modified(modifier, ty) => {
                out.push(et::CMOD_OPT);
                compress_u32(modifier.coded(), out);
                ty.encode(out);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct MethodRow {
    flags: u16,
    name: u32,
    signature: u32,
    /// (sequence, name) per named parameter
    params: Vec<(u32, u32)>,
}

/// Builder for managed PE images
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    pe32_plus: bool,
    pointer_tables: bool,
    strings: Vec<u8>,
    interned: HashMap<String, u32>,
    blobs: Vec<u8>,
    /// Rows of every table except Field, MethodDef, Param and the pointer
    /// tables, which are laid out at build time
    rows: Vec<Vec<Vec<u32>>>,
    fields: Vec<[u32; 3]>,
    methods: Vec<MethodRow>,
    assembly_ref: Option<u32>,
}

impl ImageBuilder {
    /// Start a module; the `<Module>` pseudo type is added automatically
    pub fn new(module_name: impl Into<String>) -> Self {
        let module_name = module_name.into();
        let mut builder = Self {
            pe32_plus: false,
            pointer_tables: false,
            strings: vec![0],
            interned: HashMap::new(),
            blobs: vec![0],
            rows: vec![Vec::new(); TABLE_COUNT],
            fields: Vec::new(),
            methods: Vec::new(),
            assembly_ref: None,
        };

        let name = builder.string(&module_name);
        builder.push_row(TableId::Module, vec![0, name, 1, 0, 0]);
        let assembly = module_name
            .strip_suffix(".dll")
            .or_else(|| module_name.strip_suffix(".exe"))
            .unwrap_or(module_name.as_str())
            .to_string();
        let assembly = builder.string(&assembly);
        builder.push_row(TableId::Assembly, vec![0x8004, 1, 0, 0, 0, 0, 0, assembly, 0]);
        builder.begin_type("", "<Module>", flags::TYPE_NOT_PUBLIC);
        builder
    }

    /// Emit a PE32+ (64-bit) optional header
    pub fn pe32_plus(mut self) -> Self {
        self.pe32_plus = true;
        self
    }

    /// Route field, method and parameter lists through FieldPtr, MethodPtr
    /// and ParamPtr, storing fields and methods in reverse physical order
    pub fn with_pointer_tables(mut self) -> Self {
        self.pointer_tables = true;
        self
    }

    fn string(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        if let Some(index) = self.interned.get(value) {
            return *index;
        }
        let index = self.strings.len() as u32;
        self.strings.extend_from_slice(value.as_bytes());
        self.strings.push(0);
        self.interned.insert(value.to_string(), index);
        index
    }

    fn blob(&mut self, bytes: &[u8]) -> u32 {
        let index = self.blobs.len() as u32;
        compress_u32(bytes.len() as u32, &mut self.blobs);
        self.blobs.extend_from_slice(bytes);
        index
    }

    fn push_row(&mut self, table: TableId, values: Vec<u32>) -> u32 {
        let rows = &mut self.rows[table as usize];
        rows.push(values);
        rows.len() as u32
    }

    fn scope(&mut self) -> u32 {
        let row = match self.assembly_ref {
            Some(row) => row,
            None => {
                let name = self.string("System.Runtime");
                let row = self.push_row(TableId::AssemblyRef, vec![4, 0, 0, 0, 0, 0, name, 0, 0]);
                self.assembly_ref = Some(row);
                row
            }
        };
        CodedIndex::ResolutionScope
            .encode(TableId::AssemblyRef, row)
            .unwrap_or(0)
    }

    /// Reference to a type defined in another assembly
    pub fn type_ref(&mut self, namespace: &str, name: &str) -> TypeToken {
        let scope = self.scope();
        let name = self.string(name);
        let namespace = self.string(namespace);
        let row = self.push_row(TableId::TypeRef, vec![scope, name, namespace]);
        TypeToken {
            table: TableId::TypeRef,
            row,
        }
    }

    /// Reference to a type nested inside another referenced type
    pub fn nested_type_ref(&mut self, outer: TypeToken, name: &str) -> TypeToken {
        let scope = CodedIndex::ResolutionScope
            .encode(TableId::TypeRef, outer.row)
            .unwrap_or(0);
        let name = self.string(name);
        let row = self.push_row(TableId::TypeRef, vec![scope, name, 0]);
        TypeToken {
            table: TableId::TypeRef,
            row,
        }
    }

    /// Constructed type (array, generic instantiation) usable as a token
    pub fn type_spec(&mut self, ty: &SigType) -> TypeToken {
        let mut sig = Vec::new();
        ty.encode(&mut sig);
        let blob = self.blob(&sig);
        let row = self.push_row(TableId::TypeSpec, vec![blob]);
        TypeToken {
            table: TableId::TypeSpec,
            row,
        }
    }

    /// Open a new type definition; subsequent members belong to it
    pub fn begin_type(&mut self, namespace: &str, name: &str, type_flags: u32) -> TypeToken {
        let name = self.string(name);
        let namespace = self.string(namespace);
        let field_list = self.fields.len() as u32 + 1;
        let method_list = self.methods.len() as u32 + 1;
        let row = self.push_row(
            TableId::TypeDef,
            vec![type_flags, name, namespace, 0, field_list, method_list],
        );
        TypeToken {
            table: TableId::TypeDef,
            row,
        }
    }

    /// Record `nested` as a member type of `enclosing`
    pub fn nest(&mut self, nested: TypeToken, enclosing: TypeToken) -> &mut Self {
        self.push_row(TableId::NestedClass, vec![nested.row, enclosing.row]);
        self
    }

    /// Add a field to the current type
    pub fn field(&mut self, name: &str, field_flags: u16, ty: &SigType) -> &mut Self {
        let name = self.string(name);
        let mut sig = vec![et::FIELD];
        ty.encode(&mut sig);
        let signature = self.blob(&sig);
        self.fields.push([u32::from(field_flags), name, signature]);
        self
    }

    /// Add a method to the current type
    ///
    /// Parameters with an empty name get no Param row.
    pub fn method(
        &mut self,
        name: &str,
        method_flags: u16,
        ret: &SigType,
        params: &[(&str, SigType)],
    ) -> &mut Self {
        let name = self.string(name);
        let mut sig = Vec::new();
        sig.push(if method_flags & flags::MEMBER_STATIC != 0 {
            0
        } else {
            et::HASTHIS
        });
        compress_u32(params.len() as u32, &mut sig);
        ret.encode(&mut sig);
        for (_, ty) in params {
            ty.encode(&mut sig);
        }
        let signature = self.blob(&sig);

        let mut named = Vec::new();
        for (i, (param, _)) in params.iter().enumerate() {
            if !param.is_empty() {
                named.push((i as u32 + 1, self.string(param)));
            }
        }
        self.methods.push(MethodRow {
            flags: method_flags,
            name,
            signature,
            params: named,
        });
        self
    }

    /// Serialize the image
    pub fn build(&self) -> Vec<u8> {
        let metadata = self.metadata_root();
        let text = self.text_section(&metadata);
        self.pe_file(&text)
    }

    fn tables(&self) -> Vec<Vec<Vec<u32>>> {
        let mut rows = self.rows.clone();

        let field_count = self.fields.len() as u32;
        let method_count = self.methods.len() as u32;
        let mut fields: Vec<&[u32; 3]> = self.fields.iter().collect();
        let mut methods: Vec<&MethodRow> = self.methods.iter().collect();
        if self.pointer_tables {
            fields.reverse();
            methods.reverse();
            for logical in 1..=field_count {
                rows[TableId::FieldPtr as usize].push(vec![field_count + 1 - logical]);
            }
            for logical in 1..=method_count {
                rows[TableId::MethodPtr as usize].push(vec![method_count + 1 - logical]);
            }
        }

        rows[TableId::Field as usize] = fields.iter().map(|f| f.to_vec()).collect();

        let mut params = Vec::new();
        for method in methods {
            let param_list = params.len() as u32 + 1;
            rows[TableId::MethodDef as usize].push(vec![
                0,
                0,
                u32::from(method.flags),
                method.name,
                method.signature,
                param_list,
            ]);
            for (sequence, name) in &method.params {
                params.push(vec![0, *sequence, *name]);
            }
        }
        if self.pointer_tables {
            for logical in 1..=params.len() as u32 {
                rows[TableId::ParamPtr as usize].push(vec![logical]);
            }
        }
        rows[TableId::Param as usize] = params;
        rows
    }

    fn heap_sizes(&self) -> u8 {
        let mut sizes = 0;
        if self.strings.len() >= 0x1_0000 {
            sizes |= HEAP_STRING_WIDE;
        }
        if self.blobs.len() >= 0x1_0000 {
            sizes |= HEAP_BLOB_WIDE;
        }
        sizes
    }

    fn table_stream(&self) -> Vec<u8> {
        let rows = self.tables();
        let heap_sizes = self.heap_sizes();
        let mut counts = [0u32; TABLE_COUNT];
        let mut valid = 0u64;
        for table in TableId::ALL {
            let count = rows[table as usize].len() as u32;
            counts[table as usize] = count;
            if count > 0 {
                valid |= 1 << table as u64;
            }
        }
        let widths = Widths::new(counts, heap_sizes);

        let mut out = Vec::new();
        put_u32(&mut out, 0);
        out.extend_from_slice(&[2, 0, heap_sizes, 1]);
        put_u64(&mut out, valid);
        put_u64(&mut out, SORTED_TABLES);
        for count in counts.iter().filter(|c| **c > 0) {
            put_u32(&mut out, *count);
        }
        for table in TableId::ALL {
            let schema = Widths::schema(table);
            for row in &rows[table as usize] {
                for (column, value) in schema.iter().zip(row) {
                    match widths.column(*column) {
                        2 => put_u16(&mut out, *value as u16),
                        _ => put_u32(&mut out, *value),
                    }
                }
            }
        }
        pad(&mut out, 4);
        out
    }

    fn metadata_root(&self) -> Vec<u8> {
        let mut strings = self.strings.clone();
        pad(&mut strings, 4);
        let mut blobs = self.blobs.clone();
        pad(&mut blobs, 4);
        let guid: Vec<u8> = (1..=16).collect();
        let user_strings = vec![0u8; 4];
        let tables_name: &[u8] = if self.pointer_tables { b"#-" } else { b"#~" };

        let streams: [(&[u8], Vec<u8>); 5] = [
            (tables_name, self.table_stream()),
            (&b"#Strings"[..], strings),
            (&b"#US"[..], user_strings),
            (&b"#GUID"[..], guid),
            (&b"#Blob"[..], blobs),
        ];

        let mut version = RUNTIME_VERSION.to_vec();
        version.push(0);
        pad(&mut version, 4);

        let directory_len: usize = streams
            .iter()
            .map(|(name, _)| 8 + ((name.len() + 1 + 3) & !3))
            .sum();
        let header_len = 16 + version.len() + 4 + directory_len;

        let mut out = Vec::new();
        put_u32(&mut out, METADATA_SIGNATURE);
        put_u16(&mut out, 1);
        put_u16(&mut out, 1);
        put_u32(&mut out, 0);
        put_u32(&mut out, version.len() as u32);
        out.extend_from_slice(&version);
        put_u16(&mut out, 0);
        put_u16(&mut out, streams.len() as u16);

        let mut offset = header_len;
        for (name, data) in &streams {
            put_u32(&mut out, offset as u32);
            put_u32(&mut out, data.len() as u32);
            out.extend_from_slice(name);
            out.push(0);
            pad(&mut out, 4);
            offset += data.len();
        }
        for (_, data) in &streams {
            out.extend_from_slice(data);
        }
        out
    }

    fn text_section(&self, metadata: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        put_u32(&mut out, CLI_HEADER_SIZE);
        put_u16(&mut out, 2);
        put_u16(&mut out, 5);
        put_u32(&mut out, TEXT_RVA + CLI_HEADER_SIZE);
        put_u32(&mut out, metadata.len() as u32);
        put_u32(&mut out, 1); // ILONLY
        put_u32(&mut out, 0);
        out.resize(CLI_HEADER_SIZE as usize, 0);
        out.extend_from_slice(metadata);
        out
    }

    fn pe_file(&self, text: &[u8]) -> Vec<u8> {
        let (machine, optional_size, characteristics) = if self.pe32_plus {
            (0x8664u16, 240usize, 0x2022u16)
        } else {
            (0x014C, 224, 0x2102)
        };
        let raw_size = align(text.len(), FILE_ALIGNMENT);

        let mut out = vec![0u8; 0x80];
        out[..2].copy_from_slice(b"MZ");
        LittleEndian::write_u32(&mut out[0x3C..0x40], 0x80);

        out.extend_from_slice(b"PE\0\0");
        put_u16(&mut out, machine);
        put_u16(&mut out, 1);
        put_u32(&mut out, 0);
        put_u32(&mut out, 0);
        put_u32(&mut out, 0);
        put_u16(&mut out, optional_size as u16);
        put_u16(&mut out, characteristics);

        let mut optional = vec![0u8; optional_size];
        let (count_offset, dirs_offset) = if self.pe32_plus {
            LittleEndian::write_u16(&mut optional[0..2], 0x20B);
            LittleEndian::write_u64(&mut optional[24..32], 0x1_8000_0000);
            (108, 112)
        } else {
            LittleEndian::write_u16(&mut optional[0..2], 0x10B);
            LittleEndian::write_u32(&mut optional[28..32], 0x1000_0000);
            (92, 96)
        };
        LittleEndian::write_u32(&mut optional[32..36], SECTION_ALIGNMENT);
        LittleEndian::write_u32(&mut optional[36..40], FILE_ALIGNMENT as u32);
        let image_size = TEXT_RVA + align(text.len(), SECTION_ALIGNMENT as usize) as u32;
        LittleEndian::write_u32(&mut optional[56..60], image_size);
        LittleEndian::write_u32(&mut optional[60..64], FILE_ALIGNMENT as u32);
        LittleEndian::write_u16(&mut optional[68..70], 3);
        LittleEndian::write_u32(&mut optional[count_offset..count_offset + 4], 16);
        let cli = dirs_offset + 14 * 8;
        LittleEndian::write_u32(&mut optional[cli..cli + 4], TEXT_RVA);
        LittleEndian::write_u32(&mut optional[cli + 4..cli + 8], CLI_HEADER_SIZE);
        out.extend_from_slice(&optional);

        out.extend_from_slice(b".text\0\0\0");
        put_u32(&mut out, text.len() as u32);
        put_u32(&mut out, TEXT_RVA);
        put_u32(&mut out, raw_size as u32);
        put_u32(&mut out, FILE_ALIGNMENT as u32);
        out.extend_from_slice(&[0u8; 12]);
        put_u32(&mut out, 0x6000_0020);

        out.resize(FILE_ALIGNMENT, 0);
        out.extend_from_slice(text);
        out.resize(FILE_ALIGNMENT + raw_size, 0);
        out
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, value);
    out.extend_from_slice(&buf);
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, value);
    out.extend_from_slice(&buf);
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, value);
    out.extend_from_slice(&buf);
}

fn align(len: usize, to: usize) -> usize {
    (len + to - 1) / to * to
}

fn pad(out: &mut Vec<u8>, to: usize) {
    out.resize(align(out.len(), to), 0);
}
