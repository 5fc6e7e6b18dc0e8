//! `#~` table stream
//!
//! The stream stores every table as a dense array of fixed-size rows. Row
//! size depends on the row counts of other tables and on the heap size flags,
//! so the whole layout has to be computed before any row can be read. The
//! schema below covers every table defined by ECMA-335 (0x00..=0x2C), even
//! the ones the introspector never reads: skipping a table still requires
//! knowing its size.

use crate::error::{MetadataError, Result};
use crate::reader::ByteReader;

/// Number of table ids defined by the standard
pub(crate) const TABLE_COUNT: usize = 0x2D;

/// Heap size flag bits
pub(crate) const HEAP_STRING_WIDE: u8 = 0x01;
pub(crate) const HEAP_GUID_WIDE: u8 = 0x02;
pub(crate) const HEAP_BLOB_WIDE: u8 = 0x04;
const HEAP_EXTRA_DATA: u8 = 0x40;

/// Metadata table ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRva = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOs = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOs = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// All tables in stream order
    pub const ALL: [TableId; TABLE_COUNT] = [
        TableId::Module,
        TableId::TypeRef,
        TableId::TypeDef,
        TableId::FieldPtr,
        TableId::Field,
        TableId::MethodPtr,
        TableId::MethodDef,
        TableId::ParamPtr,
        TableId::Param,
        TableId::InterfaceImpl,
        TableId::MemberRef,
        TableId::Constant,
        TableId::CustomAttribute,
        TableId::FieldMarshal,
        TableId::DeclSecurity,
        TableId::ClassLayout,
        TableId::FieldLayout,
        TableId::StandAloneSig,
        TableId::EventMap,
        TableId::EventPtr,
        TableId::Event,
        TableId::PropertyMap,
        TableId::PropertyPtr,
        TableId::Property,
        TableId::MethodSemantics,
        TableId::MethodImpl,
        TableId::ModuleRef,
        TableId::TypeSpec,
        TableId::ImplMap,
        TableId::FieldRva,
        TableId::EncLog,
        TableId::EncMap,
        TableId::Assembly,
        TableId::AssemblyProcessor,
        TableId::AssemblyOs,
        TableId::AssemblyRef,
        TableId::AssemblyRefProcessor,
        TableId::AssemblyRefOs,
        TableId::File,
        TableId::ExportedType,
        TableId::ManifestResource,
        TableId::NestedClass,
        TableId::GenericParam,
        TableId::MethodSpec,
        TableId::GenericParamConstraint,
    ];

    /// Table for a raw id
    pub fn from_u8(id: u8) -> Option<TableId> {
        Self::ALL.get(id as usize).copied()
    }

    /// Table name as used in the standard
    pub fn name(self) -> &'static str {
        match self {
            TableId::Module => "Module",
            TableId::TypeRef => "TypeRef",
            TableId::TypeDef => "TypeDef",
            TableId::FieldPtr => "FieldPtr",
            TableId::Field => "Field",
            TableId::MethodPtr => "MethodPtr",
            TableId::MethodDef => "MethodDef",
            TableId::ParamPtr => "ParamPtr",
            TableId::Param => "Param",
            TableId::InterfaceImpl => "InterfaceImpl",
            TableId::MemberRef => "MemberRef",
            TableId::Constant => "Constant",
            TableId::CustomAttribute => "CustomAttribute",
            TableId::FieldMarshal => "FieldMarshal",
            TableId::DeclSecurity => "DeclSecurity",
            TableId::ClassLayout => "ClassLayout",
            TableId::FieldLayout => "FieldLayout",
            TableId::StandAloneSig => "StandAloneSig",
            TableId::EventMap => "EventMap",
            TableId::EventPtr => "EventPtr",
            TableId::Event => "Event",
            TableId::PropertyMap => "PropertyMap",
            TableId::PropertyPtr => "PropertyPtr",
            TableId::Property => "Property",
            TableId::MethodSemantics => "MethodSemantics",
            TableId::MethodImpl => "MethodImpl",
            TableId::ModuleRef => "ModuleRef",
            TableId::TypeSpec => "TypeSpec",
            TableId::ImplMap => "ImplMap",
            TableId::FieldRva => "FieldRVA",
            TableId::EncLog => "EncLog",
            TableId::EncMap => "EncMap",
            TableId::Assembly => "Assembly",
            TableId::AssemblyProcessor => "AssemblyProcessor",
            TableId::AssemblyOs => "AssemblyOS",
            TableId::AssemblyRef => "AssemblyRef",
            TableId::AssemblyRefProcessor => "AssemblyRefProcessor",
            TableId::AssemblyRefOs => "AssemblyRefOS",
            TableId::File => "File",
            TableId::ExportedType => "ExportedType",
            TableId::ManifestResource => "ManifestResource",
            TableId::NestedClass => "NestedClass",
            TableId::GenericParam => "GenericParam",
            TableId::MethodSpec => "MethodSpec",
            TableId::GenericParamConstraint => "GenericParamConstraint",
        }
    }

    fn schema(self) -> &'static [Column] {
        use CodedIndex as C;
        use Column::*;
        use TableId as T;
        match self {
            T::Module => &[U16, Str, Guid, Guid, Guid],
            T::TypeRef => &[Coded(C::ResolutionScope), Str, Str],
            T::TypeDef => &[
                U32,
                Str,
                Str,
                Coded(C::TypeDefOrRef),
                Index(T::Field),
                Index(T::MethodDef),
            ],
            T::FieldPtr => &[Index(T::Field)],
            T::Field => &[U16, Str, Blob],
            T::MethodPtr => &[Index(T::MethodDef)],
            T::MethodDef => &[U32, U16, U16, Str, Blob, Index(T::Param)],
            T::ParamPtr => &[Index(T::Param)],
            T::Param => &[U16, U16, Str],
            T::InterfaceImpl => &[Index(T::TypeDef), Coded(C::TypeDefOrRef)],
            T::MemberRef => &[Coded(C::MemberRefParent), Str, Blob],
            T::Constant => &[U16, Coded(C::HasConstant), Blob],
            T::CustomAttribute => &[
                Coded(C::HasCustomAttribute),
                Coded(C::CustomAttributeType),
                Blob,
            ],
            T::FieldMarshal => &[Coded(C::HasFieldMarshal), Blob],
            T::DeclSecurity => &[U16, Coded(C::HasDeclSecurity), Blob],
            T::ClassLayout => &[U16, U32, Index(T::TypeDef)],
            T::FieldLayout => &[U32, Index(T::Field)],
            T::StandAloneSig => &[Blob],
            T::EventMap => &[Index(T::TypeDef), Index(T::Event)],
            T::EventPtr => &[Index(T::Event)],
            T::Event => &[U16, Str, Coded(C::TypeDefOrRef)],
            T::PropertyMap => &[Index(T::TypeDef), Index(T::Property)],
            T::PropertyPtr => &[Index(T::Property)],
            T::Property => &[U16, Str, Blob],
            T::MethodSemantics => &[U16, Index(T::MethodDef), Coded(C::HasSemantics)],
            T::MethodImpl => &[
                Index(T::TypeDef),
                Coded(C::MethodDefOrRef),
                Coded(C::MethodDefOrRef),
            ],
            T::ModuleRef => &[Str],
            T::TypeSpec => &[Blob],
            T::ImplMap => &[U16, Coded(C::MemberForwarded), Str, Index(T::ModuleRef)],
            T::FieldRva => &[U32, Index(T::Field)],
            T::EncLog => &[U32, U32],
            T::EncMap => &[U32],
            T::Assembly => &[U32, U16, U16, U16, U16, U32, Blob, Str, Str],
            T::AssemblyProcessor => &[U32],
            T::AssemblyOs => &[U32, U32, U32],
            T::AssemblyRef => &[U16, U16, U16, U16, U32, Blob, Str, Str, Blob],
            T::AssemblyRefProcessor => &[U32, Index(T::AssemblyRef)],
            T::AssemblyRefOs => &[U32, U32, U32, Index(T::AssemblyRef)],
            T::File => &[U32, Str, Blob],
            T::ExportedType => &[U32, U32, Str, Str, Coded(C::Implementation)],
            T::ManifestResource => &[U32, U32, Str, Coded(C::Implementation)],
            T::NestedClass => &[Index(T::TypeDef), Index(T::TypeDef)],
            T::GenericParam => &[U16, U16, Coded(C::TypeOrMethodDef), Str],
            T::MethodSpec => &[Coded(C::MethodDefOrRef), Blob],
            T::GenericParamConstraint => &[Index(T::GenericParam), Coded(C::TypeDefOrRef)],
        }
    }
}

/// Column kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Column {
    U16,
    U32,
    Str,
    Guid,
    Blob,
    Index(TableId),
    Coded(CodedIndex),
}

/// Coded index kinds (II.24.2.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodedIndex {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl CodedIndex {
    fn tag_bits(self) -> u32 {
        match self {
            CodedIndex::HasFieldMarshal
            | CodedIndex::HasSemantics
            | CodedIndex::MethodDefOrRef
            | CodedIndex::MemberForwarded
            | CodedIndex::TypeOrMethodDef => 1,
            CodedIndex::TypeDefOrRef
            | CodedIndex::HasConstant
            | CodedIndex::HasDeclSecurity
            | CodedIndex::Implementation
            | CodedIndex::ResolutionScope => 2,
            CodedIndex::MemberRefParent | CodedIndex::CustomAttributeType => 3,
            CodedIndex::HasCustomAttribute => 5,
        }
    }

    fn tables(self) -> &'static [Option<TableId>] {
        use TableId as T;
        match self {
            CodedIndex::TypeDefOrRef => &[Some(T::TypeDef), Some(T::TypeRef), Some(T::TypeSpec)],
            CodedIndex::HasConstant => &[Some(T::Field), Some(T::Param), Some(T::Property)],
            CodedIndex::HasCustomAttribute => &[
                Some(T::MethodDef),
                Some(T::Field),
                Some(T::TypeRef),
                Some(T::TypeDef),
                Some(T::Param),
                Some(T::InterfaceImpl),
                Some(T::MemberRef),
                Some(T::Module),
                Some(T::DeclSecurity),
                Some(T::Property),
                Some(T::Event),
                Some(T::StandAloneSig),
                Some(T::ModuleRef),
                Some(T::TypeSpec),
                Some(T::Assembly),
                Some(T::AssemblyRef),
                Some(T::File),
                Some(T::ExportedType),
                Some(T::ManifestResource),
                Some(T::GenericParam),
                Some(T::GenericParamConstraint),
                Some(T::MethodSpec),
            ],
            CodedIndex::HasFieldMarshal => &[Some(T::Field), Some(T::Param)],
            CodedIndex::HasDeclSecurity => &[Some(T::TypeDef), Some(T::MethodDef), Some(T::Assembly)],
            CodedIndex::MemberRefParent => &[
                Some(T::TypeDef),
                Some(T::TypeRef),
                Some(T::ModuleRef),
                Some(T::MethodDef),
                Some(T::TypeSpec),
            ],
            CodedIndex::HasSemantics => &[Some(T::Event), Some(T::Property)],
            CodedIndex::MethodDefOrRef => &[Some(T::MethodDef), Some(T::MemberRef)],
            CodedIndex::MemberForwarded => &[Some(T::Field), Some(T::MethodDef)],
            CodedIndex::Implementation => &[Some(T::File), Some(T::AssemblyRef), Some(T::ExportedType)],
            CodedIndex::CustomAttributeType => &[None, None, Some(T::MethodDef), Some(T::MemberRef), None],
            CodedIndex::ResolutionScope => &[
                Some(T::Module),
                Some(T::ModuleRef),
                Some(T::AssemblyRef),
                Some(T::TypeRef),
            ],
            CodedIndex::TypeOrMethodDef => &[Some(T::TypeDef), Some(T::MethodDef)],
        }
    }

    /// Split a raw coded value into its table and 1-based row
    pub(crate) fn decode(self, raw: u32) -> Option<(TableId, u32)> {
        let bits = self.tag_bits();
        let tag = (raw & ((1 << bits) - 1)) as usize;
        let table = self.tables().get(tag).copied().flatten()?;
        Some((table, raw >> bits))
    }

    /// Combine a table and row into a raw coded value
    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn encode(self, table: TableId, row: u32) -> Option<u32> {
        let tag = self.tables().iter().position(|t| *t == Some(table))? as u32;
        Some((row << self.tag_bits()) | tag)
    }
}

/// Index widths derived from row counts and heap flags
#[derive(Debug, Clone)]
pub(crate) struct Widths {
    rows: [u32; TABLE_COUNT],
    heap_sizes: u8,
}

impl Widths {
    pub(crate) fn new(rows: [u32; TABLE_COUNT], heap_sizes: u8) -> Self {
        Self { rows, heap_sizes }
    }

    pub(crate) fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize]
    }

    pub(crate) fn column(&self, column: Column) -> usize {
        let heap = |flag: u8| if self.heap_sizes & flag != 0 { 4 } else { 2 };
        match column {
            Column::U16 => 2,
            Column::U32 => 4,
            Column::Str => heap(HEAP_STRING_WIDE),
            Column::Guid => heap(HEAP_GUID_WIDE),
            Column::Blob => heap(HEAP_BLOB_WIDE),
            Column::Index(table) => {
                if self.rows(table) < 0x1_0000 {
                    2
                } else {
                    4
                }
            }
            Column::Coded(coded) => {
                let max = coded
                    .tables()
                    .iter()
                    .flatten()
                    .map(|t| self.rows(*t))
                    .max()
                    .unwrap_or(0);
                if max < (1 << (16 - coded.tag_bits())) {
                    2
                } else {
                    4
                }
            }
        }
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn schema(table: TableId) -> &'static [Column] {
        table.schema()
    }

    pub(crate) fn row_size(&self, table: TableId) -> usize {
        table.schema().iter().map(|c| self.column(*c)).sum()
    }
}

#[derive(Debug, Clone, Default)]
struct TableLayout<'a> {
    rows: u32,
    row_size: usize,
    offsets: Vec<(usize, usize)>,
    data: &'a [u8],
}

/// All tables of one module
#[derive(Debug, Clone)]
pub(crate) struct Tables<'a> {
    layouts: Vec<TableLayout<'a>>,
}

impl<'a> Tables<'a> {
    pub(crate) fn parse(stream: &'a [u8]) -> Result<Self> {
        let mut r = ByteReader::new(stream);
        let _reserved = r.read_u32()?;
        let _major = r.read_u8()?;
        let _minor = r.read_u8()?;
        let heap_sizes = r.read_u8()?;
        let _reserved = r.read_u8()?;
        let valid = r.read_u64()?;
        let _sorted = r.read_u64()?;

        let mut rows = [0u32; TABLE_COUNT];
        for bit in 0..64u8 {
            if valid & (1 << bit) == 0 {
                continue;
            }
            if bit as usize >= TABLE_COUNT {
                return Err(MetadataError::UnsupportedTable(bit));
            }
            rows[bit as usize] = r.read_u32()?;
        }
        if heap_sizes & HEAP_EXTRA_DATA != 0 {
            r.skip(4)?;
        }

        let widths = Widths::new(rows, heap_sizes);
        let mut layouts = Vec::with_capacity(TABLE_COUNT);
        for table in TableId::ALL {
            let mut offsets = Vec::with_capacity(table.schema().len());
            let mut offset = 0;
            for column in table.schema() {
                let width = widths.column(*column);
                offsets.push((offset, width));
                offset += width;
            }
            let count = widths.rows(table);
            let len = offset
                .checked_mul(count as usize)
                .ok_or(MetadataError::UnexpectedEof {
                    offset: r.position(),
                    needed: usize::MAX,
                })?;
            let data = r.read_slice(len)?;
            layouts.push(TableLayout {
                rows: count,
                row_size: offset,
                offsets,
                data,
            });
        }

        Ok(Self { layouts })
    }

    pub(crate) fn rows(&self, table: TableId) -> u32 {
        self.layouts[table as usize].rows
    }

    /// 1-based row access
    pub(crate) fn row(&self, table: TableId, row: u32) -> Result<Row<'_, 'a>> {
        let layout = &self.layouts[table as usize];
        if row == 0 || row > layout.rows {
            return Err(MetadataError::RowOutOfRange {
                table: table.name(),
                row,
                rows: layout.rows,
            });
        }
        let start = (row as usize - 1) * layout.row_size;
        Ok(Row {
            layout,
            bytes: &layout.data[start..start + layout.row_size],
        })
    }
}

/// One table row
#[derive(Debug, Clone, Copy)]
pub(crate) struct Row<'t, 'a> {
    layout: &'t TableLayout<'a>,
    bytes: &'a [u8],
}

impl Row<'_, '_> {
    /// Raw value of column `col`, zero-extended
    pub(crate) fn get(&self, col: usize) -> u32 {
        let Some(&(offset, width)) = self.layout.offsets.get(col) else {
            return 0;
        };
        let mut r = ByteReader::new(&self.bytes[offset..offset + width]);
        r.read_index(width).unwrap_or(0)
    }
}

/// Column positions of the tables the introspector reads
pub(crate) mod col {
    pub(crate) const TYPE_REF_SCOPE: usize = 0;
    pub(crate) const TYPE_REF_NAME: usize = 1;
    pub(crate) const TYPE_REF_NAMESPACE: usize = 2;

    pub(crate) const TYPE_DEF_FLAGS: usize = 0;
    pub(crate) const TYPE_DEF_NAME: usize = 1;
    pub(crate) const TYPE_DEF_NAMESPACE: usize = 2;
    pub(crate) const TYPE_DEF_FIELD_LIST: usize = 4;
    pub(crate) const TYPE_DEF_METHOD_LIST: usize = 5;

    pub(crate) const FIELD_FLAGS: usize = 0;
    pub(crate) const FIELD_NAME: usize = 1;
    pub(crate) const FIELD_SIGNATURE: usize = 2;

    pub(crate) const METHOD_FLAGS: usize = 2;
    pub(crate) const METHOD_NAME: usize = 3;
    pub(crate) const METHOD_SIGNATURE: usize = 4;
    pub(crate) const METHOD_PARAM_LIST: usize = 5;

    pub(crate) const PARAM_SEQUENCE: usize = 1;
    pub(crate) const PARAM_NAME: usize = 2;

    pub(crate) const NESTED_CLASS_NESTED: usize = 0;
    pub(crate) const NESTED_CLASS_ENCLOSING: usize = 1;

    pub(crate) const TYPE_SPEC_SIGNATURE: usize = 0;

    /// FieldPtr, MethodPtr, ParamPtr
    pub(crate) const PTR_TARGET: usize = 0;
}
