//! Errors raised while reading a CLI image

use thiserror::Error;

/// Structural problems with a module image
///
/// Any of these makes the image unloadable; the introspector maps them to
/// a module load failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// Read past the end of a buffer
    #[error("unexpected end of data at offset {offset} (needed {needed} bytes)")]
    UnexpectedEof {
        /// Offset of the failed read
        offset: usize,
        /// Bytes requested
        needed: usize,
    },

    /// Not a PE/COFF image
    #[error("not a PE image: {0}")]
    NotPe(String),

    /// PE image without a CLI header (native code only)
    #[error("image has no CLI header (not a managed module)")]
    NotManaged,

    /// RVA not covered by any section
    #[error("RVA {rva:#x} is not mapped by any section")]
    UnmappedRva {
        /// Offending relative virtual address
        rva: u32,
    },

    /// Bad metadata root signature
    #[error("invalid metadata signature {0:#010x}")]
    InvalidSignature(u32),

    /// A required metadata stream is missing
    #[error("missing metadata stream {0}")]
    MissingStream(&'static str),

    /// Table id outside the supported range
    #[error("unsupported metadata table {0:#04x}")]
    UnsupportedTable(u8),

    /// Row index out of range
    #[error("row {row} out of range for table {table} ({rows} rows)")]
    RowOutOfRange {
        /// Table name
        table: &'static str,
        /// Requested row (1-based)
        row: u32,
        /// Rows present
        rows: u32,
    },

    /// Heap index out of range
    #[error("{heap} heap index {index:#x} out of range")]
    HeapIndex {
        /// Heap name
        heap: &'static str,
        /// Offending index
        index: u32,
    },

    /// Invalid UTF-8 in the strings heap
    #[error("invalid UTF-8 in strings heap at {0:#x}")]
    InvalidUtf8(u32),

    /// Malformed compressed integer
    #[error("invalid compressed integer at offset {0}")]
    InvalidCompressed(usize),

    /// Signature blob that cannot be decoded
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
}

/// Result alias for metadata reads
pub type Result<T> = std::result::Result<T, MetadataError>;
