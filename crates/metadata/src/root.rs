//! Metadata root and stream directory

use tracing::trace;

use crate::error::{MetadataError, Result};
use crate::heaps::{BlobHeap, StringHeap};
use crate::reader::ByteReader;
use crate::tables::Tables;

pub(crate) const METADATA_SIGNATURE: u32 = 0x424A_5342; // "BSJB"

/// The parsed streams of one module
#[derive(Debug, Clone)]
pub(crate) struct Metadata<'a> {
    pub(crate) version: &'a str,
    pub(crate) tables: Tables<'a>,
    pub(crate) strings: StringHeap<'a>,
    pub(crate) blobs: BlobHeap<'a>,
}

impl<'a> Metadata<'a> {
    pub(crate) fn parse(root: &'a [u8]) -> Result<Self> {
        let mut r = ByteReader::new(root);
        let signature = r.read_u32()?;
        if signature != METADATA_SIGNATURE {
            return Err(MetadataError::InvalidSignature(signature));
        }
        let _major = r.read_u16()?;
        let _minor = r.read_u16()?;
        let _reserved = r.read_u32()?;
        let version_len = r.read_u32()? as usize;
        let version_bytes = r.read_slice(version_len)?;
        let version_end = version_bytes
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(version_bytes.len());
        let version = std::str::from_utf8(&version_bytes[..version_end]).unwrap_or("");
        let _flags = r.read_u16()?;
        let stream_count = r.read_u16()?;

        let mut tables = None;
        let mut strings = StringHeap::default();
        let mut blobs = BlobHeap::default();
        for _ in 0..stream_count {
            let offset = r.read_u32()? as usize;
            let size = r.read_u32()? as usize;
            let name = r.read_padded_cstr()?;
            let data = ByteReader::at(root, offset)?.read_slice(size)?;
            trace!(
                stream = %String::from_utf8_lossy(name),
                offset,
                size,
                "metadata stream"
            );
            match name {
                // "#-" is the uncompressed (edit-and-continue) layout; its
                // header is compatible as long as no pointer tables are
                // missing, which the table reader handles.
                b"#~" | b"#-" => tables = Some(data),
                b"#Strings" => strings = StringHeap::new(data),
                b"#Blob" => blobs = BlobHeap::new(data),
                _ => {}
            }
        }

        let tables = tables.ok_or(MetadataError::MissingStream("#~"))?;
        Ok(Self {
            version,
            tables: Tables::parse(tables)?,
            strings,
            blobs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TableId;
    use crate::writer::ImageBuilder;

    fn root_of(image: &[u8]) -> &[u8] {
        let pe = crate::pe::PeImage::parse(image).unwrap();
        pe.metadata().unwrap()
    }

    #[test]
    fn test_parses_builder_output() {
        let image = ImageBuilder::new("Lib.dll").build();
        let md = Metadata::parse(root_of(&image)).unwrap();
        assert_eq!(md.version, "v4.0.30319");
        assert_eq!(md.tables.rows(TableId::Module), 1);
        // <Module> pseudo type
        assert_eq!(md.tables.rows(TableId::TypeDef), 1);
    }

    #[test]
    fn test_bad_signature() {
        let err = Metadata::parse(b"XXXX\0\0\0\0").unwrap_err();
        assert_eq!(err, MetadataError::InvalidSignature(u32::from_le_bytes(*b"XXXX")));
    }

    #[test]
    fn test_missing_tables_stream() {
        let mut root = Vec::new();
        root.extend_from_slice(&METADATA_SIGNATURE.to_le_bytes());
        root.extend_from_slice(&[1, 0, 1, 0, 0, 0, 0, 0]);
        root.extend_from_slice(&4u32.to_le_bytes());
        root.extend_from_slice(b"v4\0\0");
        root.extend_from_slice(&0u16.to_le_bytes());
        root.extend_from_slice(&0u16.to_le_bytes());
        assert_eq!(
            Metadata::parse(&root).unwrap_err(),
            MetadataError::MissingStream("#~")
        );
    }
}
