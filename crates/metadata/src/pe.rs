//! PE/COFF container
//!
//! Only what is needed to find the CLI metadata: DOS stub → PE signature →
//! COFF header → optional header data directories → section table. Both
//! PE32 and PE32+ optional headers are accepted.

use tracing::trace;

use crate::error::{MetadataError, Result};
use crate::reader::ByteReader;

const DOS_MAGIC: u16 = 0x5A4D; // "MZ"
const PE_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"
const PE32_MAGIC: u16 = 0x10B;
const PE32_PLUS_MAGIC: u16 = 0x20B;
const CLI_HEADER_DIRECTORY: usize = 14;
const SECTION_HEADER_SIZE: usize = 40;

#[derive(Debug, Clone, Copy)]
struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_pointer: u32,
    raw_size: u32,
}

impl Section {
    fn contains(&self, rva: u32) -> bool {
        let span = self.virtual_size.max(self.raw_size);
        rva >= self.virtual_address && rva - self.virtual_address < span
    }
}

/// A parsed PE image borrowing the file bytes
#[derive(Debug)]
pub(crate) struct PeImage<'a> {
    data: &'a [u8],
    sections: Vec<Section>,
    cli_rva: u32,
    cli_size: u32,
}

impl<'a> PeImage<'a> {
    pub(crate) fn parse(data: &'a [u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        if r.read_u16().ok() != Some(DOS_MAGIC) {
            return Err(MetadataError::NotPe("missing MZ signature".into()));
        }

        let mut r = ByteReader::at(data, 0x3C)?;
        let pe_offset = r.read_u32()? as usize;

        let mut r = ByteReader::at(data, pe_offset)
            .map_err(|_| MetadataError::NotPe(format!("PE header offset {pe_offset:#x} past end")))?;
        if r.read_u32()? != PE_SIGNATURE {
            return Err(MetadataError::NotPe("missing PE signature".into()));
        }

        // COFF file header
        let _machine = r.read_u16()?;
        let section_count = r.read_u16()? as usize;
        r.skip(12)?;
        let optional_size = r.read_u16()? as usize;
        let _characteristics = r.read_u16()?;

        let optional_start = r.position();
        let optional = r.read_slice(optional_size)?;
        let mut o = ByteReader::new(optional);
        let (count_offset, dirs_offset) = match o.read_u16()? {
            PE32_MAGIC => (92, 96),
            PE32_PLUS_MAGIC => (108, 112),
            other => {
                return Err(MetadataError::NotPe(format!(
                    "unknown optional header magic {other:#x}"
                )))
            }
        };

        let mut o = ByteReader::at(optional, count_offset)?;
        let dir_count = o.read_u32()? as usize;
        if dir_count <= CLI_HEADER_DIRECTORY {
            return Err(MetadataError::NotManaged);
        }
        let mut o = ByteReader::at(optional, dirs_offset + CLI_HEADER_DIRECTORY * 8)?;
        let cli_rva = o.read_u32()?;
        let cli_size = o.read_u32()?;
        if cli_rva == 0 || cli_size == 0 {
            return Err(MetadataError::NotManaged);
        }

        let mut r = ByteReader::at(data, optional_start + optional_size)?;
        let mut sections = Vec::with_capacity(section_count);
        for _ in 0..section_count {
            let header = r.read_slice(SECTION_HEADER_SIZE)?;
            let mut h = ByteReader::at(header, 8)?;
            let virtual_size = h.read_u32()?;
            let virtual_address = h.read_u32()?;
            let raw_size = h.read_u32()?;
            let raw_pointer = h.read_u32()?;
            sections.push(Section {
                virtual_address,
                virtual_size,
                raw_pointer,
                raw_size,
            });
        }

        trace!(sections = sections.len(), cli_rva, "parsed PE headers");

        Ok(Self {
            data,
            sections,
            cli_rva,
            cli_size,
        })
    }

    /// Bytes at `rva`, `len` long
    pub(crate) fn slice_at(&self, rva: u32, len: u32) -> Result<&'a [u8]> {
        let section = self
            .sections
            .iter()
            .find(|s| s.contains(rva))
            .ok_or(MetadataError::UnmappedRva { rva })?;
        let offset = (rva - section.virtual_address) as usize + section.raw_pointer as usize;
        let mut r = ByteReader::at(self.data, offset).map_err(|_| MetadataError::UnmappedRva { rva })?;
        r.read_slice(len as usize)
    }

    /// The metadata root blob referenced by the CLI header
    pub(crate) fn metadata(&self) -> Result<&'a [u8]> {
        let cli = self.slice_at(self.cli_rva, self.cli_size.max(16))?;
        let mut r = ByteReader::at(cli, 8)?;
        let rva = r.read_u32()?;
        let size = r.read_u32()?;
        if rva == 0 || size == 0 {
            return Err(MetadataError::NotManaged);
        }
        self.slice_at(rva, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ImageBuilder;

    #[test]
    fn test_rejects_non_pe() {
        let err = PeImage::parse(b"hello world, definitely not a module").unwrap_err();
        assert!(matches!(err, MetadataError::NotPe(_)));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(PeImage::parse(&[]), Err(MetadataError::NotPe(_))));
    }

    #[test]
    fn test_rejects_truncated_headers() {
        let image = ImageBuilder::new("Trunc").build();
        let err = PeImage::parse(&image[..0x90]).unwrap_err();
        assert!(matches!(err, MetadataError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_finds_metadata_pe32() {
        let image = ImageBuilder::new("Lib").build();
        let pe = PeImage::parse(&image).unwrap();
        let md = pe.metadata().unwrap();
        assert_eq!(&md[..4], b"BSJB");
    }

    #[test]
    fn test_finds_metadata_pe32_plus() {
        let image = ImageBuilder::new("Lib").pe32_plus().build();
        let pe = PeImage::parse(&image).unwrap();
        assert_eq!(&pe.metadata().unwrap()[..4], b"BSJB");
    }

    #[test]
    fn test_native_image_is_not_managed() {
        let mut image = ImageBuilder::new("Native").build();
        // Zero the CLI data directory (PE32: optional header at 0x98, dirs at +96)
        let dir = 0x98 + 96 + CLI_HEADER_DIRECTORY * 8;
        image[dir..dir + 8].fill(0);
        assert_eq!(PeImage::parse(&image).unwrap_err(), MetadataError::NotManaged);
    }

    #[test]
    fn test_unmapped_rva() {
        let image = ImageBuilder::new("Lib").build();
        let pe = PeImage::parse(&image).unwrap();
        assert_eq!(
            pe.slice_at(0x10, 4),
            Err(MetadataError::UnmappedRva { rva: 0x10 })
        );
    }
}
