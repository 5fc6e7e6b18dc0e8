//! `#Strings` and `#Blob` heaps

use crate::error::{MetadataError, Result};
use crate::reader::ByteReader;

/// NUL-terminated UTF-8 identifiers, addressed by byte offset
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StringHeap<'a> {
    data: &'a [u8],
}

impl<'a> StringHeap<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// String at `index`; index 0 is the empty string
    pub(crate) fn get(&self, index: u32) -> Result<&'a str> {
        if index == 0 {
            return Ok("");
        }
        let rest = self
            .data
            .get(index as usize..)
            .filter(|rest| !rest.is_empty())
            .ok_or(MetadataError::HeapIndex {
                heap: "#Strings",
                index,
            })?;
        let len = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(MetadataError::HeapIndex {
                heap: "#Strings",
                index,
            })?;
        std::str::from_utf8(&rest[..len]).map_err(|_| MetadataError::InvalidUtf8(index))
    }
}

/// Length-prefixed binary blobs (signatures)
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BlobHeap<'a> {
    data: &'a [u8],
}

impl<'a> BlobHeap<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub(crate) fn get(&self, index: u32) -> Result<&'a [u8]> {
        if index == 0 {
            return Ok(&[]);
        }
        let mut r = ByteReader::at(self.data, index as usize).map_err(|_| {
            MetadataError::HeapIndex {
                heap: "#Blob",
                index,
            }
        })?;
        let len = r.read_compressed()?;
        r.read_slice(len as usize).map_err(|_| MetadataError::HeapIndex {
            heap: "#Blob",
            index,
        })
    }
}
