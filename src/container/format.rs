//! Fixed-size container header and footer.

use std::io::Write;

use crate::codec::ByteReader;
use crate::error::{HdtError, Result};

// ── Header ─────────────────────────────────────────────────────────

pub const CONTAINER_MAGIC: [u8; 4] = *b"HDTR";

pub const FORMAT_VERSION: u16 = 1;

pub const HEADER_SIZE: usize = 64;

/// Byte range of the volatile `created_at` field inside the header.
pub const CREATED_AT_RANGE: std::ops::Range<usize> = 8..16;

/// Container header, exactly 64 bytes.
///
/// ```text
/// Offset  Size  Field
/// 0       4     magic: b"HDTR"
/// 4       2     version: u16 = 1
/// 6       2     _reserved
/// 8       8     created_at: u64 (unix seconds)
/// 16      8     nb_triples: u64
/// 24      8     nb_subjects: u64
/// 32      8     nb_predicates: u64
/// 40      8     nb_objects: u64
/// 48      8     nb_shared: u64
/// 56      4     base_uri_len: u32
/// 60      4     _reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u16,
    pub created_at: u64,
    pub nb_triples: u64,
    pub nb_subjects: u64,
    pub nb_predicates: u64,
    pub nb_objects: u64,
    pub nb_shared: u64,
    pub base_uri_len: u32,
}

impl ContainerHeader {
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&CONTAINER_MAGIC)?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&[0u8; 2])?;
        w.write_all(&self.created_at.to_le_bytes())?;
        w.write_all(&self.nb_triples.to_le_bytes())?;
        w.write_all(&self.nb_subjects.to_le_bytes())?;
        w.write_all(&self.nb_predicates.to_le_bytes())?;
        w.write_all(&self.nb_objects.to_le_bytes())?;
        w.write_all(&self.nb_shared.to_le_bytes())?;
        w.write_all(&self.base_uri_len.to_le_bytes())?;
        w.write_all(&[0u8; 4])?;
        Ok(())
    }

    /// Parse and check magic and version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        let magic = r.take(4, "container magic")?;
        if magic != CONTAINER_MAGIC {
            return Err(HdtError::corrupt(format!(
                "not a triple container: expected HDTR, got {:?}",
                magic
            )));
        }
        let version = r.read_u16("container version")?;
        if version != FORMAT_VERSION {
            return Err(HdtError::corrupt(format!(
                "unsupported container version: {}",
                version
            )));
        }
        r.take(2, "container header")?;
        let header = Self {
            version,
            created_at: r.read_u64("created_at")?,
            nb_triples: r.read_u64("nb_triples")?,
            nb_subjects: r.read_u64("nb_subjects")?,
            nb_predicates: r.read_u64("nb_predicates")?,
            nb_objects: r.read_u64("nb_objects")?,
            nb_shared: r.read_u64("nb_shared")?,
            base_uri_len: r.read_u32("base_uri_len")?,
        };
        r.take(4, "container header")?;
        Ok(header)
    }
}

// ── Footer ─────────────────────────────────────────────────────────

pub const FOOTER_MAGIC: [u8; 4] = *b"HDTE";

pub const FOOTER_SIZE: usize = 40;

/// Container footer, exactly 40 bytes.
///
/// ```text
/// Offset  Size  Field
/// 0       32    blake3 hash of the body (between header and footer)
/// 32      4     magic: b"HDTE"
/// 36      4     footer_size: u32 = 40
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerFooter {
    pub checksum: [u8; 32],
}

impl ContainerFooter {
    pub fn for_body(body: &[u8]) -> Self {
        Self {
            checksum: *blake3::hash(body).as_bytes(),
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.checksum)?;
        w.write_all(&FOOTER_MAGIC)?;
        w.write_all(&(FOOTER_SIZE as u32).to_le_bytes())?;
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(r.take(32, "container checksum")?);
        if r.take(4, "footer magic")? != FOOTER_MAGIC {
            return Err(HdtError::corrupt("container footer magic missing"));
        }
        let size = r.read_u32("footer size")?;
        if size as usize != FOOTER_SIZE {
            return Err(HdtError::corrupt(format!("unexpected footer size {}", size)));
        }
        Ok(Self { checksum })
    }

    /// Check `body` against the stored hash.
    pub fn verify(&self, body: &[u8]) -> Result<()> {
        if blake3::hash(body).as_bytes() != &self.checksum {
            return Err(HdtError::corrupt("container checksum mismatch"));
        }
        Ok(())
    }
}
