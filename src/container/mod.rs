//! On-disk container: header, base URI, dictionary, triple index, footer.
//!
//! # File Layout
//!
//! ```text
//! [ContainerHeader]                       64 bytes
//! [base_uri: u8 x base_uri_len]
//! [dictionary_len: u64 LE][dictionary]
//! [triples_len: u64 LE][triples]
//! [ContainerFooter]                       40 bytes
//! ```
//!
//! Loading verifies the checksum before parsing anything, then checks the
//! header counters against what the dictionary and index actually hold.

pub mod format;

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use memmap2::Mmap;
use tracing::warn;

use crate::codec::ByteReader;
use crate::dictionary::{FourSectionDictionary, Role};
use crate::error::{HdtError, Result};
use crate::triples::BitmapTriples;

pub use format::{
    ContainerFooter, ContainerHeader, CONTAINER_MAGIC, CREATED_AT_RANGE, FOOTER_SIZE,
    FORMAT_VERSION, HEADER_SIZE,
};

/// A fully parsed container.
#[derive(Debug, Clone)]
pub struct Container {
    pub header: ContainerHeader,
    pub base_uri: String,
    pub dictionary: FourSectionDictionary,
    pub triples: BitmapTriples,
}

/// Current time as unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Container {
    /// Assemble a container, deriving the header counters.
    pub fn new(base_uri: String, dictionary: FourSectionDictionary, triples: BitmapTriples) -> Self {
        let header = ContainerHeader {
            version: FORMAT_VERSION,
            created_at: unix_now(),
            nb_triples: triples.num_triples() as u64,
            nb_subjects: dictionary.nb_subjects() as u64,
            nb_predicates: dictionary.nb_predicates() as u64,
            nb_objects: dictionary.nb_objects() as u64,
            nb_shared: dictionary.nb_shared() as u64,
            base_uri_len: base_uri.len() as u32,
        };
        Self {
            header,
            base_uri,
            dictionary,
            triples,
        }
    }

    fn body(&self) -> Result<Vec<u8>> {
        let mut dict = Vec::new();
        self.dictionary.write_to(&mut dict)?;
        let mut triples = Vec::new();
        self.triples.write_to(&mut triples)?;

        let mut body = Vec::with_capacity(self.base_uri.len() + dict.len() + triples.len() + 16);
        body.extend_from_slice(self.base_uri.as_bytes());
        body.extend_from_slice(&(dict.len() as u64).to_le_bytes());
        body.extend_from_slice(&dict);
        body.extend_from_slice(&(triples.len() as u64).to_le_bytes());
        body.extend_from_slice(&triples);
        Ok(body)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let body = self.body()?;
        self.header.write_to(w)?;
        w.write_all(&body)?;
        ContainerFooter::for_body(&body).write_to(w)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Parse and validate a container image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(HdtError::corrupt(format!(
                "file too small for a container: {} bytes",
                bytes.len()
            )));
        }
        let header = ContainerHeader::from_bytes(&bytes[..HEADER_SIZE])?;
        let footer = ContainerFooter::from_bytes(&bytes[bytes.len() - FOOTER_SIZE..])?;
        let body = &bytes[HEADER_SIZE..bytes.len() - FOOTER_SIZE];
        footer.verify(body)?;

        let mut r = ByteReader::new(body);
        let base_uri = std::str::from_utf8(r.take(header.base_uri_len as usize, "base URI")?)
            .map_err(|_| HdtError::corrupt("base URI is not valid UTF-8"))?
            .to_string();
        let dictionary = FourSectionDictionary::from_bytes(r.read_block("dictionary")?)?;
        let triples = BitmapTriples::from_bytes(r.read_block("triple index")?)?;
        if r.remaining() != 0 {
            return Err(HdtError::corrupt(format!(
                "{} unexpected bytes before footer",
                r.remaining()
            )));
        }

        let container = Self {
            header,
            base_uri,
            dictionary,
            triples,
        };
        container.validate()?;
        Ok(container)
    }

    /// Header counters must match the payload, and every identifier in the
    /// index must resolve in the dictionary.
    fn validate(&self) -> Result<()> {
        let h = &self.header;
        let d = &self.dictionary;
        let checks = [
            ("nb_triples", h.nb_triples, self.triples.num_triples() as u64),
            ("nb_subjects", h.nb_subjects, d.nb_subjects() as u64),
            ("nb_predicates", h.nb_predicates, d.nb_predicates() as u64),
            ("nb_objects", h.nb_objects, d.nb_objects() as u64),
            ("nb_shared", h.nb_shared, d.nb_shared() as u64),
        ];
        for (name, stored, actual) in checks {
            if stored != actual {
                return Err(HdtError::corrupt(format!(
                    "header {} = {} but payload holds {}",
                    name, stored, actual
                )));
            }
        }

        let (max_s, max_p, max_o) = self.triples.max_ids();
        for (role, used) in [
            (Role::Subject, max_s),
            (Role::Predicate, max_p),
            (Role::Object, max_o),
        ] {
            if used > d.max_id(role) {
                return Err(HdtError::corrupt(format!(
                    "triple index uses {} id {} but the dictionary ends at {}",
                    role,
                    used,
                    d.max_id(role)
                )));
            }
        }
        Ok(())
    }

    /// Memory-map and parse the container at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => HdtError::FileNotFound(path.to_path_buf()),
            _ => HdtError::Io(e),
        })?;
        let len = file.metadata()?.len();
        if len < (HEADER_SIZE + FOOTER_SIZE) as u64 {
            return Err(HdtError::corrupt(format!(
                "file too small for a container: {} bytes",
                len
            )));
        }
        let mmap = unsafe { Mmap::map(&file) }.map_err(HdtError::Io)?;
        Self::from_bytes(&mmap)
    }

    /// Write to `path` through a temporary sibling file, then rename into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        if path.exists() {
            warn!(path = %path.display(), "Replacing existing container");
        }
        let tmp = temp_path(path);
        let result = (|| -> Result<()> {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            self.write_to(&mut writer)?;
            let file = writer.into_inner().map_err(|e| HdtError::Io(e.into_error()))?;
            file.sync_all()?;
            fs::rename(&tmp, path)?;
            Ok(())
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "container".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}
