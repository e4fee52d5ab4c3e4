//! Single-file persistence for a `FlatIndex`.
//!
//! Layout:
//!
//! ```text
//! b"MEDRAGS1" | header_len: u64 LE | JSON header | count * dimension f32 LE
//! ```
//!
//! The header carries the embedder id, dimension, row count, a blake3
//! checksum of the vector payload and the catalog (`text`, `source` per row).
//! Saves go through a temp file in the target directory that is synced and
//! then renamed over the destination, so readers see either the old snapshot
//! or the new one.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use medcopilot_core::{Error, Result};

use crate::index::{Entry, FlatIndex};

const MAGIC: &[u8; 8] = b"MEDRAGS1";
const FORMAT_VERSION: u32 = 1;
const PREFIX_LEN: usize = MAGIC.len() + 8;

#[derive(Debug, Serialize, Deserialize)]
struct CatalogRecord {
    text: String,
    source: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotHeader {
    format_version: u32,
    embedder_id: String,
    dimension: usize,
    count: usize,
    created_at: String,
    checksum: String,
    catalog: Vec<CatalogRecord>,
}

/// Summary of a snapshot file without its vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub embedder_id: String,
    pub dimension: usize,
    pub count: usize,
    pub created_at: String,
}

fn encode_vectors(index: &FlatIndex) -> Vec<u8> {
    let mut payload = Vec::with_capacity(index.len() * index.dimension() * 4);
    for entry in index.entries() {
        for x in &entry.vector {
            payload.extend_from_slice(&x.to_le_bytes());
        }
    }
    payload
}

pub fn save(index: &FlatIndex, path: &Path) -> Result<()> {
    let payload = encode_vectors(index);
    let header = SnapshotHeader {
        format_version: FORMAT_VERSION,
        embedder_id: index.embedder_id().to_string(),
        dimension: index.dimension(),
        count: index.len(),
        created_at: chrono::Utc::now().to_rfc3339(),
        checksum: blake3::hash(&payload).to_hex().to_string(),
        catalog: index
            .catalog()
            .map(|(text, source)| CatalogRecord { text: text.to_string(), source: source.to_string() })
            .collect(),
    };
    let header_bytes = serde_json::to_vec(&header).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        writer.write_all(MAGIC)?;
        writer.write_all(&(header_bytes.len() as u64).to_le_bytes())?;
        writer.write_all(&header_bytes)?;
        writer.write_all(&payload)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    if let Err(e) = sync_dir(&parent) {
        tracing::warn!("Could not sync directory {} after saving snapshot: {}", parent.display(), e);
    }

    tracing::info!("Saved snapshot {} ({} rows, dim {})", path.display(), index.len(), index.dimension());
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::SnapshotNotFound(path.to_path_buf())),
        Err(e) => Err(e.into()),
    }
}

fn corrupt(path: &Path, reason: impl Into<String>) -> Error {
    Error::SnapshotCorrupt { path: path.to_path_buf(), reason: reason.into() }
}

/// Validate the prefix and parse the header; returns it with the payload offset.
fn parse_header(path: &Path, bytes: &[u8]) -> Result<(SnapshotHeader, usize)> {
    if bytes.len() < PREFIX_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(corrupt(path, "not a snapshot file (bad magic)"));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[MAGIC.len()..PREFIX_LEN]);
    let header_end = usize::try_from(u64::from_le_bytes(len_bytes))
        .ok()
        .and_then(|len| PREFIX_LEN.checked_add(len))
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| corrupt(path, "truncated header"))?;

    let header: SnapshotHeader = serde_json::from_slice(&bytes[PREFIX_LEN..header_end])
        .map_err(|e| corrupt(path, format!("unreadable header: {}", e)))?;
    if header.format_version != FORMAT_VERSION {
        return Err(corrupt(path, format!("unsupported format version {}", header.format_version)));
    }
    if header.catalog.len() != header.count {
        return Err(corrupt(
            path,
            format!("catalog has {} rows but header says {}", header.catalog.len(), header.count),
        ));
    }
    if header.dimension == 0 {
        return Err(corrupt(path, "zero dimension"));
    }
    Ok((header, header_end))
}

/// Header fields of the snapshot at `path`, without decoding vectors.
pub fn inspect(path: &Path) -> Result<SnapshotInfo> {
    let bytes = read_snapshot(path)?;
    let (header, _) = parse_header(path, &bytes)?;
    Ok(SnapshotInfo {
        embedder_id: header.embedder_id,
        dimension: header.dimension,
        count: header.count,
        created_at: header.created_at,
    })
}

pub fn load(path: &Path) -> Result<FlatIndex> {
    let bytes = read_snapshot(path)?;
    let (header, payload_start) = parse_header(path, &bytes)?;
    let payload = &bytes[payload_start..];

    let expected = header
        .count
        .checked_mul(header.dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| corrupt(path, "row count overflows"))?;
    if payload.len() < expected {
        return Err(corrupt(path, format!("truncated payload: {} of {} bytes", payload.len(), expected)));
    }
    if payload.len() > expected {
        return Err(corrupt(path, format!("{} trailing bytes", payload.len() - expected)));
    }
    if blake3::hash(payload).to_hex().as_str() != header.checksum {
        return Err(corrupt(path, "checksum mismatch"));
    }

    let values: Vec<f32> = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let entries = values
        .chunks_exact(header.dimension)
        .zip(header.catalog)
        .map(|(vector, record)| Entry { vector: vector.to_vec(), text: record.text, source: record.source })
        .collect();

    let mut index = FlatIndex::new(header.embedder_id, header.dimension);
    index.add(entries)?;
    tracing::info!("Loaded snapshot {} ({} rows, dim {})", path.display(), index.len(), index.dimension());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn directory_sync_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        assert!(sync_dir(tmp.path()).is_ok());
        assert!(sync_dir(&tmp.path().join("gone")).is_err());
    }

    fn small_index() -> FlatIndex {
        let mut idx = FlatIndex::new("test:d3", 3);
        idx.add(vec![
            Entry { vector: vec![0.1, 0.2, 0.3], text: "alpha".into(), source: "a — Page 1".into() },
            Entry { vector: vec![-1.5, f32::MIN_POSITIVE, 7.0], text: "beta".into(), source: "b — Page 2".into() },
        ])
        .unwrap();
        idx
    }

    #[test]
    fn vectors_round_trip_bit_exact() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/index.snapshot");
        let idx = small_index();
        save(&idx, &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.embedder_id(), "test:d3");
        assert_eq!(loaded.entries(), idx.entries());
        let info = inspect(&path).unwrap();
        assert_eq!(info.count, 2);
        assert_eq!(info.dimension, 3);
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = load(&tmp.path().join("absent.snapshot")).unwrap_err();
        assert!(matches!(err, Error::SnapshotNotFound(_)));
    }

    #[test]
    fn damaged_files_are_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.snapshot");
        save(&small_index(), &path).unwrap();
        let good = fs::read(&path).unwrap();

        let mut flipped = good.clone();
        let last = flipped.len() - 1;
        flipped[last] ^= 0xFF;
        fs::write(&path, &flipped).unwrap();
        assert!(matches!(load(&path), Err(Error::SnapshotCorrupt { .. })));

        fs::write(&path, &good[..good.len() - 2]).unwrap();
        assert!(matches!(load(&path), Err(Error::SnapshotCorrupt { .. })));

        let mut longer = good.clone();
        longer.extend_from_slice(&[0, 0, 0, 0]);
        fs::write(&path, &longer).unwrap();
        assert!(matches!(load(&path), Err(Error::SnapshotCorrupt { .. })));

        fs::write(&path, b"garbage").unwrap();
        assert!(matches!(load(&path), Err(Error::SnapshotCorrupt { .. })));
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.snapshot");
        save(&small_index(), &path).unwrap();

        let mut smaller = FlatIndex::new("test:d3", 3);
        smaller.add_entry(Entry { vector: vec![1.0, 1.0, 1.0], text: "gamma".into(), source: "c".into() }).unwrap();
        save(&smaller, &path).unwrap();

        assert_eq!(load(&path).unwrap().len(), 1);
        let leftovers = fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(leftovers, 1, "temp files are renamed away");
    }
}
