//! Snapshot interchange files.
//!
//! A file is one header line followed by the snapshot as JSON:
//!
//! ```text
//! stmtsnap-snapshot v1 crc32=1a2b3c4d
//! {"id":"2024.03.07 09:05:03","statements":[...]}
//! ```
//!
//! The CRC32 covers the JSON body only.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;

use crate::{
    registry::SnapshotRegistry,
    snapshot::{Snapshot, SnapshotId},
    util::{Result, Status},
};

const MAGIC: &str = "stmtsnap-snapshot";
const FORMAT_VERSION: u32 = 1;

pub const SNAPSHOT_FILE_EXTENSION: &str = "snap";

/// Serialize a snapshot into the interchange format.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let body = serde_json::to_vec_pretty(snapshot)?;
    let checksum = crc32fast::hash(&body);

    let header = format!("{MAGIC} v{FORMAT_VERSION} crc32={checksum:08x}\n");
    let mut out = Vec::with_capacity(header.len() + body.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse and verify an interchange file's contents.
pub fn decode_snapshot(data: &[u8]) -> Result<Snapshot> {
    let newline = data
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| Status::corruption("snapshot file has no header line"))?;
    let (header, body) = (&data[..newline], &data[newline + 1..]);

    let header = std::str::from_utf8(header)
        .map_err(|_| Status::corruption("snapshot file header is not UTF-8"))?;
    let expected = parse_header(header)?;

    let actual = crc32fast::hash(body);
    if actual != expected {
        return Err(Status::corruption(format!(
            "snapshot checksum mismatch: header {expected:08x}, body {actual:08x}"
        )));
    }

    Ok(serde_json::from_slice(body)?)
}

fn parse_header(header: &str) -> Result<u32> {
    let mut fields = header.split(' ');
    if fields.next() != Some(MAGIC) {
        return Err(Status::corruption("not a snapshot file"));
    }

    let version = fields
        .next()
        .and_then(|v| v.strip_prefix('v'))
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| Status::corruption("snapshot file version missing"))?;
    if version != FORMAT_VERSION {
        return Err(Status::corruption(format!(
            "unsupported snapshot file version {version}"
        )));
    }

    let checksum = fields
        .next()
        .and_then(|c| c.strip_prefix("crc32="))
        .filter(|c| c.len() == 8)
        .and_then(|c| u32::from_str_radix(c, 16).ok())
        .ok_or_else(|| Status::corruption("snapshot file checksum missing"))?;

    if fields.next().is_some() {
        return Err(Status::corruption("trailing fields in snapshot file header"));
    }
    Ok(checksum)
}

/// Write one snapshot to `path`, replacing any existing file.
///
/// Goes through a temporary file in the same directory so a crash never
/// leaves a half-written file under the final name.
pub fn write_snapshot<P: AsRef<Path>>(path: P, snapshot: &Snapshot) -> Result<()> {
    let path = path.as_ref();
    let data = encode_snapshot(snapshot)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Status::not_found(format!(
            "snapshot file not found: {}",
            path.display()
        )));
    }
    let data = fs::read(path)?;
    decode_snapshot(&data)
}

/// Read a snapshot file and add it to `registry`, replacing any snapshot
/// with the same id.
pub fn import_into<P: AsRef<Path>>(registry: &SnapshotRegistry, path: P) -> Result<SnapshotId> {
    let path = path.as_ref();
    let snapshot = read_snapshot(path)?;
    let id = snapshot.id().clone();
    registry.put(snapshot);
    info!("imported snapshot {id} from {}", path.display());
    Ok(id)
}

/// File name used for `id` by [`export_all`].
pub fn snapshot_file_name(id: &SnapshotId) -> String {
    format!("{}.{SNAPSHOT_FILE_EXTENSION}", id.file_stem())
}

/// Write every registered snapshot into `dir`, one file each, oldest first.
pub fn export_all<P: AsRef<Path>>(registry: &SnapshotRegistry, dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(registry.len());
    for snapshot in registry.snapshots() {
        let path = dir.join(snapshot_file_name(snapshot.id()));
        write_snapshot(&path, &snapshot)?;
        written.push(path);
    }
    info!("exported {} snapshot(s) to {}", written.len(), dir.display());
    Ok(written)
}
