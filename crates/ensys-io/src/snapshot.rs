//! Versioned snapshot files for energy systems and their results.
//!
//! # Layout
//!
//! A snapshot is UTF-8 text. The first line is a JSON header, everything after
//! the first newline is the JSON payload:
//!
//! ```text
//! {"magic":"ensys-snapshot","schema_version":1,"created_at":"...","ensys_version":"0.1.0","payload_bytes":1234,"payload_sha256":"..."}
//! {"time_index":{...},"nodes":[...],"results":{...}}
//! ```
//!
//! The header is checked before the payload is touched: wrong magic, a schema
//! version other than [`SCHEMA_VERSION`], a length or checksum mismatch are all
//! rejected. The payload holds the node specs, so restoring runs them through
//! [`NetworkBuilder`] again and an edited snapshot cannot smuggle in an
//! invalid system.
//!
//! Files are written to a temporary sibling and renamed into place, so the
//! target path either holds a complete snapshot or is left untouched.

use chrono::{DateTime, Utc};
use ensys_core::{
    EnergySystem, EnsysError, EnsysResult, NetworkBuilder, NodeSpec, ResultsSet, TimeIndex,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const SNAPSHOT_MAGIC: &str = "ensys-snapshot";

/// Bumped on any incompatible payload change. Readers accept only this value.
pub const SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_FILENAME: &str = "es_dump.ensys";

/// `~/.ensys/dumps`, or `./.ensys/dumps` when no home directory is known.
pub fn default_dump_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ensys")
        .join("dumps")
}

/// Where a snapshot lives: a directory plus a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLocation {
    pub dir: PathBuf,
    pub filename: String,
}

impl Default for SnapshotLocation {
    fn default() -> Self {
        Self {
            dir: default_dump_dir(),
            filename: DEFAULT_FILENAME.to_string(),
        }
    }
}

impl SnapshotLocation {
    pub fn new(dir: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            filename: filename.into(),
        }
    }

    /// Default location with either part overridden.
    pub fn with_overrides(dir: Option<PathBuf>, filename: Option<String>) -> Self {
        let default = Self::default();
        Self {
            dir: dir.unwrap_or(default.dir),
            filename: filename.unwrap_or(default.filename),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: String,
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub ensys_version: String,
    pub payload_bytes: u64,
    pub payload_sha256: String,
}

/// First fields read from a header, before committing to its full shape.
#[derive(Deserialize)]
struct HeaderPrelude {
    magic: String,
    schema_version: u32,
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    time_index: &'a TimeIndex,
    nodes: Vec<NodeSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<&'a ResultsSet>,
}

#[derive(Deserialize)]
struct Payload {
    time_index: TimeIndex,
    nodes: Vec<NodeSpec>,
    #[serde(default)]
    results: Option<ResultsSet>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Write `system` and optional `results` to `location`. Returns the file path.
pub fn dump(
    system: &EnergySystem,
    results: Option<&ResultsSet>,
    location: &SnapshotLocation,
) -> EnsysResult<PathBuf> {
    let payload = serde_json::to_vec(&PayloadRef {
        time_index: system.time_index(),
        nodes: system.to_specs(),
        results,
    })
    .map_err(|e| EnsysError::persistence_with("cannot encode snapshot payload", e))?;

    let header = SnapshotHeader {
        magic: SNAPSHOT_MAGIC.to_string(),
        schema_version: SCHEMA_VERSION,
        created_at: Utc::now(),
        ensys_version: env!("CARGO_PKG_VERSION").to_string(),
        payload_bytes: payload.len() as u64,
        payload_sha256: sha256_hex(&payload),
    };
    let header_line = serde_json::to_vec(&header)
        .map_err(|e| EnsysError::persistence_with("cannot encode snapshot header", e))?;

    fs::create_dir_all(&location.dir).map_err(|e| {
        EnsysError::persistence_with(
            format!("cannot create snapshot directory {}", location.dir.display()),
            e,
        )
    })?;

    let path = location.path();
    let write_err = |e: std::io::Error| {
        EnsysError::persistence_with(format!("cannot write snapshot {}", path.display()), e)
    };

    // The temporary file is removed on drop unless persisted.
    let mut tmp = NamedTempFile::new_in(&location.dir).map_err(write_err)?;
    tmp.write_all(&header_line).map_err(write_err)?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.write_all(&payload).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(&path).map_err(|e| write_err(e.error))?;

    tracing::info!(
        path = %path.display(),
        bytes = payload.len(),
        with_results = results.is_some(),
        "dumped snapshot"
    );
    Ok(path)
}

fn split_header(bytes: &[u8]) -> EnsysResult<(&[u8], &[u8])> {
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| EnsysError::persistence("snapshot has no header line"))?;
    Ok((&bytes[..newline], &bytes[newline + 1..]))
}

fn parse_header(line: &[u8]) -> EnsysResult<SnapshotHeader> {
    let prelude: HeaderPrelude = serde_json::from_slice(line)
        .map_err(|e| EnsysError::persistence_with("unreadable snapshot header", e))?;
    if prelude.magic != SNAPSHOT_MAGIC {
        return Err(EnsysError::persistence(format!(
            "not an ensys snapshot (magic '{}')",
            prelude.magic
        )));
    }
    if prelude.schema_version != SCHEMA_VERSION {
        return Err(EnsysError::persistence(format!(
            "snapshot schema version {} does not match reader version {}",
            prelude.schema_version, SCHEMA_VERSION
        )));
    }
    serde_json::from_slice(line)
        .map_err(|e| EnsysError::persistence_with("unreadable snapshot header", e))
}

fn read_file(path: &Path) -> EnsysResult<Vec<u8>> {
    fs::read(path).map_err(|e| {
        EnsysError::persistence_with(format!("cannot read snapshot {}", path.display()), e)
    })
}

/// Read and validate only the header of the snapshot at `location`.
pub fn read_header(location: &SnapshotLocation) -> EnsysResult<SnapshotHeader> {
    let bytes = read_file(&location.path())?;
    let (line, _) = split_header(&bytes)?;
    parse_header(line)
}

/// Restore a system and its optional results from `location`.
pub fn restore(location: &SnapshotLocation) -> EnsysResult<(EnergySystem, Option<ResultsSet>)> {
    let path = location.path();
    let bytes = read_file(&path)?;
    let (line, payload) = split_header(&bytes)?;
    let header = parse_header(line)?;

    if payload.len() as u64 != header.payload_bytes {
        return Err(EnsysError::persistence(format!(
            "snapshot payload is {} bytes, header promises {}",
            payload.len(),
            header.payload_bytes
        )));
    }
    let actual = sha256_hex(payload);
    if actual != header.payload_sha256 {
        return Err(EnsysError::persistence(format!(
            "snapshot checksum mismatch: expected {}, got {}",
            header.payload_sha256, actual
        )));
    }

    let payload: Payload = serde_json::from_slice(payload)
        .map_err(|e| EnsysError::persistence_with("undecodable snapshot payload", e))?;

    let system = NetworkBuilder::new(payload.time_index)
        .nodes(payload.nodes)
        .build()
        .map_err(|e| EnsysError::persistence_with("snapshot does not describe a valid system", e))?;

    if let Some(results) = &payload.results {
        check_results(&system, results)?;
    }

    tracing::info!(
        path = %path.display(),
        created_at = %header.created_at,
        written_by = %header.ensys_version,
        "restored snapshot"
    );
    Ok((system, payload.results))
}

fn check_results(system: &EnergySystem, results: &ResultsSet) -> EnsysResult<()> {
    if results.flows.len() != system.num_flows() {
        return Err(EnsysError::persistence(format!(
            "snapshot results cover {} flows, system has {}",
            results.flows.len(),
            system.num_flows()
        )));
    }
    for (series, flow) in results.flows.iter().zip(system.flows()) {
        if series.from != flow.from || series.to != flow.to {
            return Err(EnsysError::persistence(format!(
                "snapshot results list '{}' where the system has '{}'",
                series.name(),
                flow.name()
            )));
        }
        if series.values.len() != system.periods() {
            return Err(EnsysError::persistence(format!(
                "snapshot results for '{}' have {} values, expected {}",
                series.name(),
                series.values.len(),
                system.periods()
            )));
        }
    }
    Ok(())
}
