//! Binary cache for a complete index generation
//!
//! Layout (little-endian, strings are `[i32 byte length][UTF-8]`):
//!
//! ```text
//! [i32 path count][string version]
//! [i32 n] n × (path, [i32 m] m × dependency)      forward links
//! [i32 n] n × (path, [i32 m] m × dependent)       backward links
//! [i32 n] n × folder
//! [i32 n] n × (path, [i64 bytes])                 unused files
//! [i32 n] n × (path, [i64 bytes])                 unused scenes
//! [i32 n] n × (folder, [i32 files][i32 scenes][i64 bytes])
//! ```
//!
//! The header is compared verbatim with the live environment by the caller;
//! any mismatch or decode failure means a full rebuild.

use crate::error::CacheError;
use crate::graph::{GraphStore, PathSet};
use crate::index::IndexState;
use crate::model::{Fingerprint, FolderStats};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache directory: .reclaim/
pub const CACHE_DIR: &str = ".reclaim";

/// Index cache file
pub const INDEX_CACHE: &str = "index.bin";

/// Bumped whenever the layout above changes.
pub const CACHE_FORMAT_VERSION: &str = "reclaim-index/1";

/// Longest string the decoder will allocate for.
const MAX_STRING_BYTES: usize = 64 * 1024;

/// Distinguishes temp files of overlapping saves.
static SAVE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A decoded cache file: the fingerprint it was built against plus its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub fingerprint: Fingerprint,
    pub state: IndexState,
}

/// Get cache directory path
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

/// Get index cache file path
pub fn index_cache_path(root: &Path) -> PathBuf {
    root.join(CACHE_DIR).join(INDEX_CACHE)
}

/// Ensure cache directory exists
pub fn ensure_cache_dir(root: &Path) -> std::io::Result<()> {
    let cache = cache_dir(root);
    if !cache.exists() {
        std::fs::create_dir_all(&cache)?;
    }
    Ok(())
}

/// Clear cache directory
pub fn clear_cache(root: &Path) -> std::io::Result<()> {
    let cache = cache_dir(root);
    if cache.exists() {
        std::fs::remove_dir_all(&cache)?;
    }
    Ok(())
}

/// Write `state` to `path`, replacing any previous file atomically.
pub fn save_index(path: &Path, fingerprint: &Fingerprint, state: &IndexState) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let seq = SAVE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), seq));
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        encode(&mut writer, fingerprint, state)?;
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;

    tracing::debug!("Index cache saved: {}", path.display());
    Ok(())
}

/// Read a cache file written by [`save_index`].
pub fn load_index(path: &Path) -> Result<CacheSnapshot, CacheError> {
    let mut reader = BufReader::new(File::open(path)?);
    let snapshot = decode(&mut reader)?;

    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing)? != 0 {
        return Err(CacheError::corrupt("trailing bytes after folder stats"));
    }

    tracing::debug!("Index cache loaded from: {}", path.display());
    Ok(snapshot)
}

/// Serialize a generation into `out`.
pub fn encode<W: Write>(out: W, fingerprint: &Fingerprint, state: &IndexState) -> Result<(), CacheError> {
    let mut enc = Encoder { out };

    enc.count(fingerprint.path_count as usize, "path count")?;
    enc.string(&fingerprint.version)?;

    enc.links(state.graph.forward_entries())?;
    enc.links(state.graph.backward_entries())?;

    enc.count(state.folders.len(), "folder set")?;
    for folder in &state.folders {
        enc.string(folder)?;
    }

    enc.sizes(&state.unused_files)?;
    enc.sizes(&state.unused_scenes)?;

    enc.count(state.folder_stats.len(), "folder stats")?;
    for (folder, stats) in &state.folder_stats {
        enc.string(folder)?;
        enc.count(stats.file_count as usize, "file count")?;
        enc.count(stats.scene_count as usize, "scene count")?;
        enc.bytes(stats.total_bytes)?;
    }

    Ok(())
}

/// Deserialize a generation from `input`.
pub fn decode<R: Read>(input: R) -> Result<CacheSnapshot, CacheError> {
    let mut dec = Decoder { input };

    let path_count = dec.count("path count")? as u32;
    let version = dec.string("version")?;

    let forward = dec.links("forward links")?;
    let backward = dec.links("backward links")?;

    let mut folders = BTreeSet::new();
    for _ in 0..dec.count("folder set")? {
        folders.insert(dec.string("folder")?);
    }

    let unused_files = dec.sizes("unused files")?;
    let unused_scenes = dec.sizes("unused scenes")?;

    let mut folder_stats = BTreeMap::new();
    for _ in 0..dec.count("folder stats")? {
        let folder = dec.string("folder stats")?;
        let stats = FolderStats {
            file_count: dec.count("file count")? as u32,
            scene_count: dec.count("scene count")? as u32,
            total_bytes: dec.bytes("folder bytes")?,
        };
        folder_stats.insert(folder, stats);
    }

    Ok(CacheSnapshot {
        fingerprint: Fingerprint { path_count, version },
        state: IndexState {
            graph: GraphStore::from_parts(forward, backward),
            folders,
            unused_files,
            unused_scenes,
            folder_stats,
        },
    })
}

struct Encoder<W> {
    out: W,
}

impl<W: Write> Encoder<W> {
    fn count(&mut self, value: usize, what: &'static str) -> Result<(), CacheError> {
        let value = i32::try_from(value).map_err(|_| CacheError::Overflow { what })?;
        self.out.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn bytes(&mut self, value: u64) -> Result<(), CacheError> {
        let value = i64::try_from(value).map_err(|_| CacheError::Overflow { what: "byte size" })?;
        self.out.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn string(&mut self, value: &str) -> Result<(), CacheError> {
        self.count(value.len(), "string length")?;
        self.out.write_all(value.as_bytes())?;
        Ok(())
    }

    fn links(&mut self, links: &BTreeMap<String, PathSet>) -> Result<(), CacheError> {
        self.count(links.len(), "link table")?;
        for (path, targets) in links {
            self.string(path)?;
            self.count(targets.len(), "link set")?;
            for target in targets {
                self.string(target)?;
            }
        }
        Ok(())
    }

    fn sizes(&mut self, tally: &BTreeMap<String, u64>) -> Result<(), CacheError> {
        self.count(tally.len(), "unused tally")?;
        for (path, bytes) in tally {
            self.string(path)?;
            self.bytes(*bytes)?;
        }
        Ok(())
    }
}

struct Decoder<R> {
    input: R,
}

impl<R: Read> Decoder<R> {
    fn fill<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], CacheError> {
        let mut buf = [0u8; N];
        self.input.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => CacheError::Truncated { what },
            _ => CacheError::Io(e),
        })?;
        Ok(buf)
    }

    fn count(&mut self, what: &'static str) -> Result<usize, CacheError> {
        let value = i32::from_le_bytes(self.fill(what)?);
        usize::try_from(value).map_err(|_| CacheError::corrupt(format!("negative {what}: {value}")))
    }

    fn bytes(&mut self, what: &'static str) -> Result<u64, CacheError> {
        let value = i64::from_le_bytes(self.fill(what)?);
        u64::try_from(value).map_err(|_| CacheError::corrupt(format!("negative {what}: {value}")))
    }

    fn string(&mut self, what: &'static str) -> Result<String, CacheError> {
        let len = self.count(what)?;
        if len > MAX_STRING_BYTES {
            return Err(CacheError::corrupt(format!("{what} string of {len} bytes")));
        }
        let mut buf = vec![0u8; len];
        self.input.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => CacheError::Truncated { what },
            _ => CacheError::Io(e),
        })?;
        Ok(String::from_utf8(buf)?)
    }

    fn links(&mut self, what: &'static str) -> Result<BTreeMap<String, PathSet>, CacheError> {
        let mut links = BTreeMap::new();
        for _ in 0..self.count(what)? {
            let path = self.string(what)?;
            let mut targets = PathSet::new();
            for _ in 0..self.count(what)? {
                targets.insert(self.string(what)?);
            }
            links.insert(path, targets);
        }
        Ok(links)
    }

    fn sizes(&mut self, what: &'static str) -> Result<BTreeMap<String, u64>, CacheError> {
        let mut tally = BTreeMap::new();
        for _ in 0..self.count(what)? {
            let path = self.string(what)?;
            tally.insert(path, self.bytes(what)?);
        }
        Ok(tally)
    }
}
