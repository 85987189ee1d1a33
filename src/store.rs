use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use bytemuck::{Pod, Zeroable};
use redb::{
    Database,
    DatabaseError,
    ReadableDatabase,
    ReadableTable,
    StorageError,
    TableDefinition,
    TableError,
};
use tracing::info;

use crate::{
    chunk::Chunk,
    error::{Error, Result},
    index::VectorIndex,
};

/// Vector artifact file name inside a store directory.
pub const VECTORS_FILE: &str = "vectors.bin";
/// Metadata artifact file name inside a store directory.
pub const CHUNKS_FILE: &str = "chunks.redb";

const CHUNKS: TableDefinition<u64, &[u8]> = TableDefinition::new("chunks");
const INFO: TableDefinition<&str, &str> = TableDefinition::new("info");

const MAGIC: [u8; 4] = *b"RRVX";
const FORMAT_VERSION: u32 = 1;
const HEADER_SIZE: usize = std::mem::size_of::<VectorHeader>();

/// Fixed header at the start of the vector artifact.
///
/// Layout (native byte order):
/// - 4 bytes: magic `RRVX`
/// - 4 bytes: format version
/// - 4 bytes: dimension D
/// - 4 bytes: reserved
/// - 8 bytes: vector count N
/// - 8 bytes: build id, shared with the metadata artifact
///
/// followed by N * D f32 values in row-major order.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct VectorHeader {
    magic: [u8; 4],
    version: u32,
    dimension: u32,
    reserved: u32,
    count: u64,
    build_id: u64,
}

/// A persisted index opened for serving.
///
/// The store owns its index for as long as it is held; dropping it releases
/// everything. Nothing is shared globally.
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    index: VectorIndex,
    embedding_model: Option<String>,
}

impl Store {
    /// Open the store in `dir`, validating that both artifacts agree.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use ragrank::{Chunk, Store, VectorIndex};
    ///
    /// let mut index = VectorIndex::create(2).unwrap();
    /// index
    ///     .add(vec![vec![3.0, 4.0]], vec![Chunk::new("a.txt", "hi")])
    ///     .unwrap();
    /// Store::save(tmp.path(), &index, Some("nomic-embed-text")).unwrap();
    ///
    /// let store = Store::open(tmp.path()).unwrap();
    /// assert_eq!(store.index().len(), 1);
    /// assert_eq!(store.embedding_model(), Some("nomic-embed-text"));
    /// ```
    pub fn open(dir: &Path) -> Result<Self> {
        let vectors_path = dir.join(VECTORS_FILE);
        let chunks_path = dir.join(CHUNKS_FILE);

        match (vectors_path.exists(), chunks_path.exists()) {
            (false, false) => {
                return Err(Error::NotFound {
                    kind: "store",
                    name: dir.display().to_string(),
                });
            }
            (true, false) => {
                return Err(Error::CorruptStore(format!(
                    "{} exists without {CHUNKS_FILE}",
                    vectors_path.display()
                )));
            }
            (false, true) => {
                return Err(Error::CorruptStore(format!(
                    "{} exists without {VECTORS_FILE}",
                    chunks_path.display()
                )));
            }
            (true, true) => {}
        }

        let metadata = read_metadata(&chunks_path)?;
        let (header, data) = read_vectors(&vectors_path)?;

        if header.build_id != metadata.build_id {
            return Err(Error::CorruptStore(format!(
                "artifacts come from different builds ({} vs {})",
                header.build_id, metadata.build_id
            )));
        }
        if header.count != metadata.count
            || metadata.chunks.len() as u64 != header.count
        {
            return Err(Error::CorruptStore(format!(
                "vector file holds {} vector(s) but metadata holds {} chunk(s)",
                header.count,
                metadata.chunks.len()
            )));
        }
        if header.dimension as usize != metadata.dimension {
            return Err(Error::CorruptStore(format!(
                "vector dimension {} disagrees with recorded dimension {}",
                header.dimension, metadata.dimension
            )));
        }

        let index = VectorIndex::from_parts(
            metadata.dimension,
            data,
            metadata.chunks,
        )?;
        info!(
            path = %dir.display(),
            chunks = index.len(),
            dimension = index.dimension(),
            "opened store"
        );

        Ok(Self {
            root: dir.to_path_buf(),
            index,
            embedding_model: metadata.embedding_model,
        })
    }

    /// Write `index` to `dir`, replacing any store already there.
    ///
    /// Both artifacts are written to temporary files first and then renamed
    /// into place.
    pub fn save(
        dir: &Path,
        index: &VectorIndex,
        embedding_model: Option<&str>,
    ) -> Result<()> {
        std::fs::create_dir_all(dir)
            .map_err(|_| Error::DataDir(dir.to_path_buf()))?;

        let build_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;

        let chunks_tmp = dir.join(format!("{CHUNKS_FILE}.tmp"));
        let vectors_tmp = dir.join(format!("{VECTORS_FILE}.tmp"));

        write_metadata(&chunks_tmp, index, embedding_model, build_id)?;
        write_vectors(&vectors_tmp, index, build_id)?;

        std::fs::rename(&chunks_tmp, dir.join(CHUNKS_FILE))?;
        std::fs::rename(&vectors_tmp, dir.join(VECTORS_FILE))?;

        info!(
            path = %dir.display(),
            chunks = index.len(),
            dimension = index.dimension(),
            "saved store"
        );
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn into_index(self) -> VectorIndex {
        self.index
    }

    /// The embedding model the store was built with, if recorded.
    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }
}

struct StoredMetadata {
    chunks: Vec<Chunk>,
    count: u64,
    dimension: usize,
    build_id: u64,
    embedding_model: Option<String>,
}

fn write_metadata(
    path: &Path,
    index: &VectorIndex,
    embedding_model: Option<&str>,
    build_id: u64,
) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    let db = Database::create(path)?;
    let txn = db.begin_write()?;
    {
        let mut chunks = txn.open_table(CHUNKS)?;
        for (position, chunk) in index.chunks().iter().enumerate() {
            let bytes = chunk.serialize().ok_or_else(|| {
                Error::InvalidConfiguration(format!(
                    "source id of chunk {position} is too long to store"
                ))
            })?;
            chunks.insert(position as u64, bytes.as_slice())?;
        }

        let mut info = txn.open_table(INFO)?;
        info.insert("count", index.len().to_string().as_str())?;
        info.insert("dimension", index.dimension().to_string().as_str())?;
        info.insert("build_id", build_id.to_string().as_str())?;
        if let Some(model) = embedding_model {
            info.insert("embedding_model", model)?;
        }
    }
    txn.commit()?;
    Ok(())
}

fn read_metadata(path: &Path) -> Result<StoredMetadata> {
    let db = Database::open(path).map_err(|e| match e {
        DatabaseError::Storage(e) => storage_error(e, path),
        DatabaseError::UpgradeRequired(_) => Error::CorruptStore(format!(
            "cannot open {}: {e}",
            path.display()
        )),
        other => Error::RedbDatabase(other),
    })?;
    let txn = db.begin_read()?;

    let info = txn.open_table(INFO).map_err(|e| table_error(e, path))?;
    let get = |key: &str| -> Result<Option<String>> {
        let value = info.get(key).map_err(|e| storage_error(e, path))?;
        Ok(value.map(|v| v.value().to_string()))
    };
    let required = |key: &str| -> Result<u64> {
        get(key)?
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                Error::CorruptStore(format!("missing or bad `{key}`"))
            })
    };

    let count = required("count")?;
    let dimension = required("dimension")? as usize;
    let build_id = required("build_id")?;
    let embedding_model = get("embedding_model")?;

    let table = txn.open_table(CHUNKS).map_err(|e| table_error(e, path))?;
    let mut chunks = Vec::new();
    let entries = table.iter().map_err(|e| storage_error(e, path))?;
    for (expected, entry) in entries.enumerate() {
        let (key, value) = entry.map_err(|e| storage_error(e, path))?;
        let position = key.value();
        if position != expected as u64 {
            return Err(Error::CorruptStore(format!(
                "chunk positions are not contiguous: expected {expected}, \
                 found {position}"
            )));
        }
        let chunk = Chunk::deserialize(value.value()).ok_or_else(|| {
            Error::CorruptStore(format!("undecodable chunk at {position}"))
        })?;
        chunks.push(chunk);
    }

    Ok(StoredMetadata {
        chunks,
        count,
        dimension,
        build_id,
        embedding_model,
    })
}

/// Undecodable content is corruption; lock and I/O failures are not.
fn storage_error(e: StorageError, path: &Path) -> Error {
    match e {
        StorageError::Io(io)
            if !matches!(
                io.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::InvalidData
            ) =>
        {
            Error::Io(io)
        }
        StorageError::Io(_) | StorageError::Corrupted(_) => Error::CorruptStore(
            format!("cannot read {}: {e}", path.display()),
        ),
        other => Error::RedbStorage(other),
    }
}

fn table_error(e: TableError, path: &Path) -> Error {
    match e {
        TableError::Storage(e) => storage_error(e, path),
        TableError::TableDoesNotExist(_)
        | TableError::TableTypeMismatch { .. } => Error::CorruptStore(format!(
            "{}: {e}",
            path.display()
        )),
        other => Error::RedbTable(other),
    }
}

fn write_vectors(
    path: &Path,
    index: &VectorIndex,
    build_id: u64,
) -> Result<()> {
    let header = VectorHeader {
        magic: MAGIC,
        version: FORMAT_VERSION,
        dimension: index.dimension() as u32,
        reserved: 0,
        count: index.len() as u64,
        build_id,
    };

    let data = index.raw_vectors();
    let mut bytes =
        Vec::with_capacity(HEADER_SIZE + std::mem::size_of_val(data));
    bytes.extend_from_slice(bytemuck::bytes_of(&header));
    bytes.extend_from_slice(bytemuck::cast_slice(data));

    std::fs::write(path, bytes)?;
    Ok(())
}

fn read_vectors(path: &Path) -> Result<(VectorHeader, Vec<f32>)> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < HEADER_SIZE {
        return Err(Error::CorruptStore(format!(
            "{} is too short for a header",
            path.display()
        )));
    }

    let header: VectorHeader =
        bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
    if header.magic != MAGIC {
        return Err(Error::CorruptStore(format!(
            "{} is not a vector file",
            path.display()
        )));
    }
    if header.version != FORMAT_VERSION {
        return Err(Error::CorruptStore(format!(
            "unsupported vector file version {}",
            header.version
        )));
    }

    let expected_len = (header.count as usize)
        .checked_mul(header.dimension as usize)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(HEADER_SIZE));
    if expected_len != Some(bytes.len()) {
        return Err(Error::CorruptStore(format!(
            "{} has {} byte(s), header promises {} vector(s) of dimension {}",
            path.display(),
            bytes.len(),
            header.count,
            header.dimension
        )));
    }

    // The body is not guaranteed to be 4-byte aligned, so decode per value.
    let data = bytes[HEADER_SIZE..]
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok((header, data))
}

impl std::fmt::Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} chunk(s), dimension {})",
            self.root.display(),
            self.index.len(),
            self.index.dimension()
        )
    }
}
