use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::{StoreError, StoreResult};
use crate::record::Commit;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Flush/sync strategy for the commit log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every commit (safest, highest latency).
    EveryWrite,
    /// Flush to the OS page cache only (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for the [`FileBackend`].
#[derive(Clone, Debug, Default)]
pub struct FileBackendConfig {
    pub sync_mode: SyncMode,
    /// Open without ever writing: appends fail and torn tails are left alone.
    pub read_only: bool,
}

/// Open append handle for one store's log.
struct LogWriter {
    writer: BufWriter<File>,
    /// Current end of the log file.
    offset: u64,
}

/// Result of scanning a log file.
struct ScannedLog {
    commits: Vec<Commit>,
    /// Bytes covered by complete, verified frames.
    valid_len: u64,
    file_len: u64,
}

/// Append-only, crash-recoverable commit log on the local file system.
///
/// Each store lives in `<root>/<name>.log`. A commit is serialized with
/// bincode and framed as:
///
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized Commit)]
/// ```
///
/// On load the file is read front to back. An incomplete frame at the end is
/// a torn write from a crash: it is dropped and the file truncated back to
/// the last complete frame. A bad frame followed by more data is corruption
/// and fails the load.
pub struct FileBackend {
    root: PathBuf,
    config: FileBackendConfig,
    writers: Mutex<HashMap<String, LogWriter>>,
}

impl FileBackend {
    /// Open (or create) a backend rooted at the given directory.
    pub fn open(root: &Path, config: FileBackendConfig) -> StoreResult<Self> {
        if config.read_only {
            if !fs::metadata(root)?.is_dir() {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} is not a directory", root.display()),
                )));
            }
        } else {
            fs::create_dir_all(root)?;
        }

        debug!(root = %root.display(), read_only = config.read_only, "file backend opened");
        Ok(Self {
            root: root.to_path_buf(),
            config,
            writers: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the log file backing the named store.
    pub fn log_path(&self, store: &str) -> PathBuf {
        self.root.join(format!("{store}.log"))
    }

    fn scan(&self, store: &str) -> StoreResult<ScannedLog> {
        let data = match fs::read(self.log_path(store)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(ScannedLog {
                    commits: Vec::new(),
                    valid_len: 0,
                    file_len: 0,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let file_len = data.len() as u64;
        let mut commits = Vec::new();
        let mut offset = 0usize;

        while offset + HEADER_SIZE <= data.len() {
            let length = u32::from_le_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]) as usize;
            let expected_crc = u32::from_le_bytes([
                data[offset + 4],
                data[offset + 5],
                data[offset + 6],
                data[offset + 7],
            ]);

            if length == 0 {
                return Err(StoreError::CorruptLog {
                    store: store.to_string(),
                    offset: offset as u64,
                    reason: "zero-length frame".to_string(),
                });
            }
            let end = offset + HEADER_SIZE + length;
            if end > data.len() {
                warn!(store, offset, length, file_len, "incomplete log frame; stopping recovery");
                break;
            }

            let payload = &data[offset + HEADER_SIZE..end];
            let actual_crc = crc32fast::hash(payload);
            if actual_crc != expected_crc {
                if end == data.len() {
                    warn!(store, offset, "CRC mismatch on final frame; treating as torn write");
                    break;
                }
                return Err(StoreError::CorruptLog {
                    store: store.to_string(),
                    offset: offset as u64,
                    reason: format!("CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"),
                });
            }

            let commit = Commit::decode(payload).map_err(|e| StoreError::CorruptLog {
                store: store.to_string(),
                offset: offset as u64,
                reason: e.to_string(),
            })?;
            commits.push(commit);
            offset = end;
        }

        Ok(ScannedLog {
            commits,
            valid_len: offset as u64,
            file_len,
        })
    }

    fn truncate_to(&self, store: &str, len: u64) -> StoreResult<()> {
        let mut writers = self.writers.lock().expect("writer mutex poisoned");
        writers.remove(store);
        let file = OpenOptions::new().write(true).open(self.log_path(store))?;
        file.set_len(len)?;
        file.sync_all()?;
        Ok(())
    }

    fn open_writer(&self, store: &str) -> StoreResult<LogWriter> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(store))?;
        let offset = file.metadata()?.len();
        Ok(LogWriter {
            writer: BufWriter::new(file),
            offset,
        })
    }

    fn write_frame(&self, w: &mut LogWriter, payload: &[u8]) -> io::Result<()> {
        let length = payload.len() as u32;
        let crc = crc32fast::hash(payload);
        w.writer.write_all(&length.to_le_bytes())?;
        w.writer.write_all(&crc.to_le_bytes())?;
        w.writer.write_all(payload)?;
        w.writer.flush()?;
        if matches!(self.config.sync_mode, SyncMode::EveryWrite) {
            w.writer.get_ref().sync_all()?;
        }
        Ok(())
    }
}

fn encode_frame(commit: &Commit) -> StoreResult<Vec<u8>> {
    let payload = commit.encode()?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization(format!("commit too large: {} bytes", payload.len())))?;
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

impl Backend for FileBackend {
    fn load(&self, store: &str) -> StoreResult<Vec<Commit>> {
        let scanned = self.scan(store)?;
        if scanned.valid_len < scanned.file_len && !self.config.read_only {
            warn!(
                store,
                valid_len = scanned.valid_len,
                file_len = scanned.file_len,
                "truncating torn tail of commit log"
            );
            self.truncate_to(store, scanned.valid_len)?;
        }
        debug!(store, commits = scanned.commits.len(), "commit log loaded");
        Ok(scanned.commits)
    }

    fn append(&self, store: &str, commit: &Commit) -> StoreResult<()> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }
        let payload = commit.encode()?;
        if u32::try_from(payload.len()).is_err() {
            return Err(StoreError::Serialization(format!(
                "commit too large: {} bytes",
                payload.len()
            )));
        }

        let mut writers = self.writers.lock().expect("writer mutex poisoned");
        if !writers.contains_key(store) {
            let writer = self.open_writer(store)?;
            writers.insert(store.to_string(), writer);
        }
        let Some(w) = writers.get_mut(store) else {
            return Err(StoreError::Io(io::Error::other("log writer missing")));
        };
        let entry_offset = w.offset;

        if let Err(e) = self.write_frame(w, &payload) {
            // Roll the file back so a half-written frame never reaches the log.
            writers.remove(store);
            if let Ok(file) = OpenOptions::new().write(true).open(self.log_path(store)) {
                let _ = file.set_len(entry_offset);
            }
            return Err(e.into());
        }

        w.offset += (HEADER_SIZE + payload.len()) as u64;
        debug!(store, offset = entry_offset, len = payload.len(), "commit appended");
        Ok(())
    }

    fn replace(&self, store: &str, commits: &[Commit]) -> StoreResult<()> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }
        let mut writers = self.writers.lock().expect("writer mutex poisoned");
        writers.remove(store);

        let tmp_path = self.root.join(format!("{store}.log.tmp"));
        {
            let mut tmp = BufWriter::new(File::create(&tmp_path)?);
            for commit in commits {
                tmp.write_all(&encode_frame(commit)?)?;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, self.log_path(store))?;

        debug!(store, commits = commits.len(), "commit log replaced");
        Ok(())
    }

    fn exists(&self, store: &str) -> StoreResult<bool> {
        match fs::metadata(self.log_path(store)) {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    use crate::record::Mutation;

    fn commit(version: u32) -> Commit {
        Commit::new(vec![Mutation::SetVersion(version)])
    }

    fn temp_backend() -> (tempfile::TempDir, FileBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path(), FileBackendConfig::default()).unwrap();
        (dir, backend)
    }

    #[test]
    fn append_and_load_roundtrip() {
        let (_dir, backend) = temp_backend();
        backend.append("Notes", &commit(1)).unwrap();
        backend.append("Notes", &commit(2)).unwrap();
        backend.append("Notes", &commit(3)).unwrap();

        let loaded = backend.load("Notes").unwrap();
        assert_eq!(loaded, vec![commit(1), commit(2), commit(3)]);
    }

    #[test]
    fn missing_store_loads_empty() {
        let (_dir, backend) = temp_backend();
        assert!(backend.load("Notes").unwrap().is_empty());
        assert!(!backend.exists("Notes").unwrap());
    }

    #[test]
    fn log_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = FileBackend::open(dir.path(), FileBackendConfig::default()).unwrap();
            backend.append("Notes", &commit(1)).unwrap();
        }
        let backend = FileBackend::open(dir.path(), FileBackendConfig::default()).unwrap();
        assert_eq!(backend.load("Notes").unwrap(), vec![commit(1)]);
        assert!(backend.exists("Notes").unwrap());
    }

    #[test]
    fn torn_tail_is_truncated_and_log_stays_appendable() {
        let (_dir, backend) = temp_backend();
        backend.append("Notes", &commit(1)).unwrap();
        backend.append("Notes", &commit(2)).unwrap();
        let path = backend.log_path("Notes");
        let full_len = fs::metadata(&path).unwrap().len();

        // Simulate a crash mid-write by chopping the last frame.
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(full_len - 3)
            .unwrap();

        let reopened = FileBackend::open(backend.root(), FileBackendConfig::default()).unwrap();
        assert_eq!(reopened.load("Notes").unwrap(), vec![commit(1)]);
        assert!(fs::metadata(&path).unwrap().len() < full_len - 3);

        reopened.append("Notes", &commit(4)).unwrap();
        assert_eq!(reopened.load("Notes").unwrap(), vec![commit(1), commit(4)]);
    }

    #[test]
    fn corruption_before_the_tail_fails_the_load() {
        let (_dir, backend) = temp_backend();
        backend.append("Notes", &commit(1)).unwrap();
        backend.append("Notes", &commit(2)).unwrap();
        let path = backend.log_path("Notes");

        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            file.write_all(&buf).unwrap();
            file.sync_all().unwrap();
        }

        let reopened = FileBackend::open(backend.root(), FileBackendConfig::default()).unwrap();
        let err = reopened.load("Notes").unwrap_err();
        assert!(matches!(err, StoreError::CorruptLog { offset: 0, .. }));
    }

    #[test]
    fn zeroed_header_fails_the_load_and_keeps_the_log() {
        let (_dir, backend) = temp_backend();
        for v in 1..=3 {
            backend.append("Notes", &commit(v)).unwrap();
        }
        let path = backend.log_path("Notes");
        let len_before = fs::metadata(&path).unwrap().len();

        {
            let mut file = OpenOptions::new().write(true).open(&path).unwrap();
            file.write_all(&[0u8; HEADER_SIZE]).unwrap();
            file.sync_all().unwrap();
        }

        let reopened = FileBackend::open(backend.root(), FileBackendConfig::default()).unwrap();
        let err = reopened.load("Notes").unwrap_err();
        assert!(matches!(err, StoreError::CorruptLog { offset: 0, .. }));
        assert_eq!(fs::metadata(&path).unwrap().len(), len_before);
    }

    #[test]
    fn read_only_rejects_writes() {
        let (dir, backend) = temp_backend();
        backend.append("Notes", &commit(1)).unwrap();

        let config = FileBackendConfig {
            read_only: true,
            ..Default::default()
        };
        let ro = FileBackend::open(dir.path(), config).unwrap();
        assert_eq!(ro.load("Notes").unwrap(), vec![commit(1)]);
        assert!(matches!(ro.append("Notes", &commit(2)), Err(StoreError::ReadOnly)));
        assert!(matches!(ro.replace("Notes", &[]), Err(StoreError::ReadOnly)));
    }

    #[test]
    fn read_only_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileBackendConfig {
            read_only: true,
            ..Default::default()
        };
        assert!(FileBackend::open(&dir.path().join("absent"), config).is_err());
    }

    #[test]
    fn root_that_is_a_file_cannot_be_opened() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let err = FileBackend::open(&blocker, FileBackendConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn replace_rewrites_log() {
        let (_dir, backend) = temp_backend();
        backend.append("Notes", &commit(1)).unwrap();
        backend.append("Notes", &commit(2)).unwrap();
        backend.replace("Notes", &[commit(9)]).unwrap();
        assert_eq!(backend.load("Notes").unwrap(), vec![commit(9)]);

        // The cached writer was dropped, so appends land after the new log.
        backend.append("Notes", &commit(10)).unwrap();
        assert_eq!(backend.load("Notes").unwrap(), vec![commit(9), commit(10)]);
        assert!(!backend.root().join("Notes.log.tmp").exists());
    }

    #[test]
    fn sync_every_write_mode() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileBackendConfig {
            sync_mode: SyncMode::EveryWrite,
            ..Default::default()
        };
        let backend = FileBackend::open(dir.path(), config).unwrap();
        backend.append("Notes", &commit(1)).unwrap();
        assert_eq!(backend.load("Notes").unwrap().len(), 1);
    }

    #[test]
    fn frame_layout() {
        let frame = encode_frame(&commit(1)).unwrap();
        let length = u32::from_le_bytes(frame[0..4].try_into().unwrap()) as usize;
        assert_eq!(frame.len(), HEADER_SIZE + length);
        let crc = u32::from_le_bytes(frame[4..8].try_into().unwrap());
        assert_eq!(crc, crc32fast::hash(&frame[HEADER_SIZE..]));
    }
}
