//! Durable session state on disk.
//!
//! The state blob is opaque: whatever the session backend serialized is
//! written byte-for-byte and handed back unchanged on the next start.
//! Writes go to a sibling temp file first and are then renamed over the
//! canonical file, so the canonical file is never seen half-written.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default save interval.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(10);

/// Errors from reading or writing the state file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("state file truncated: read {read} of {expected} bytes")]
    Truncated { expected: usize, read: usize },

    #[error("state file is empty")]
    Empty,
}

impl StoreError {
    fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The state file and its temp sibling.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl StateStore {
    /// Store at `path`; the temp file is `path` with `.tmp` appended.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp: OsString = path.as_os_str().to_owned();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Read the whole state file.
    ///
    /// `Ok(None)` when the file does not exist (first run). A read that
    /// hits end-of-file before the size reported by the filesystem is
    /// reported as [`StoreError::Truncated`].
    pub fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io("open", &self.path, e)),
        };

        let declared = file
            .metadata()
            .map_err(|e| StoreError::io("stat", &self.path, e))?
            .len() as usize;
        if declared == 0 {
            return Err(StoreError::Empty);
        }

        let buf = read_declared(&mut file, declared, &self.path)?;

        tracing::debug!(bytes = buf.len(), path = %self.path.display(), "state loaded");
        Ok(Some(buf))
    }

    /// Atomically replace the state file with `blob`.
    ///
    /// Returns `Ok(false)` without touching the disk when `blob` is empty.
    pub fn save(&self, blob: &[u8]) -> Result<bool, StoreError> {
        if blob.is_empty() {
            return Ok(false);
        }
        self.write_temp(blob)?;
        self.commit()?;
        tracing::debug!(bytes = blob.len(), path = %self.path.display(), "state saved");
        Ok(true)
    }

    /// Write `blob` to the temp path and fsync it.
    pub(crate) fn write_temp(&self, blob: &[u8]) -> Result<(), StoreError> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&self.tmp_path)
            .map_err(|e| StoreError::io("open", &self.tmp_path, e))?;
        file.write_all(blob)
            .map_err(|e| StoreError::io("write", &self.tmp_path, e))?;
        file.sync_all()
            .map_err(|e| StoreError::io("fsync", &self.tmp_path, e))?;
        Ok(())
    }

    /// Rename the temp file over the canonical path.
    pub(crate) fn commit(&self) -> Result<(), StoreError> {
        fs::rename(&self.tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&self.tmp_path);
            StoreError::io("rename", &self.tmp_path, e)
        })
    }
}

/// Read exactly `declared` bytes, retrying short and interrupted reads.
///
/// A zero-byte read before `declared` means the file shrank under us.
fn read_declared(
    reader: &mut impl Read,
    declared: usize,
    path: &Path,
) -> Result<Vec<u8>, StoreError> {
    let mut buf = vec![0u8; declared];
    let mut nread = 0;
    while nread < declared {
        match reader.read(&mut buf[nread..]) {
            Ok(0) => {
                return Err(StoreError::Truncated {
                    expected: declared,
                    read: nread,
                })
            }
            Ok(n) => nread += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StoreError::io("read", path, e)),
        }
    }
    Ok(buf)
}

/// Decides when the next save is due.
///
/// The interval runs from the last *attempted* save, so a failing disk
/// is retried at the normal pace rather than on every iteration.
#[derive(Debug, Clone)]
pub struct SaveSchedule {
    interval: Duration,
    last_attempt: Option<Instant>,
}

impl SaveSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
        }
    }

    /// True when no save was attempted yet or the interval has elapsed.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_attempt {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        }
    }

    pub fn mark_attempted(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }
}

impl Default for SaveSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("groupbot.data"))
    }

    #[test]
    fn tmp_path_is_sibling() {
        let store = StateStore::new("/var/lib/ngb/groupbot.data");
        assert_eq!(
            store.tmp_path(),
            Path::new("/var/lib/ngb/groupbot.data.tmp")
        );
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let blob: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();

        assert!(store.save(&blob).unwrap());
        assert_eq!(store.load().unwrap().unwrap(), blob);
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn save_empty_blob_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store.save(&[]).unwrap());
        assert!(!store.path().exists());
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn shorter_save_replaces_longer_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&[7u8; 512]).unwrap();
        store.save(&[1, 2, 3]).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn crash_before_rename_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(b"snapshot-1").unwrap();

        // Temp file written, process dies before the rename.
        store.write_temp(b"snapshot-2-partial").unwrap();

        assert_eq!(store.load().unwrap().unwrap(), b"snapshot-1");
        assert!(store.tmp_path().exists());

        // The next save overwrites the stray temp file.
        store.save(b"snapshot-3").unwrap();
        assert_eq!(store.load().unwrap().unwrap(), b"snapshot-3");
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn load_empty_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), b"").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Empty)));
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("missing").join("groupbot.data"));
        let err = store.save(b"state").unwrap_err();
        assert!(matches!(err, StoreError::Io { op: "open", .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(b"secret keys").unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    /// Hands out at most `chunk` bytes per read, failing once with
    /// `interrupt_once` first.
    struct ChoppyReader {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        interrupt_once: Option<io::ErrorKind>,
    }

    impl ChoppyReader {
        fn new(data: &[u8], chunk: usize) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                chunk,
                interrupt_once: None,
            }
        }
    }

    impl Read for ChoppyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if let Some(kind) = self.interrupt_once.take() {
                return Err(io::Error::from(kind));
            }
            let n = buf.len().min(self.chunk).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn read_declared_joins_short_reads() {
        let mut reader = ChoppyReader::new(b"0123456789", 3);
        let buf = read_declared(&mut reader, 10, Path::new("state")).unwrap();
        assert_eq!(buf, b"0123456789");
    }

    #[test]
    fn read_declared_eof_before_size_is_truncated() {
        let mut reader = ChoppyReader::new(b"0123", 3);
        let err = read_declared(&mut reader, 10, Path::new("state")).unwrap_err();
        assert!(
            matches!(err, StoreError::Truncated { expected: 10, read: 4 }),
            "{err}"
        );
    }

    #[test]
    fn read_declared_retries_interrupted() {
        let mut reader = ChoppyReader::new(b"abcdef", 4);
        reader.interrupt_once = Some(io::ErrorKind::Interrupted);
        let buf = read_declared(&mut reader, 6, Path::new("state")).unwrap();
        assert_eq!(buf, b"abcdef");
    }

    #[test]
    fn read_declared_other_errors_are_io() {
        let mut reader = ChoppyReader::new(b"abcdef", 4);
        reader.interrupt_once = Some(io::ErrorKind::PermissionDenied);
        let err = read_declared(&mut reader, 6, Path::new("state")).unwrap_err();
        assert!(matches!(err, StoreError::Io { op: "read", .. }), "{err}");
    }

    #[test]
    fn schedule_first_check_is_due() {
        let schedule = SaveSchedule::default();
        assert!(schedule.is_due(Instant::now()));
    }

    #[test]
    fn schedule_waits_full_interval_after_attempt() {
        let mut schedule = SaveSchedule::new(Duration::from_secs(10));
        let start = Instant::now();
        schedule.mark_attempted(start);

        assert!(!schedule.is_due(start));
        assert!(!schedule.is_due(start + Duration::from_secs(10)));
        assert!(schedule.is_due(start + Duration::from_secs(11)));
    }
}
