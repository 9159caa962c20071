use crate::codec::StoredFields;
use crate::errors::{CinderError, CinderResult, ErrorKind};
use crate::store::{BackendProvider, DocumentKey, MemoryBackend, Mutation};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const LENGTH_PREFIX: usize = 4;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct JournalRecord {
    mutations: Vec<Mutation>,
}

/// Durable backend: an in-memory image rebuilt from an append-only journal.
///
/// Each successful [`BackendProvider::apply`] appends one record holding the
/// whole mutation list, so a list is replayed completely or not at all.
/// Records are a little-endian `u32` length followed by the bincode encoding
/// of the list.
///
/// On open, a truncated final record (a crash mid-append) is discarded and
/// the file is cut back to the last complete record. A complete record that
/// fails to decode means the journal is corrupt and opening fails with
/// [`ErrorKind::CodecError`].
///
/// ```rust,no_run
/// use cinder::store::{BackendProvider, JournalBackend};
///
/// let backend = JournalBackend::open("/tmp/app.journal", true).unwrap();
/// backend.compact().unwrap();
/// backend.close().unwrap();
/// ```
#[derive(Clone)]
pub struct JournalBackend {
    inner: Arc<JournalBackendInner>,
}

struct JournalBackendInner {
    path: PathBuf,
    sync_writes: bool,
    image: MemoryBackend,
    file: Mutex<Option<File>>,
    closed: AtomicBool,
}

impl JournalBackend {
    /// Opens the journal at `path`, creating it if missing, and replays it.
    ///
    /// With `sync_writes` every append is flushed to stable storage before
    /// `apply` returns.
    pub fn open<P: AsRef<Path>>(path: P, sync_writes: bool) -> CinderResult<JournalBackend> {
        let path = path.as_ref().to_path_buf();
        let image = MemoryBackend::new();

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|err| {
                log::error!("Failed to open journal {}: {}", path.display(), err);
                CinderError::new_with_cause(
                    &format!("Failed to open journal {}", path.display()),
                    ErrorKind::IOError,
                    err.into(),
                )
            })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let (records, valid_len) = replay(&bytes, &image)?;
        if valid_len < bytes.len() {
            log::warn!(
                "Discarding {} bytes of truncated journal tail in {}",
                bytes.len() - valid_len,
                path.display()
            );
            file.set_len(valid_len as u64)?;
        }
        log::debug!(
            "Replayed {} journal records ({} documents) from {}",
            records,
            image.len(),
            path.display()
        );

        Ok(JournalBackend {
            inner: Arc::new(JournalBackendInner {
                path,
                sync_writes,
                image,
                file: Mutex::new(Some(file)),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn check_opened(&self) -> CinderResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            log::error!("Journal {} is closed", self.inner.path.display());
            return Err(CinderError::new("Backend is closed", ErrorKind::StoreClosed));
        }
        Ok(())
    }
}

fn encode_record(mutations: &[Mutation]) -> CinderResult<Vec<u8>> {
    let record = JournalRecord {
        mutations: mutations.to_vec(),
    };
    let payload = bincode::serde::encode_to_vec(&record, bincode::config::legacy())?;
    let length = u32::try_from(payload.len()).map_err(|_| {
        CinderError::new("Journal record is too large", ErrorKind::CodecError)
    })?;

    let mut bytes = Vec::with_capacity(LENGTH_PREFIX + payload.len());
    bytes.extend_from_slice(&length.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// What appending a record needs from the journal file.
trait JournalFile: Write {
    fn end(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl JournalFile for File {
    fn end(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

enum AppendError {
    /// The journal was cut back to its length before the append.
    RolledBack(io::Error),
    /// The cut failed as well; the journal may end in a partial record.
    Torn(io::Error),
}

/// Appends one encoded record. A failed write or sync removes whatever part
/// of the record reached the file, so the next append starts on a record
/// boundary.
fn append_record<F: JournalFile>(file: &mut F, record: &[u8], sync: bool) -> Result<(), AppendError> {
    let end = file.end().map_err(AppendError::RolledBack)?;
    let written = file
        .write_all(record)
        .and_then(|_| if sync { file.sync() } else { Ok(()) });

    match written {
        Ok(()) => Ok(()),
        Err(err) => match file.truncate(end) {
            Ok(()) => Err(AppendError::RolledBack(err)),
            Err(rollback) => {
                log::error!("Failed to roll back partial journal record: {}", rollback);
                Err(AppendError::Torn(err))
            }
        },
    }
}

/// Applies every complete record to `image`. Returns the record count and
/// the byte length of the complete prefix.
fn replay(bytes: &[u8], image: &MemoryBackend) -> CinderResult<(usize, usize)> {
    let mut offset = 0;
    let mut records = 0;

    while bytes.len() - offset >= LENGTH_PREFIX {
        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&bytes[offset..offset + LENGTH_PREFIX]);
        let length = u32::from_le_bytes(prefix) as usize;

        let start = offset + LENGTH_PREFIX;
        if bytes.len() - start < length {
            break;
        }

        let (record, _): (JournalRecord, usize) =
            bincode::serde::decode_from_slice(&bytes[start..start + length], bincode::config::legacy())
                .map_err(|err| {
                    log::error!("Corrupt journal record at offset {}: {}", offset, err);
                    CinderError::new(
                        &format!("Corrupt journal record at offset {}", offset),
                        ErrorKind::CodecError,
                    )
                })?;

        image.apply_unchecked(&record.mutations);
        records += 1;
        offset = start + length;
    }
    Ok((records, offset))
}

impl BackendProvider for JournalBackend {
    fn get(&self, key: &DocumentKey) -> CinderResult<Option<StoredFields>> {
        self.check_opened()?;
        self.inner.image.get(key)
    }

    fn scan(&self, collection: &str) -> CinderResult<Vec<(String, StoredFields)>> {
        self.check_opened()?;
        self.inner.image.scan(collection)
    }

    fn apply(&self, mutations: &[Mutation]) -> CinderResult<()> {
        self.check_opened()?;
        if mutations.is_empty() {
            return Ok(());
        }
        let record = encode_record(mutations)?;

        let mut file_guard = self.inner.file.lock();
        let file = file_guard.as_mut().ok_or_else(|| {
            CinderError::new("Journal is closed or no longer writable", ErrorKind::StoreClosed)
        })?;

        let appended = append_record(file, &record, self.inner.sync_writes);
        if let Err(failure) = appended {
            let err = match failure {
                AppendError::RolledBack(err) => err,
                AppendError::Torn(err) => {
                    // refuse further appends until compact rewrites the journal
                    *file_guard = None;
                    err
                }
            };
            log::error!("Failed to append to journal {}: {}", self.inner.path.display(), err);
            return Err(CinderError::new_with_cause(
                "Failed to append to journal",
                ErrorKind::IOError,
                err.into(),
            ));
        }

        // the image is only updated once the record is in the journal
        self.inner.image.apply(mutations)
    }

    /// Rewrites the journal as a single record holding the current state.
    ///
    /// The new journal is written to a sibling temporary file and renamed
    /// over the old one, so a crash leaves one of the two complete.
    fn compact(&self) -> CinderResult<()> {
        self.check_opened()?;
        let mut file_guard = self.inner.file.lock();

        let mutations: Vec<Mutation> = self
            .inner
            .image
            .snapshot()
            .into_iter()
            .map(|(key, fields)| Mutation::Put { key, fields })
            .collect();

        let mut temp_path = self.inner.path.clone().into_os_string();
        temp_path.push(".compact");
        let temp_path = PathBuf::from(temp_path);

        {
            let mut temp = File::create(&temp_path)?;
            if !mutations.is_empty() {
                temp.write_all(&encode_record(&mutations)?)?;
            }
            temp.sync_all()?;
        }
        std::fs::rename(&temp_path, &self.inner.path)?;

        let file = OpenOptions::new().append(true).open(&self.inner.path)?;
        *file_guard = Some(file);
        log::debug!(
            "Compacted journal {} to {} documents",
            self.inner.path.display(),
            mutations.len()
        );
        Ok(())
    }

    fn close(&self) -> CinderResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut file_guard = self.inner.file.lock();
        if let Some(file) = file_guard.take() {
            file.sync_all()?;
        }
        self.inner.image.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}
