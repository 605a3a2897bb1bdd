use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::MakeWriter;

struct State {
    file: File,
    size: u64,
}

/// Size-capped log file. When the next record would reach `max_bytes`, the
/// file is shifted to `<path>.1`, older backups move up one slot and
/// anything beyond `backups` is discarded.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    state: Mutex<State>,
}

impl RotatingFile {
    /// Creates the parent directory when missing.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            max_bytes,
            backups,
            state: Mutex::new(State { file, size }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rollover(&self, state: &mut State) -> io::Result<()> {
        state.file.flush()?;
        if self.backups > 0 {
            for index in (1..self.backups).rev() {
                let source = self.backup_path(index);
                if source.exists() {
                    let target = self.backup_path(index + 1);
                    if target.exists() {
                        fs::remove_file(&target)?;
                    }
                    fs::rename(&source, &target)?;
                }
            }
            let first = self.backup_path(1);
            if first.exists() {
                fs::remove_file(&first)?;
            }
            fs::rename(&self.path, &first)?;
        }

        state.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        state.size = 0;
        Ok(())
    }

    /// Writes one whole record, rotating first if it would hit the cap.
    pub fn write_record(&self, record: &[u8]) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;

        let incoming = record.len() as u64;
        if self.max_bytes > 0 && state.size > 0 && state.size + incoming >= self.max_bytes {
            self.rollover(&mut state)?;
        }
        state.file.write_all(record)?;
        state.size += incoming;
        Ok(())
    }
}

/// Buffers one formatted event so it never straddles a rotation.
pub struct RecordWriter<'a> {
    target: &'a RotatingFile,
    buffer: Vec<u8>,
}

impl Write for RecordWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let record = std::mem::take(&mut self.buffer);
        self.target.write_record(&record)
    }
}

impl Drop for RecordWriter<'_> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RecordWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RecordWriter {
            target: self,
            buffer: Vec::new(),
        }
    }
}
