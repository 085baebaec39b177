//! Size-rotated log file writer.
//!
//! [`RotatingFile`] implements [`MakeWriter`] so it can back a
//! `tracing-subscriber` fmt layer. Each formatted record arrives as one
//! write; before it is appended, the file is rolled over if the record
//! would push it past `max_bytes`:
//!
//! ```text
//! app.log.4 -> app.log.5   (app.log.5 is dropped first)
//! ...
//! app.log   -> app.log.1
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

/// Default rollover threshold: 5 MiB.
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;
/// Default number of rotated files kept next to the active one.
pub const DEFAULT_BACKUP_COUNT: usize = 5;

/// Shared handle to a size-rotated log file.
#[derive(Clone)]
pub struct RotatingFile {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    file: Option<File>,
    size: u64,
}

impl RotatingFile {
    /// Open (or create) the active log file, creating its directory.
    ///
    /// A `max_bytes` of zero disables rotation.
    pub fn open(path: &Path, max_bytes: u64, backup_count: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = open_append(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                path: path.to_path_buf(),
                max_bytes,
                backup_count,
                file: Some(file),
                size,
            })),
        })
    }

    /// Path of the active log file.
    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Path of the `n`th rotated file (`app.log.n`).
pub fn backup_path(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Inner {
    fn write_record(&mut self, buf: &[u8]) -> io::Result<()> {
        let len = buf.len() as u64;
        if self.max_bytes > 0 && self.size > 0 && self.size + len > self.max_bytes {
            self.rollover()?;
        }

        if self.file.is_none() {
            self.file = Some(open_append(&self.path)?);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        self.size += len;
        Ok(())
    }

    fn rollover(&mut self) -> io::Result<()> {
        if let Some(mut f) = self.file.take() {
            f.flush()?;
        }

        if self.backup_count > 0 {
            for n in (1..self.backup_count).rev() {
                let src = backup_path(&self.path, n);
                if src.exists() {
                    let dst = backup_path(&self.path, n + 1);
                    if dst.exists() {
                        fs::remove_file(&dst)?;
                    }
                    fs::rename(&src, &dst)?;
                }
            }
            let first = backup_path(&self.path, 1);
            if first.exists() {
                fs::remove_file(&first)?;
            }
            if self.path.exists() {
                fs::rename(&self.path, &first)?;
            }
            self.file = Some(open_append(&self.path)?);
        } else {
            self.file = Some(
                OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&self.path)?,
            );
        }
        self.size = 0;
        Ok(())
    }
}

/// Writer handed out per record; holds the file lock for its lifetime.
pub struct RotatingWriter<'a> {
    guard: MutexGuard<'a, Inner>,
}

impl Write for RotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.write_record(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.guard.file.as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter { guard: self.lock() }
    }
}
