use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, ParseError, Result};

use super::element::ImapString;

/// File name prefix of every spooled literal, used by [`sweep_orphans`].
pub const SPOOL_FILE_PREFIX: &str = "imap-literal-";
const SPOOL_FILE_SUFFIX: &str = ".tmp";
const CREATE_ATTEMPTS: usize = 16;

/// Decides where a literal of a given length lives, and owns the directory that file-backed
/// literals are spooled into.
///
/// A literal whose declared length is at most `threshold` bytes is kept in memory; anything larger
/// is streamed into a uniquely named file under `dir` and never held in memory as a whole.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiteralSpool {
    threshold: usize,
    dir: PathBuf,
}

impl LiteralSpool {
    /// Make a new spool with the given in-memory threshold and temporary directory.
    pub fn new(threshold: usize, dir: impl Into<PathBuf>) -> Self {
        LiteralSpool {
            threshold,
            dir: dir.into(),
        }
    }

    /// The largest literal, in bytes, that is kept in memory.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// The directory file literals are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read exactly `len` bytes from `reader` into a literal.
    ///
    /// The memory/file decision is made from `len` alone, before any byte is read.
    pub(crate) fn read_literal<R: Read>(&self, reader: &mut R, len: u64) -> Result<ImapString> {
        if len <= self.threshold as u64 {
            let mut buf = vec![0; len as usize];
            reader.read_exact(&mut buf).map_err(literal_read_error)?;
            return Ok(ImapString::MemoryLiteral(buf));
        }

        let (file, path) = self.create_file()?;
        match spool_into(reader, file, len) {
            Ok(()) => Ok(ImapString::FileLiteral(FileLiteral::new(path, len))),
            Err(e) => {
                if let Err(rm) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %rm, "failed to remove partial literal");
                }
                Err(e)
            }
        }
    }

    fn create_file(&self) -> Result<(File, PathBuf)> {
        let mut last_err = None;
        for _ in 0..CREATE_ATTEMPTS {
            let path = self.dir.join(format!(
                "{}{:016x}{}",
                SPOOL_FILE_PREFIX,
                rand::random::<u64>(),
                SPOOL_FILE_SUFFIX
            ));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((file, path)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_err = Some(e),
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Err(Error::Io(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AlreadyExists, "no unique spool file name")
        })))
    }
}

fn spool_into<R: Read>(reader: &mut R, file: File, len: u64) -> Result<()> {
    let mut out = BufWriter::new(file);
    let copied = io::copy(&mut reader.by_ref().take(len), &mut out)?;
    if copied < len {
        return Err(Error::Parse(ParseError::UnexpectedEnd));
    }
    out.flush()?;
    Ok(())
}

fn literal_read_error(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Parse(ParseError::UnexpectedEnd)
    } else {
        Error::Io(e)
    }
}

/// A literal whose bytes live in a temporary file owned exclusively by this value.
///
/// The file is deleted by [`FileLiteral::release`]; releasing twice is a no-op. Dropping an
/// unreleased literal also deletes the file and logs a warning, but that is a safety net only:
/// whoever retires the owning [`Response`](crate::types::Response) is expected to release it.
#[derive(Debug, PartialEq, Eq)]
pub struct FileLiteral {
    path: PathBuf,
    len: u64,
    released: bool,
}

impl FileLiteral {
    fn new(path: PathBuf, len: u64) -> Self {
        FileLiteral {
            path,
            len,
            released: false,
        }
    }

    /// Number of bytes in the literal.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the literal holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Location of the spool file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`release`](Self::release) has already run.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Open the spooled bytes for reading.
    pub fn open(&self) -> io::Result<File> {
        if self.released {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "file literal already released",
            ));
        }
        File::open(&self.path)
    }

    /// Read the whole literal into memory.
    pub fn read_to_vec(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.len as usize);
        self.open()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Delete the spool file.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to delete file literal")
            }
        }
    }
}

impl Drop for FileLiteral {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(path = %self.path.display(), "file literal dropped without release");
            self.release();
        }
    }
}

/// Delete spool files left behind in `dir`, for example by a crashed process.
///
/// This is not part of normal resource management and must not run while responses that own file
/// literals in `dir` are still alive. Returns the number of files removed.
pub fn sweep_orphans(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with(SPOOL_FILE_PREFIX) && name.ends_with(SPOOL_FILE_SUFFIX)) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "failed to sweep literal")
            }
        }
    }
    if removed > 0 {
        tracing::debug!(removed, dir = %dir.display(), "swept orphaned file literals");
    }
    Ok(removed)
}
