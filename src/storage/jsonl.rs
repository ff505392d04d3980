//! Append-only JSONL files.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Result, TandemError};

/// A file holding one JSON record per line. Records are only ever appended.
#[derive(Debug, Clone)]
pub struct JsonlFile<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonlFile<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record and flush it to disk.
    ///
    /// A torn final line left by an earlier crash is cut off first, so the
    /// new record always starts on a line of its own.
    pub fn append(&self, record: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        self.drop_torn_tail(&mut file)?;
        writeln!(file, "{}", line)?;
        file.sync_data()?;
        Ok(())
    }

    fn drop_torn_tail(&self, file: &mut File) -> Result<()> {
        if file.metadata()?.len() == 0 {
            return Ok(());
        }
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] == b'\n' {
            return Ok(());
        }

        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut bytes)?;
        let keep = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        if serde_json::from_slice::<T>(&bytes[keep..]).is_ok() {
            // whole record, only the newline was lost
            file.write_all(b"\n")?;
            return Ok(());
        }
        log::warn!(
            "Dropping {} torn byte(s) at the end of {}",
            bytes.len() - keep,
            self.path.display()
        );
        file.set_len(keep as u64)?;
        Ok(())
    }

    /// Load every record in append order. A missing file is empty.
    ///
    /// A torn final line (crash mid-append) is skipped; corruption anywhere
    /// else is an error.
    pub fn load(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let lines: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;
        let last = lines.iter().rposition(|l| !l.trim().is_empty());

        let mut records = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(_) if Some(i) == last => {
                    log::warn!("Skipping torn last line in {}", self.path.display());
                }
                Err(e) => {
                    return Err(TandemError::Persistence(format!(
                        "{} line {}: {}",
                        self.path.display(),
                        i + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }
}
