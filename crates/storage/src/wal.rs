// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A length-agnostic, newline-delimited JSON write-ahead log. One line per
//! [`WalEntry`]. Kept synchronous and wrapped behind a mutex by callers —
//! every call is a small, bounded file operation so there's no value in
//! making this async itself.

use crate::event::{StorageEvent, WalEntry};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct Wal {
    path: PathBuf,
    file: File,
    write_seq: u64,
    processed_seq: u64,
}

impl Wal {
    /// Opens (creating if absent) the log at `path`. `processed_seq` seeds
    /// the cursor for [`Wal::next_unprocessed`] — callers pass the sequence
    /// number recorded by their last snapshot so replay resumes after it.
    /// If the tail of the file is corrupt, the valid prefix is kept and the
    /// original file is preserved alongside as a rotated `.bak`.
    pub fn open(path: impl AsRef<Path>, processed_seq: u64) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (valid_entries, corrupt) = Self::read_valid_prefix(&path)?;

        if corrupt {
            Self::rotate_backup(&path)?;
            let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&path)?;
            for entry in &valid_entries {
                writeln!(file, "{}", serde_json::to_string(entry)?)?;
            }
            file.flush()?;
        }

        let write_seq = valid_entries.last().map(|e| e.seq).unwrap_or(0);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self { path, file, write_seq, processed_seq })
    }

    fn read_valid_prefix(path: &Path) -> io::Result<(Vec<WalEntry>, bool)> {
        if !path.exists() {
            return Ok((Vec::new(), false));
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut corrupt = false;
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => {
                    corrupt = true;
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(_) => {
                    corrupt = true;
                    break;
                }
            }
        }
        Ok((entries, corrupt))
    }

    fn rotate_backup(path: &Path) -> io::Result<()> {
        let mut candidate = path.with_extension("wal.bak");
        let mut n = 1;
        while candidate.exists() {
            candidate = path.with_extension(format!("wal.bak.{n}"));
            n += 1;
        }
        std::fs::copy(path, &candidate)?;
        tracing::warn!(path = %path.display(), backup = %candidate.display(), "corrupt WAL tail rotated to backup");
        Ok(())
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    pub fn append(&mut self, event: &StorageEvent) -> io::Result<u64> {
        self.write_seq += 1;
        let entry = WalEntry { seq: self.write_seq, event: event.clone() };
        writeln!(self.file, "{}", serde_json::to_string(&entry)?)?;
        Ok(entry.seq)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }

    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = self.processed_seq.max(seq);
    }

    /// Returns the next entry past `processed_seq`, without advancing the
    /// cursor — callers call [`Wal::mark_processed`] once they've durably
    /// applied it.
    pub fn next_unprocessed(&self) -> io::Result<Option<WalEntry>> {
        Ok(self.entries_after(self.processed_seq)?.into_iter().next())
    }

    /// All entries with `seq > after`, in order. Stops (rather than erroring)
    /// at the first corrupt line, since `open` already normalized the file
    /// to its valid prefix — any corruption past that point means a
    /// concurrent writer raced us.
    pub fn entries_after(&self, after: u64) -> io::Result<Vec<WalEntry>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let mut out = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(line) {
                Ok(entry) if entry.seq > after => out.push(entry),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        Ok(out)
    }

    /// Rewrites the log keeping only entries with `seq >= floor`, called
    /// after a snapshot makes everything before it redundant.
    pub fn truncate_before(&mut self, floor: u64) -> io::Result<()> {
        let keep = self.entries_after(floor.saturating_sub(1))?;
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
        for entry in &keep {
            writeln!(file, "{}", serde_json::to_string(entry)?)?;
        }
        file.flush()?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe80_core::{ChatMessage, Provider};

    fn test_event(id: &str) -> StorageEvent {
        StorageEvent::WorktreeMessageAppended {
            worktree_id: "main".into(),
            message: ChatMessage::user(id, "hi", Provider::Codex, 1),
        }
    }

    #[test]
    fn append_assigns_monotonic_seq() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let mut wal = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.append(&test_event("m1")).unwrap(), 1);
        assert_eq!(wal.append(&test_event("m2")).unwrap(), 2);
    }

    #[test]
    fn reopen_resumes_from_processed_seq() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wal");
        {
            let mut wal = Wal::open(&path, 0).unwrap();
            wal.append(&test_event("m1")).unwrap();
            wal.append(&test_event("m2")).unwrap();
            wal.flush().unwrap();
        }
        let wal = Wal::open(&path, 1).unwrap();
        assert_eq!(wal.write_seq(), 2);
        let pending = wal.next_unprocessed().unwrap().unwrap();
        assert_eq!(pending.seq, 2);
    }

    #[test]
    fn corrupt_tail_is_rotated_and_valid_prefix_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wal");
        {
            let mut wal = Wal::open(&path, 0).unwrap();
            wal.append(&test_event("m1")).unwrap();
            wal.flush().unwrap();
        }
        let mut raw = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(raw, "{{not valid json").unwrap();

        let wal = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.write_seq(), 1);
        assert!(path.with_extension("wal.bak").exists());
    }
}
