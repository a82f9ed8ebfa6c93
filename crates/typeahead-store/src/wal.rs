#![allow(clippy::cast_possible_truncation)]
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

const WAL_MAGIC: u8 = 0xFE;

/// Durability mode for the write-ahead log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncMode {
    /// Fsync every write. Durability: max, speed: low.
    Strict,
    /// Flush to the OS page cache only. Durability: medium, speed: max.
    Async,
}

/// Appends connection writes to a log file ahead of applying them in memory, with CRC32
/// checksums so a torn write at the tail of the file is detected and truncated on replay
/// instead of poisoning the in-memory state.
#[derive(Debug)]
pub struct Wal {
    file: BufWriter<File>,
    mode: WalSyncMode,
}

/// A single durable operation against the adjacency store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalEntry {
    SetWeight {
        source: u32,
        target: u32,
        strength: i64,
        timestamp: i64,
    },
    Remove {
        source: u32,
        target: u32,
        timestamp: i64,
    },
}

impl Wal {
    pub fn open(path: &Path, mode: WalSyncMode) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: BufWriter::new(file),
            mode,
        })
    }

    fn serialize(entry: &WalEntry) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        match *entry {
            WalEntry::SetWeight {
                source,
                target,
                strength,
                timestamp,
            } => {
                buf.write_u8(1)?;
                buf.write_u32::<LittleEndian>(source)?;
                buf.write_u32::<LittleEndian>(target)?;
                buf.write_i64::<LittleEndian>(strength)?;
                buf.write_i64::<LittleEndian>(timestamp)?;
            }
            WalEntry::Remove {
                source,
                target,
                timestamp,
            } => {
                buf.write_u8(2)?;
                buf.write_u32::<LittleEndian>(source)?;
                buf.write_u32::<LittleEndian>(target)?;
                buf.write_i64::<LittleEndian>(timestamp)?;
            }
        }
        Ok(buf)
    }

    fn deserialize(payload: &[u8]) -> io::Result<WalEntry> {
        let mut cursor = Cursor::new(payload);
        let opcode = cursor.read_u8()?;
        match opcode {
            1 => Ok(WalEntry::SetWeight {
                source: cursor.read_u32::<LittleEndian>()?,
                target: cursor.read_u32::<LittleEndian>()?,
                strength: cursor.read_i64::<LittleEndian>()?,
                timestamp: cursor.read_i64::<LittleEndian>()?,
            }),
            2 => Ok(WalEntry::Remove {
                source: cursor.read_u32::<LittleEndian>()?,
                target: cursor.read_u32::<LittleEndian>()?,
                timestamp: cursor.read_i64::<LittleEndian>()?,
            }),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown WAL opcode {other}"),
            )),
        }
    }

    /// Appends one entry, framed as `[magic: 1][len: u32 LE][crc32: u32 LE][payload]`.
    pub fn append(&mut self, entry: &WalEntry) -> io::Result<()> {
        let payload = Self::serialize(entry)?;
        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        self.file.write_u8(WAL_MAGIC)?;
        self.file.write_u32::<LittleEndian>(payload.len() as u32)?;
        self.file.write_u32::<LittleEndian>(crc)?;
        self.file.write_all(&payload)?;
        self.file.flush()?;

        if self.mode == WalSyncMode::Strict {
            self.file.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Forces any buffered writes to disk.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_all()
    }

    /// Truncates the log to empty — called after a snapshot makes its contents redundant.
    pub fn clear(path: &Path) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(path)?;
        Ok(())
    }

    /// Replays every well-formed entry in order, invoking `callback` for each. A corrupt or
    /// truncated tail (partial header, partial payload, or CRC mismatch) stops replay and
    /// truncates the file at the last valid record boundary rather than surfacing an error —
    /// the engine treats an unflushed tail as a crash mid-write, not data loss.
    pub fn replay<F>(path: &Path, mut callback: F) -> io::Result<()>
    where
        F: FnMut(WalEntry),
    {
        if !path.exists() {
            return Ok(());
        }

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut valid_pos = 0u64;

        loop {
            let magic = match reader.read_u8() {
                Ok(b) => b,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            };
            if magic != WAL_MAGIC {
                break;
            }

            let Ok(len) = reader.read_u32::<LittleEndian>() else {
                break;
            };
            let Ok(stored_crc) = reader.read_u32::<LittleEndian>() else {
                break;
            };
            let mut payload = vec![0u8; len as usize];
            if reader.read_exact(&mut payload).is_err() {
                break;
            }

            let mut hasher = Hasher::new();
            hasher.update(&payload);
            if hasher.finalize() != stored_crc {
                break;
            }

            match Self::deserialize(&payload) {
                Ok(entry) => callback(entry),
                Err(_) => break,
            }
            valid_pos += 1 + 4 + 4 + u64::from(len);
        }

        if valid_pos < file_len {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_pos)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replay_recovers_entries_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut wal = Wal::open(&path, WalSyncMode::Strict).unwrap();
        wal.append(&WalEntry::SetWeight {
            source: 1,
            target: 2,
            strength: 5,
            timestamp: 10,
        })
        .unwrap();
        wal.append(&WalEntry::Remove {
            source: 1,
            target: 2,
            timestamp: 20,
        })
        .unwrap();
        drop(wal);

        let mut replayed = Vec::new();
        Wal::replay(&path, |entry| replayed.push(entry)).unwrap();
        assert_eq!(
            replayed,
            vec![
                WalEntry::SetWeight {
                    source: 1,
                    target: 2,
                    strength: 5,
                    timestamp: 10,
                },
                WalEntry::Remove {
                    source: 1,
                    target: 2,
                    timestamp: 20,
                },
            ]
        );
    }

    #[test]
    fn replay_truncates_a_torn_tail_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut wal = Wal::open(&path, WalSyncMode::Strict).unwrap();
        wal.append(&WalEntry::SetWeight {
            source: 1,
            target: 2,
            strength: 5,
            timestamp: 10,
        })
        .unwrap();
        drop(wal);

        // Simulate a crash mid-append: dangling bytes with no valid frame.
        use std::io::Write as _;
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&[WAL_MAGIC, 0xFF, 0xFF]).unwrap();
        drop(f);

        let good_len = std::fs::metadata(&path).unwrap().len();

        let mut replayed = Vec::new();
        Wal::replay(&path, |entry| replayed.push(entry)).unwrap();
        assert_eq!(replayed.len(), 1);

        let truncated_len = std::fs::metadata(&path).unwrap().len();
        assert!(truncated_len < good_len);
    }
}
