//! Fixed-size trailers of a database file and its commit journal.
//!
//! On-disk format of a database file:
//! ```text
//! [content bytes][reference blob][tail] ... [content bytes][reference blob][tail]
//!
//! reference blob = [encoded reference][crc32 of encoded reference (u32 BE)]
//! tail           = [blob offset (u64 BE)][blob length (u64 BE)]
//! ```
//! Only the last tail counts. An empty file or an all-zero tail is an empty
//! database.
//!
//! Journal format:
//! ```text
//! [prior file length (u64 BE)][prior tail (16 bytes)][crc32 of the preceding 24 bytes (u32 BE)]
//! ```

use crate::error::{FilesError, Result};

/// Size of the tail pointer at the end of every non-empty database file.
pub const TAIL_LEN: u64 = 16;
/// Size of the checksum appended to every reference blob.
pub const BLOB_CRC_LEN: usize = 4;
/// Size of an encoded journal.
pub const JOURNAL_LEN: usize = 8 + TAIL_LEN as usize + 4;

/// Location of the latest reference blob.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tail {
    pub offset: u64,
    pub length: u64,
}

impl Tail {
    /// The tail of a database with no committed reference.
    pub const EMPTY: Tail = Tail {
        offset: 0,
        length: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn to_bytes(&self) -> [u8; TAIL_LEN as usize] {
        let mut out = [0u8; TAIL_LEN as usize];
        out[..8].copy_from_slice(&self.offset.to_be_bytes());
        out[8..].copy_from_slice(&self.length.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; TAIL_LEN as usize]) -> Self {
        let mut offset = [0u8; 8];
        let mut length = [0u8; 8];
        offset.copy_from_slice(&bytes[..8]);
        length.copy_from_slice(&bytes[8..]);
        Self {
            offset: u64::from_be_bytes(offset),
            length: u64::from_be_bytes(length),
        }
    }

    /// Check that the blob lies wholly before the tail of a file of
    /// `file_len` bytes.
    pub fn check_within(&self, file_len: u64) -> Result<()> {
        if self.is_empty() {
            if self.offset != 0 {
                return Err(FilesError::Format(format!(
                    "empty tail with non-zero offset {}",
                    self.offset
                )));
            }
            return Ok(());
        }
        let end = self.offset.checked_add(self.length).ok_or_else(|| {
            FilesError::Format(format!("tail overflows: {}+{}", self.offset, self.length))
        })?;
        if end.checked_add(TAIL_LEN) != Some(file_len) {
            return Err(FilesError::Format(format!(
                "tail points at {}..{end} but the file is {file_len} bytes",
                self.offset
            )));
        }
        if self.length <= BLOB_CRC_LEN as u64 {
            return Err(FilesError::Format(format!(
                "reference blob of {} bytes is too short",
                self.length
            )));
        }
        Ok(())
    }
}

/// Append the checksum to an encoded reference.
pub fn seal_blob(mut encoded: Vec<u8>) -> Vec<u8> {
    let crc = crc32fast::hash(&encoded);
    encoded.extend_from_slice(&crc.to_be_bytes());
    encoded
}

/// Verify a blob's checksum and return the encoded reference inside it.
pub fn open_blob(blob: &[u8]) -> Result<&[u8]> {
    if blob.len() < BLOB_CRC_LEN {
        return Err(FilesError::Format(format!(
            "reference blob of {} bytes is too short",
            blob.len()
        )));
    }
    let (encoded, crc_bytes) = blob.split_at(blob.len() - BLOB_CRC_LEN);
    let mut raw = [0u8; BLOB_CRC_LEN];
    raw.copy_from_slice(crc_bytes);
    let expected = u32::from_be_bytes(raw);
    let actual = crc32fast::hash(encoded);
    if expected != actual {
        return Err(FilesError::Format(format!(
            "reference blob CRC mismatch: expected {expected:#010x}, got {actual:#010x}"
        )));
    }
    Ok(encoded)
}

/// Undo record written before a commit touches the database file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Journal {
    /// File length before the commit started appending.
    pub prior_len: u64,
    /// Tail that was current before the commit.
    pub prior_tail: Tail,
}

impl Journal {
    pub fn to_bytes(&self) -> [u8; JOURNAL_LEN] {
        let mut out = [0u8; JOURNAL_LEN];
        out[..8].copy_from_slice(&self.prior_len.to_be_bytes());
        out[8..24].copy_from_slice(&self.prior_tail.to_bytes());
        let crc = crc32fast::hash(&out[..24]);
        out[24..].copy_from_slice(&crc.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != JOURNAL_LEN {
            return Err(FilesError::Format(format!(
                "journal is {} bytes, expected {JOURNAL_LEN}",
                bytes.len()
            )));
        }
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&bytes[24..]);
        let expected = u32::from_be_bytes(crc);
        let actual = crc32fast::hash(&bytes[..24]);
        if expected != actual {
            return Err(FilesError::Format(format!(
                "journal CRC mismatch: expected {expected:#010x}, got {actual:#010x}"
            )));
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let mut tail = [0u8; TAIL_LEN as usize];
        tail.copy_from_slice(&bytes[8..24]);
        Ok(Self {
            prior_len: u64::from_be_bytes(len),
            prior_tail: Tail::from_bytes(&tail),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_layout() {
        let tail = Tail {
            offset: 1,
            length: 2,
        };
        let bytes = tail.to_bytes();
        assert_eq!(&bytes[..8], &1u64.to_be_bytes());
        assert_eq!(&bytes[8..], &2u64.to_be_bytes());
        assert_eq!(Tail::from_bytes(&bytes), tail);
        assert_eq!(Tail::from_bytes(&[0; 16]), Tail::EMPTY);
    }

    #[test]
    fn tail_must_end_at_file_end() {
        let tail = Tail {
            offset: 10,
            length: 20,
        };
        tail.check_within(46).unwrap();
        assert!(tail.check_within(45).is_err());
        assert!(tail.check_within(100).is_err());
        Tail::EMPTY.check_within(0).unwrap();
        assert!(Tail {
            offset: u64::MAX,
            length: 5
        }
        .check_within(100)
        .is_err());
    }

    #[test]
    fn blob_crc_detects_corruption() {
        let mut blob = seal_blob(b"reference".to_vec());
        assert_eq!(open_blob(&blob).unwrap(), b"reference");
        blob[0] ^= 1;
        assert!(matches!(open_blob(&blob), Err(FilesError::Format(_))));
        assert!(open_blob(&[1, 2]).is_err());
    }

    #[test]
    fn journal_roundtrip_and_corruption() {
        let journal = Journal {
            prior_len: 4096,
            prior_tail: Tail {
                offset: 4000,
                length: 80,
            },
        };
        let mut bytes = journal.to_bytes();
        assert_eq!(Journal::from_bytes(&bytes).unwrap(), journal);
        bytes[3] ^= 0xff;
        assert!(Journal::from_bytes(&bytes).is_err());
        assert!(Journal::from_bytes(&bytes[..10]).is_err());
    }
}
