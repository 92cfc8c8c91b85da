//! Source file fingerprint used to detect stale indexes.
//!
//! Only the first and last MiB are hashed, together with the exact size.
//! That is enough to notice a replaced or re-encoded file without reading
//! gigabytes of media on every load.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{IndexError, Result};

/// Length of the stored digest.
pub const DIGEST_LEN: usize = 20;

const BLOCK: u64 = 1024 * 1024;

/// Size and partial-content digest of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSignature {
    pub file_size: u64,
    pub digest: [u8; DIGEST_LEN],
}

impl SourceSignature {
    pub fn compute<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| IndexError::open(path, e))?;
        Self::from_reader(&mut file)
    }

    /// Hash the head block, the tail block and nothing else. Blocks shorter
    /// than a MiB are zero padded, so a tiny file hashes its content followed
    /// by zeros and then a full block of zeros.
    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        let mut hasher = blake3::Hasher::new();
        let mut block = vec![0u8; BLOCK as usize];

        reader.seek(SeekFrom::Start(0))?;
        read_block(reader, &mut block)?;
        hasher.update(&block);

        block.iter_mut().for_each(|b| *b = 0);
        if file_size > BLOCK {
            reader.seek(SeekFrom::Start(file_size - BLOCK))?;
            read_block(reader, &mut block)?;
        }
        hasher.update(&block);

        let mut digest = [0u8; DIGEST_LEN];
        hasher.finalize_xof().fill(&mut digest);
        Ok(Self { file_size, digest })
    }
}

fn read_block<R: Read>(reader: &mut R, block: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < block.len() {
        let n = reader.read(&mut block[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_small_file_signature() {
        let sig = SourceSignature::from_reader(&mut Cursor::new(b"hello".to_vec())).unwrap();
        assert_eq!(sig.file_size, 5);

        let again = SourceSignature::from_reader(&mut Cursor::new(b"hello".to_vec())).unwrap();
        assert_eq!(sig, again);

        let other = SourceSignature::from_reader(&mut Cursor::new(b"hellp".to_vec())).unwrap();
        assert_ne!(sig.digest, other.digest);
    }

    #[test]
    fn test_middle_bytes_are_not_hashed() {
        let mut a = vec![7u8; 3 * BLOCK as usize];
        let mut b = a.clone();
        a[BLOCK as usize + 10] = 1;
        b[BLOCK as usize + 10] = 2;
        let sa = SourceSignature::from_reader(&mut Cursor::new(a)).unwrap();
        let sb = SourceSignature::from_reader(&mut Cursor::new(b)).unwrap();
        assert_eq!(sa, sb);
    }

    #[test]
    fn test_tail_bytes_are_hashed() {
        let a = vec![7u8; 3 * BLOCK as usize];
        let mut b = a.clone();
        *b.last_mut().unwrap() = 8;
        let sa = SourceSignature::from_reader(&mut Cursor::new(a)).unwrap();
        let sb = SourceSignature::from_reader(&mut Cursor::new(b)).unwrap();
        assert_ne!(sa.digest, sb.digest);
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let err = SourceSignature::compute("/nonexistent/ffindex/source.mkv").unwrap_err();
        assert!(matches!(err, IndexError::Open { .. }));
    }
}
