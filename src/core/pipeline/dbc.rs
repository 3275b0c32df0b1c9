//! DBC decompression
//!
//! A DBC file is the DBF header copied verbatim, a 4-byte CRC, then the
//! remainder of the DBF file compressed with PKWARE DCL implode. The header
//! length sits at bytes 8..10, little-endian.
//!
//! The payload is exploded as a stream, so memory use does not depend on
//! the size of the extract.

use crate::domain::{IngestError, Result};
use explode::ExplodeReader;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

const CRC_LEN: usize = 4;
const PREFIX_LEN: usize = 10;

fn read_header<R: Read>(input: &mut R) -> Result<Vec<u8>> {
    let truncated = |e: io::Error| match e.kind() {
        ErrorKind::UnexpectedEof => IngestError::Decode("DBC truncated before end of header".to_string()),
        _ => IngestError::Io(format!("Failed to read DBC header: {e}")),
    };

    let mut header = vec![0u8; PREFIX_LEN];
    input.read_exact(&mut header).map_err(truncated)?;
    let header_len = u16::from_le_bytes([header[8], header[9]]) as usize;
    if header_len < PREFIX_LEN {
        return Err(IngestError::Decode(format!(
            "DBC header length {header_len} is too small"
        )));
    }

    header.resize(header_len, 0);
    input.read_exact(&mut header[PREFIX_LEN..]).map_err(truncated)?;
    let mut crc = [0u8; CRC_LEN];
    input.read_exact(&mut crc).map_err(truncated)?;
    Ok(header)
}

/// Expands a DBC stream into the equivalent DBF stream
///
/// Returns the number of DBF bytes written.
///
/// # Errors
///
/// Returns [`IngestError::Decode`] if the input is shorter than its declared
/// header or the payload fails to decompress, and [`IngestError::Io`] for
/// other read or write failures.
pub fn decompress<R: Read, W: Write>(input: R, output: &mut W) -> Result<u64> {
    // The exploder pulls one byte at a time from its source
    let mut input = BufReader::new(input);
    let header = read_header(&mut input)?;
    output
        .write_all(&header)
        .map_err(|e| IngestError::Io(format!("Failed to write DBF header: {e}")))?;

    let body = io::copy(&mut ExplodeReader::new(input), output).map_err(|e| match e.kind() {
        ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
            IngestError::Decode(format!("DBC payload failed to decompress: {e}"))
        }
        _ => IngestError::Io(format!("Failed to expand DBC payload: {e}")),
    })?;
    Ok(header.len() as u64 + body)
}

/// Decompresses `src` (DBC) into `dest` (DBF) and returns the DBF size
pub fn decompress_file(src: &Path, dest: &Path) -> Result<u64> {
    let input = File::open(src)
        .map_err(|e| IngestError::Io(format!("Failed to open {}: {}", src.display(), e)))?;
    let file = File::create(dest)
        .map_err(|e| IngestError::Io(format!("Failed to create {}: {}", dest.display(), e)))?;
    let mut output = BufWriter::new(file);

    let size = decompress(input, &mut output)?;
    output
        .flush()
        .map_err(|e| IngestError::Io(format!("Failed to write {}: {}", dest.display(), e)))?;
    tracing::debug!(src = %src.display(), dbf_bytes = size, "Decompressed DBC");
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // Reference implode stream that expands to "AIAIAIAIAIAIA"
    const IMPLODED: [u8; 8] = [0x00, 0x04, 0x82, 0x24, 0x25, 0x8f, 0x80, 0x7f];

    fn dbc_with_header(header_len: u16) -> Vec<u8> {
        let mut header = vec![0u8; header_len as usize];
        header[0] = 0x03;
        header[8..10].copy_from_slice(&header_len.to_le_bytes());
        let mut dbc = header;
        dbc.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        dbc.extend_from_slice(&IMPLODED);
        dbc
    }

    fn expand(dbc: &[u8]) -> Result<Vec<u8>> {
        let mut dbf = Vec::new();
        decompress(Cursor::new(dbc), &mut dbf)?;
        Ok(dbf)
    }

    #[test]
    fn test_header_is_copied_and_payload_expanded() {
        let dbc = dbc_with_header(32);
        let dbf = expand(&dbc).unwrap();

        assert_eq!(&dbf[..32], &dbc[..32]);
        assert_eq!(&dbf[32..], b"AIAIAIAIAIAIA");
    }

    #[test]
    fn test_decompress_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("RDSP2403.dbc");
        let dest = dir.path().join("RDSP2403.dbf");
        std::fs::write(&src, dbc_with_header(32)).unwrap();

        let size = decompress_file(&src, &dest).unwrap();
        assert_eq!(size, 45);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 45);
    }

    #[test]
    fn test_short_input() {
        assert!(matches!(expand(&[0u8; 4]), Err(IngestError::Decode(_))));
    }

    #[test]
    fn test_header_beyond_end() {
        let mut dbc = vec![0u8; 16];
        dbc[8..10].copy_from_slice(&500u16.to_le_bytes());
        assert!(matches!(expand(&dbc), Err(IngestError::Decode(_))));
    }

    #[test]
    fn test_corrupt_payload() {
        let mut dbc = dbc_with_header(32);
        dbc.truncate(36);
        dbc.extend_from_slice(&[0x07, 0x09, 0xff]);
        assert!(matches!(expand(&dbc), Err(IngestError::Decode(_))));
    }

    #[test]
    fn test_truncated_payload() {
        let mut dbc = dbc_with_header(32);
        dbc.truncate(dbc.len() - 3);
        assert!(matches!(expand(&dbc), Err(IngestError::Decode(_))));
    }
}
