//! Streaming dBase (DBF) record reader
//!
//! Reads the field descriptors once, then yields records in fixed-size
//! batches. Every field is returned as Latin-1 decoded text; blank fields are
//! missing values and records flagged deleted (`*`) are dropped.

use super::batch::RawBatch;
use super::BatchSource;
use crate::domain::{IngestError, Result};
use std::io::{ErrorKind, Read};

const DESCRIPTOR_LEN: usize = 32;
const DESCRIPTOR_TERMINATOR: u8 = 0x0D;
const END_OF_FILE: u8 = 0x1A;
const DELETED: u8 = b'*';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfField {
    pub name: String,
    pub kind: char,
    pub length: usize,
}

pub struct DbfReader<R: Read> {
    reader: R,
    fields: Vec<DbfField>,
    record_len: usize,
    remaining: u32,
    record: Vec<u8>,
}

fn decode_error(context: &str, err: std::io::Error) -> IngestError {
    if err.kind() == ErrorKind::UnexpectedEof {
        IngestError::Decode(format!("DBF truncated while reading {context}"))
    } else {
        IngestError::from(err)
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

impl<R: Read> DbfReader<R> {
    /// Reads and validates the DBF header
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Decode`] if the header is truncated or its
    /// field layout does not fit the declared record length.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut head = [0u8; DESCRIPTOR_LEN];
        reader
            .read_exact(&mut head)
            .map_err(|e| decode_error("header", e))?;

        let record_count = u32::from_le_bytes([head[4], head[5], head[6], head[7]]);
        let header_len = u16::from_le_bytes([head[8], head[9]]) as usize;
        let record_len = u16::from_le_bytes([head[10], head[11]]) as usize;
        if header_len <= DESCRIPTOR_LEN || record_len == 0 {
            return Err(IngestError::Decode(format!(
                "invalid DBF header (header length {header_len}, record length {record_len})"
            )));
        }

        let mut descriptors = vec![0u8; header_len - DESCRIPTOR_LEN];
        reader
            .read_exact(&mut descriptors)
            .map_err(|e| decode_error("field descriptors", e))?;

        let mut fields = Vec::new();
        for chunk in descriptors.chunks(DESCRIPTOR_LEN) {
            if chunk[0] == DESCRIPTOR_TERMINATOR || chunk.len() < DESCRIPTOR_LEN {
                break;
            }
            let name_end = chunk[..11].iter().position(|&b| b == 0).unwrap_or(11);
            fields.push(DbfField {
                name: latin1(&chunk[..name_end]).trim().to_string(),
                kind: chunk[11] as char,
                length: chunk[16] as usize,
            });
        }

        let data_len: usize = fields.iter().map(|f| f.length).sum();
        if fields.is_empty() || data_len + 1 > record_len {
            return Err(IngestError::Decode(format!(
                "DBF field layout ({} fields, {} bytes) does not fit record length {}",
                fields.len(),
                data_len,
                record_len
            )));
        }

        Ok(Self {
            reader,
            fields,
            record_len,
            remaining: record_count,
            record: vec![0u8; record_len],
        })
    }

    pub fn fields(&self) -> &[DbfField] {
        &self.fields
    }

    /// Records not yet read, as declared by the header
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Reads up to `max_rows` live records
    ///
    /// Returns `None` once every record has been consumed.
    pub fn next_batch(&mut self, max_rows: usize) -> Result<Option<RawBatch>> {
        let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); self.fields.len()];
        let mut rows = 0;

        while rows < max_rows && self.remaining > 0 {
            self.reader
                .read_exact(&mut self.record[..1])
                .map_err(|e| decode_error("record", e))?;
            if self.record[0] == END_OF_FILE {
                self.remaining = 0;
                break;
            }
            self.reader
                .read_exact(&mut self.record[1..self.record_len])
                .map_err(|e| decode_error("record", e))?;
            self.remaining -= 1;

            if self.record[0] == DELETED {
                continue;
            }

            let mut offset = 1;
            for (field, column) in self.fields.iter().zip(columns.iter_mut()) {
                let raw = &self.record[offset..offset + field.length];
                offset += field.length;
                let text = latin1(raw);
                let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
                column.push((!text.is_empty()).then(|| text.to_string()));
            }
            rows += 1;
        }

        if rows == 0 {
            return Ok(None);
        }
        let names = self.fields.iter().map(|f| f.name.clone()).collect();
        Ok(Some(RawBatch::new(names, columns)))
    }
}

impl<R: Read> BatchSource for DbfReader<R> {
    fn next_batch(&mut self, max_rows: usize) -> Result<Option<RawBatch>> {
        DbfReader::next_batch(self, max_rows)
    }
}
