//! Packs raw query result rows into the wire's row-bundle format, with a
//! fallback for rows too large to bundle with their neighbors.
//!
//! Grounded on `ProtoRowBuffer`/`RowBuffer::escapeString`: small rows are
//! tab-separated and newline-terminated, multiple to a buffer, up to about
//! half the buffer limit so a bundle never has to be split mid-row. A row
//! whose conservative (worst-case-escaped) size exceeds `large_row_threshold`
//! is instead streamed column by column, each chunk carrying the byte
//! offset within that column so a consumer can resume correctly across
//! several buffers.

use qserv_proto::escape::{escape_field, NULL_TOKEN};
use snafu::prelude::*;

/// One row of raw (unescaped) column values; `None` is SQL `NULL`.
pub type Row = Vec<Option<Vec<u8>>>;

/// Errors raised while packing or executing a worker task.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum WorkerError {
    #[snafu(display("task execution failed: {detail}"))]
    Execute { detail: String },

    #[snafu(display("buffer limit of {limit} bytes cannot hold a single column"))]
    BufferTooSmall { limit: usize },

    #[snafu(display("task was cancelled"))]
    Cancelled,
}

/// One streamed chunk of a large row's column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnChunk {
    pub column_index: usize,
    pub offset: usize,
    pub data: Vec<u8>,
    pub is_final: bool,
}

/// One unit of packed row output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackedOutput {
    /// One or more small rows, concatenated into a single buffer.
    Bundle(Vec<u8>),
    /// One oversized row, streamed independently of normal bundling.
    LargeRow(Vec<ColumnChunk>),
}

/// Packs rows against a fixed buffer size budget.
#[derive(Debug, Clone, Copy)]
pub struct RowPacker {
    buffer_limit: usize,
    large_row_threshold: usize,
}

impl RowPacker {
    /// `buffer_limit` bounds how large a single packed buffer may be;
    /// `large_row_threshold` is the conservative row size above which rows
    /// are streamed per-column instead of bundled.
    pub fn new(buffer_limit: usize, large_row_threshold: usize) -> RowPacker {
        RowPacker {
            buffer_limit,
            large_row_threshold,
        }
    }

    fn conservative_cell_size(cell: &Option<Vec<u8>>) -> usize {
        match cell {
            None => NULL_TOKEN.len(),
            Some(bytes) => bytes.len() * 2,
        }
    }

    fn conservative_row_size(row: &Row) -> usize {
        row.iter().map(Self::conservative_cell_size).sum::<usize>() + row.len() + 1
    }

    fn format_cell(cell: &Option<Vec<u8>>) -> Vec<u8> {
        match cell {
            None => NULL_TOKEN.to_vec(),
            Some(bytes) => escape_field(bytes),
        }
    }

    fn format_row(row: &Row) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                out.push(b'\t');
            }
            out.extend(Self::format_cell(cell));
        }
        out.push(b'\n');
        out
    }

    fn stream_large_row(&self, row: &Row) -> Vec<ColumnChunk> {
        let mut chunks = Vec::new();
        for (column_index, cell) in row.iter().enumerate() {
            let formatted = Self::format_cell(cell);
            if formatted.is_empty() {
                chunks.push(ColumnChunk {
                    column_index,
                    offset: 0,
                    data: Vec::new(),
                    is_final: true,
                });
                continue;
            }
            let mut offset = 0;
            while offset < formatted.len() {
                let end = (offset + self.buffer_limit).min(formatted.len());
                chunks.push(ColumnChunk {
                    column_index,
                    offset,
                    data: formatted[offset..end].to_vec(),
                    is_final: end == formatted.len(),
                });
                offset = end;
            }
        }
        chunks
    }

    /// Pack `rows` into a sequence of [`PackedOutput`]s.
    pub fn pack(&self, rows: &[Row]) -> Result<Vec<PackedOutput>, WorkerError> {
        ensure!(
            self.buffer_limit > 0,
            BufferTooSmallSnafu {
                limit: self.buffer_limit
            }
        );
        let mut outputs = Vec::new();
        let mut current = Vec::new();

        for row in rows {
            if Self::conservative_row_size(row) > self.large_row_threshold {
                if !current.is_empty() {
                    outputs.push(PackedOutput::Bundle(std::mem::take(&mut current)));
                }
                outputs.push(PackedOutput::LargeRow(self.stream_large_row(row)));
                continue;
            }

            // Below the large-row threshold, a single column wider than the
            // buffer can never be bundled: it would need a buffer of its own
            // that still cannot hold it.
            let widest_cell = row.iter().map(Self::conservative_cell_size).max().unwrap_or(0);
            ensure!(
                widest_cell <= self.buffer_limit,
                BufferTooSmallSnafu {
                    limit: self.buffer_limit
                }
            );

            let formatted = Self::format_row(row);
            if !current.is_empty() && current.len() + formatted.len() > self.buffer_limit / 2 {
                outputs.push(PackedOutput::Bundle(std::mem::take(&mut current)));
            }
            current.extend(formatted);
        }

        if !current.is_empty() {
            outputs.push(PackedOutput::Bundle(current));
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[Option<&[u8]>]) -> Row {
        cells.iter().map(|c| c.map(|b| b.to_vec())).collect()
    }

    #[test]
    fn small_rows_bundle_together() {
        let packer = RowPacker::new(1024, 512);
        let rows = vec![
            row(&[Some(b"1"), Some(b"alice")]),
            row(&[Some(b"2"), None]),
        ];
        let out = packer.pack(&rows).unwrap();
        assert_eq!(out.len(), 1);
        let PackedOutput::Bundle(buf) = &out[0] else {
            panic!("expected a bundle")
        };
        assert_eq!(buf, b"1\talice\n2\t\\N\n");
    }

    #[test]
    fn bundle_splits_once_half_buffer_exceeded() {
        let packer = RowPacker::new(20, 500);
        let rows = vec![row(&[Some(b"aaaaaaaa")]), row(&[Some(b"bbbbbbbb")])];
        let out = packer.pack(&rows).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn oversized_row_streams_per_column() {
        let packer = RowPacker::new(4, 8);
        let rows = vec![row(&[Some(b"abcdefghij")])];
        let out = packer.pack(&rows).unwrap();
        assert_eq!(out.len(), 1);
        let PackedOutput::LargeRow(chunks) = &out[0] else {
            panic!("expected a large row")
        };
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].offset, 0);
        assert!(!chunks[0].is_final);
        assert!(chunks.last().unwrap().is_final);
        let reassembled: Vec<u8> = chunks.iter().flat_map(|c| c.data.clone()).collect();
        assert_eq!(reassembled, b"abcdefghij");
    }

    #[test]
    fn single_column_wider_than_buffer_is_rejected() {
        let packer = RowPacker::new(2, 100);
        let rows = vec![row(&[Some(b"abc")])];
        assert_eq!(
            packer.pack(&rows),
            Err(WorkerError::BufferTooSmall { limit: 2 })
        );
    }

    #[test]
    fn escapes_control_bytes_within_bundled_rows() {
        let packer = RowPacker::new(1024, 512);
        let rows = vec![row(&[Some(b"a\tb\nc")])];
        let out = packer.pack(&rows).unwrap();
        let PackedOutput::Bundle(buf) = &out[0] else {
            panic!("expected a bundle")
        };
        assert_eq!(buf, b"a\\tb\\nc\n");
    }
}
