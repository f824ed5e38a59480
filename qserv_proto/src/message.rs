//! Wire message shapes exchanged between the dispatch layer and worker task
//! executors, and the framing used to put them on the wire.
//!
//! These mirror the original `TaskMsg`/`ProtoHeader`/`Result` protobuf
//! messages, but are expressed as plain structs with manual binary framing:
//! the transport itself is out of scope here, only the shapes and the
//! length-prefixed header convention that wraps them.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Maximum size, in bytes, of the serialized [`ProtoHeader`] once it is
/// padded onto the wire. The header length byte can address at most 255 of
/// these, so the padded region is one byte larger to also hold that length.
pub const PROTO_HEADER_SIZE: usize = 256;

/// Result payloads below this size are preferred; larger ones still work
/// but forfeit the efficiency of the header's inline size field.
pub const PROTOBUFFER_DESIRED_LIMIT: usize = 2_000_000;

/// No single result payload may exceed this size.
pub const PROTOBUFFER_HARD_LIMIT: usize = 64_000_000;

/// One `SELECT` fragment dispatched to a worker: the query text(s) to run,
/// the sub-chunk tables they reference, and the result table to write rows
/// into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub result_table: String,
    pub queries: Vec<String>,
    pub sub_chunk_tables: Vec<String>,
    pub sub_chunk_ids: Vec<i32>,
}

/// A unit of work dispatched to a single worker for a single chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMsg {
    pub session: i32,
    pub db: String,
    pub chunk_id: i32,
    pub fragments: Vec<Fragment>,
}

/// The fixed-size header describing the result payload(s) that follow it on
/// the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtoHeader {
    pub size: u32,
    pub md5: [u8; 16],
    pub worker_name: String,
    pub large_result: bool,
    pub end_no_data: bool,
}

impl ProtoHeader {
    /// Build a header describing `payload`, computing its MD5 digest.
    pub fn for_payload(payload: &[u8], worker_name: impl Into<String>) -> ProtoHeader {
        ProtoHeader {
            size: payload.len() as u32,
            md5: md5_of(payload),
            worker_name: worker_name.into(),
            large_result: payload.len() > PROTOBUFFER_DESIRED_LIMIT,
            end_no_data: false,
        }
    }
}

fn md5_of(payload: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(payload);
    hasher.finalize().into()
}

/// The declared column names of a result set, shared by every `RowBundle`
/// in a single `Result` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSchema {
    pub columns: Vec<String>,
}

/// One packed row: one cell per column, with a parallel null bitmap since an
/// empty string and SQL `NULL` are distinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowBundle {
    pub column: Vec<Vec<u8>>,
    pub is_null: Vec<bool>,
}

/// A worker's response to one `TaskMsg` fragment: the schema, the rows
/// gathered so far, and whether more `Result` messages follow for this
/// fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMsg {
    pub session: i32,
    pub query_id: i32,
    pub row_schema: RowSchema,
    pub row: Vec<RowBundle>,
    pub row_count: u64,
    pub transmit_size: u64,
    pub error_code: i32,
    pub error_msg: String,
    pub continues: bool,
}

impl ResultMsg {
    /// Whether this message reports no error.
    pub fn is_ok(&self) -> bool {
        self.error_code == 0
    }
}

/// Errors returned while wrapping/unwrapping frames.
#[derive(Debug, Snafu, PartialEq)]
pub enum FrameError {
    /// The declared header length byte was zero or the buffer was too
    /// short to contain it.
    #[snafu(display("malformed header import"))]
    HeaderImport,

    /// The payload's MD5 did not match the header's declared digest.
    #[snafu(display("result payload MD5 does not match header"))]
    ResultMd5,
}

/// Pad a serialized header into the fixed-size, length-prefixed region that
/// precedes every result frame on the wire.
pub fn wrap_header(header_bytes: &[u8]) -> Vec<u8> {
    debug_assert!(header_bytes.len() < PROTO_HEADER_SIZE);
    let mut buf = Vec::with_capacity(PROTO_HEADER_SIZE);
    buf.push(header_bytes.len() as u8);
    buf.extend_from_slice(header_bytes);
    buf.resize(PROTO_HEADER_SIZE, b'0');
    buf
}

/// Extract the serialized header bytes from a wire buffer produced by
/// [`wrap_header`].
pub fn unwrap_header(buffer: &[u8]) -> Result<&[u8], FrameError> {
    ensure!(!buffer.is_empty(), HeaderImportSnafu);
    let header_size = buffer[0] as usize;
    ensure!(
        header_size > 0 && buffer.len() >= 1 + header_size,
        HeaderImportSnafu
    );
    Ok(&buffer[1..1 + header_size])
}

/// Verify that `payload` matches the MD5 digest declared in `header`.
pub fn verify_payload(header: &ProtoHeader, payload: &[u8]) -> Result<(), FrameError> {
    ensure!(md5_of(payload) == header.md5, ResultMd5Snafu);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_and_unwrap_round_trip() {
        let header = b"hello header";
        let framed = wrap_header(header);
        assert_eq!(framed.len(), PROTO_HEADER_SIZE);
        assert_eq!(unwrap_header(&framed).unwrap(), header);
    }

    #[test]
    fn empty_buffer_is_malformed() {
        assert_eq!(unwrap_header(&[]), Err(FrameError::HeaderImport));
    }

    #[test]
    fn zero_length_header_is_malformed() {
        let framed = wrap_header(b"");
        assert_eq!(unwrap_header(&framed), Err(FrameError::HeaderImport));
    }

    #[test]
    fn matching_md5_verifies() {
        let payload = b"some result rows";
        let header = ProtoHeader::for_payload(payload, "worker1");
        assert!(verify_payload(&header, payload).is_ok());
    }

    #[test]
    fn mismatched_md5_is_rejected() {
        let payload = b"some result rows";
        let mut header = ProtoHeader::for_payload(payload, "worker1");
        header.md5[0] ^= 0xFF;
        assert_eq!(verify_payload(&header, payload), Err(FrameError::ResultMd5));
    }

    #[test]
    fn result_msg_reports_ok_when_error_code_is_zero() {
        let msg = ResultMsg {
            session: 1,
            query_id: 1,
            row_schema: RowSchema {
                columns: vec!["ra".into(), "decl".into()],
            },
            row: vec![RowBundle {
                column: vec![b"1.0".to_vec(), b"2.0".to_vec()],
                is_null: vec![false, false],
            }],
            row_count: 1,
            transmit_size: 6,
            error_code: 0,
            error_msg: String::new(),
            continues: false,
        };
        assert!(msg.is_ok());
    }

    #[test]
    fn task_msg_carries_its_fragments() {
        let msg = TaskMsg {
            session: 1,
            db: "LSST".into(),
            chunk_id: 42,
            fragments: vec![Fragment {
                result_table: "r_1".into(),
                queries: vec!["SELECT * FROM Object_42".into()],
                sub_chunk_tables: vec!["Object".into()],
                sub_chunk_ids: vec![1, 2, 3],
            }],
        };
        assert_eq!(msg.fragments.len(), 1);
        assert_eq!(msg.fragments[0].sub_chunk_ids, vec![1, 2, 3]);
    }
}
