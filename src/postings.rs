//! Posting types and the fixed-width posting codec.
//!
//! A posting records one term's occurrence count in one document. Encoded
//! form is a fixed [`TUPLE_SIZE`]-byte big-endian tuple: the document id
//! in the high 32 bits, the term frequency in the low 16 bits.
//!
//! The term-frequency field is lossy by contract: values above 65535 wrap
//! via `tf & TF_MASK`. Callers that need exact frequencies above 16 bits
//! must cap them before encoding.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::error::{Result, XiphosError};

/// Document identifier.
///
/// 32 bits wide because the codec stores the id in the tuple's high
/// 32 bits; ids that do not fit cannot be constructed.
pub type DocId = u32;

/// Encoded size of one posting in bytes.
pub const TUPLE_SIZE: usize = 6;

/// Mask applied to term frequencies on encode.
pub const TF_MASK: u32 = 0xFFFF;

/// A single posting in a posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Document ID.
    pub doc_id: DocId,
    /// Term frequency in the document.
    pub term_frequency: u32,
}

impl Posting {
    /// Create a new posting.
    pub fn new(doc_id: DocId, term_frequency: u32) -> Self {
        Posting {
            doc_id,
            term_frequency,
        }
    }
}

/// Append one encoded posting to `buf`.
///
/// The term frequency is truncated to 16 bits (`tf & TF_MASK`).
pub fn encode_posting(buf: &mut Vec<u8>, posting: Posting) {
    let mut tuple = [0u8; TUPLE_SIZE];
    BigEndian::write_u32(&mut tuple[0..4], posting.doc_id);
    BigEndian::write_u16(&mut tuple[4..6], (posting.term_frequency & TF_MASK) as u16);
    buf.extend_from_slice(&tuple);
}

/// Decode one posting from a fixed-width tuple.
pub fn decode_posting(tuple: &[u8; TUPLE_SIZE]) -> Posting {
    Posting {
        doc_id: BigEndian::read_u32(&tuple[0..4]),
        term_frequency: BigEndian::read_u16(&tuple[4..6]) as u32,
    }
}

/// Encode a full posting list into a contiguous byte buffer.
pub fn encode_posting_list(postings: &[Posting]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(postings.len() * TUPLE_SIZE);
    for &posting in postings {
        encode_posting(&mut buf, posting);
    }
    buf
}

/// Decode exactly `count` postings from `bytes`.
///
/// Returns an error if `bytes` is not exactly `count * TUPLE_SIZE` long;
/// a mismatch means the posting directory disagrees with the stored
/// segment bytes.
pub fn decode_posting_list(bytes: &[u8], count: usize) -> Result<Vec<Posting>> {
    let expected = count * TUPLE_SIZE;
    if bytes.len() != expected {
        return Err(XiphosError::index(format!(
            "posting bytes length mismatch: expected {expected}, got {}",
            bytes.len()
        )));
    }

    let mut postings = Vec::with_capacity(count);
    for chunk in bytes.chunks_exact(TUPLE_SIZE) {
        let tuple: &[u8; TUPLE_SIZE] = chunk.try_into().expect("chunks_exact yields TUPLE_SIZE");
        postings.push(decode_posting(tuple));
    }
    Ok(postings)
}
