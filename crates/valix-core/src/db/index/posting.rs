//! Module: index::posting
//! Responsibility: posting-blob encode/decode and structural validation.
//! Does not own: which segments a maintenance operation keeps or rewrites.
//! Boundary: maintenance and query code read blobs only through `PostingReader`.
//!
//! Blob layout, repeated per document:
//! `[document:u32 BE][count:u32 BE][count x LEB128(zigzag(delta))]`.
//! The first delta is relative to zero; ids within a segment ascend strictly.

use crate::{
    error::InternalError,
    model::{DocumentId, NodeId},
};
use thiserror::Error as ThisError;

///
/// Constants
///

pub(crate) const SEGMENT_HEADER_LEN: usize = 8;
const MAX_VARINT_LEN: usize = 10;

///
/// PostingDecodeError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum PostingDecodeError {
    #[error("posting segment header truncated at byte {offset} ({remaining} bytes left)")]
    TruncatedHeader { offset: usize, remaining: usize },

    #[error("posting segment for document {doc} truncated before its {count} node ids")]
    TruncatedNodes { doc: DocumentId, count: u32 },

    #[error("posting segment for document {doc} holds an over-long node id delta")]
    VarintOverflow { doc: DocumentId },

    #[error("posting segment for document {doc} lists node {node} out of order")]
    NotAscending { doc: DocumentId, node: NodeId },
}

impl From<PostingDecodeError> for InternalError {
    fn from(err: PostingDecodeError) -> Self {
        Self::index_corruption(err.to_string())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VarintFault {
    Truncated,
    Overflow,
}

#[expect(clippy::cast_possible_truncation)]
fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

#[expect(clippy::cast_possible_truncation)]
fn decode_varint(buf: &[u8], pos: &mut usize) -> Result<u64, VarintFault> {
    let mut result = 0u64;

    for index in 0..MAX_VARINT_LEN {
        let byte = *buf.get(*pos).ok_or(VarintFault::Truncated)?;
        *pos += 1;

        let payload = u64::from(byte & 0x7F);
        let shift = 7 * index as u32;
        // The tenth byte may only carry the top bit of a u64.
        if index == MAX_VARINT_LEN - 1 && payload > 1 {
            return Err(VarintFault::Overflow);
        }
        result |= payload << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }

    Err(VarintFault::Overflow)
}

const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)).cast_unsigned()
}

const fn zigzag_decode(value: u64) -> i64 {
    (value >> 1).cast_signed() ^ -((value & 1).cast_signed())
}

/// Sort node ids ascending and drop duplicates.
#[must_use]
pub fn sorted_unique(mut nodes: Vec<NodeId>) -> Vec<NodeId> {
    nodes.sort_unstable();
    nodes.dedup();
    nodes
}

///
/// PostingWriter
///
/// Builds a posting blob segment by segment.
///

#[derive(Debug, Default)]
pub struct PostingWriter {
    buf: Vec<u8>,
}

impl PostingWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Encode one segment. `nodes` must be strictly ascending; a segment holds
    /// at most `u32::MAX` ids and any excess is not written.
    pub fn write_segment(&mut self, doc: DocumentId, nodes: &[NodeId]) {
        debug_assert!(nodes.windows(2).all(|pair| pair[0] < pair[1]));

        let count = u32::try_from(nodes.len()).unwrap_or(u32::MAX);
        self.buf.extend_from_slice(&doc.get().to_be_bytes());
        self.buf.extend_from_slice(&count.to_be_bytes());

        let mut previous = 0u64;
        for node in nodes.iter().take(count as usize) {
            let delta = node.get().wrapping_sub(previous).cast_signed();
            encode_varint(zigzag_encode(delta), &mut self.buf);
            previous = node.get();
        }
    }

    /// Copy a decoded segment through unchanged.
    pub fn copy_segment(&mut self, segment: &Segment<'_>) {
        self.buf.extend_from_slice(segment.raw());
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

///
/// Segment
///
/// One document's slice of a posting blob. Node ids are decoded lazily.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Segment<'a> {
    doc: DocumentId,
    count: u32,
    raw: &'a [u8],
}

impl<'a> Segment<'a> {
    #[must_use]
    pub const fn doc(&self) -> DocumentId {
        self.doc
    }

    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Header plus payload bytes, exactly as stored.
    #[must_use]
    pub const fn raw(&self) -> &'a [u8] {
        self.raw
    }

    #[must_use]
    pub fn nodes(&self) -> SegmentNodes<'a> {
        SegmentNodes {
            doc: self.doc,
            count: self.count,
            payload: &self.raw[SEGMENT_HEADER_LEN..],
            pos: 0,
            remaining: self.count,
            previous: None,
        }
    }

    pub fn decode_nodes(&self) -> Result<Vec<NodeId>, PostingDecodeError> {
        self.nodes().collect()
    }
}

///
/// SegmentNodes
///

#[derive(Clone, Debug)]
pub struct SegmentNodes<'a> {
    doc: DocumentId,
    count: u32,
    payload: &'a [u8],
    pos: usize,
    remaining: u32,
    previous: Option<u64>,
}

impl Iterator for SegmentNodes<'_> {
    type Item = Result<NodeId, PostingDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let raw = match decode_varint(self.payload, &mut self.pos) {
            Ok(raw) => raw,
            Err(fault) => {
                self.remaining = 0;
                return Some(Err(fault_error(fault, self.doc, self.count)));
            }
        };

        let node = self
            .previous
            .unwrap_or(0)
            .wrapping_add_signed(zigzag_decode(raw));
        if self.previous.is_some_and(|previous| node <= previous) {
            self.remaining = 0;
            return Some(Err(PostingDecodeError::NotAscending {
                doc: self.doc,
                node: NodeId::new(node),
            }));
        }
        self.previous = Some(node);

        Some(Ok(NodeId::new(node)))
    }
}

///
/// PostingReader
///
/// Splits a posting blob into segments. The first structural error is
/// yielded once and ends iteration; the bytes after it are not trusted.
///

#[derive(Clone, Debug)]
pub struct PostingReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> PostingReader<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            failed: false,
        }
    }

    fn read_segment(&mut self) -> Result<Segment<'a>, PostingDecodeError> {
        let start = self.offset;
        let header = self
            .bytes
            .get(start..start + SEGMENT_HEADER_LEN)
            .ok_or(PostingDecodeError::TruncatedHeader {
                offset: start,
                remaining: self.bytes.len() - start,
            })?;

        let doc = DocumentId::new(u32::from_be_bytes([
            header[0], header[1], header[2], header[3],
        ]));
        let count = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);

        // Walk the varints to find where this segment ends.
        let mut pos = start + SEGMENT_HEADER_LEN;
        for _ in 0..count {
            decode_varint(self.bytes, &mut pos).map_err(|fault| fault_error(fault, doc, count))?;
        }
        self.offset = pos;

        Ok(Segment {
            doc,
            count,
            raw: &self.bytes[start..pos],
        })
    }
}

impl<'a> Iterator for PostingReader<'a> {
    type Item = Result<Segment<'a>, PostingDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }

        let segment = self.read_segment();
        self.failed = segment.is_err();

        Some(segment)
    }
}

/// Decode a whole blob into `(document, node ids)` pairs.
pub fn decode_segments(bytes: &[u8]) -> Result<Vec<(DocumentId, Vec<NodeId>)>, PostingDecodeError> {
    PostingReader::new(bytes)
        .map(|segment| {
            let segment = segment?;
            Ok((segment.doc(), segment.decode_nodes()?))
        })
        .collect()
}

const fn fault_error(fault: VarintFault, doc: DocumentId, count: u32) -> PostingDecodeError {
    match fault {
        VarintFault::Truncated => PostingDecodeError::TruncatedNodes { doc, count },
        VarintFault::Overflow => PostingDecodeError::VarintOverflow { doc },
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{
        PostingDecodeError, PostingReader, PostingWriter, decode_segments, sorted_unique,
        zigzag_decode, zigzag_encode,
    };
    use crate::model::{DocumentId, NodeId};
    use proptest::prelude::*;

    fn ids(raw: &[u64]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId::new).collect()
    }

    #[test]
    fn empty_segment_is_header_only() {
        let mut writer = PostingWriter::new();
        writer.write_segment(DocumentId::new(7), &[]);

        assert_eq!(writer.as_bytes(), &[0, 0, 0, 7, 0, 0, 0, 0]);
        assert_eq!(
            decode_segments(writer.as_bytes()).expect("decode"),
            vec![(DocumentId::new(7), Vec::new())]
        );
    }

    #[test]
    fn known_layout_matches_delta_encoding() {
        let mut writer = PostingWriter::new();
        writer.write_segment(DocumentId::new(1), &ids(&[3, 4, 200]));

        // deltas 3, 1, 196 -> zigzag 6, 2, 392 (= 0x88 0x03)
        assert_eq!(
            writer.as_bytes(),
            &[0, 0, 0, 1, 0, 0, 0, 3, 6, 2, 0x88, 0x03]
        );
    }

    #[test]
    fn copy_segment_preserves_bytes() {
        let mut source = PostingWriter::new();
        source.write_segment(DocumentId::new(1), &ids(&[5]));
        source.write_segment(DocumentId::new(2), &ids(&[9, 12]));
        let bytes = source.into_bytes();

        let mut copy = PostingWriter::new();
        for segment in PostingReader::new(&bytes) {
            copy.copy_segment(&segment.expect("segment"));
        }

        assert_eq!(copy.as_bytes(), bytes.as_slice());
    }

    #[test]
    fn truncated_header_stops_reader() {
        let mut writer = PostingWriter::new();
        writer.write_segment(DocumentId::new(1), &ids(&[5]));
        let mut bytes = writer.into_bytes();
        bytes.extend_from_slice(&[0, 0, 1]);

        let segments: Vec<_> = PostingReader::new(&bytes).collect();
        assert_eq!(segments.len(), 2);
        assert!(segments[0].is_ok());
        assert_eq!(
            segments[1],
            Err(PostingDecodeError::TruncatedHeader {
                offset: 9,
                remaining: 3
            })
        );
    }

    #[test]
    fn truncated_nodes_are_reported_with_document() {
        let bytes = [0, 0, 0, 4, 0, 0, 0, 2, 6];

        let err = decode_segments(&bytes).expect_err("second id missing");
        assert_eq!(
            err,
            PostingDecodeError::TruncatedNodes {
                doc: DocumentId::new(4),
                count: 2
            }
        );
    }

    #[test]
    fn overlong_varint_is_rejected() {
        let mut bytes = vec![0, 0, 0, 4, 0, 0, 0, 1];
        bytes.extend_from_slice(&[0xFF; 11]);

        let err = decode_segments(&bytes).expect_err("varint too long");
        assert_eq!(
            err,
            PostingDecodeError::VarintOverflow {
                doc: DocumentId::new(4)
            }
        );
    }

    #[test]
    fn descending_ids_are_rejected_on_decode() {
        // deltas 5 then -2 (zigzag 10, 3)
        let bytes = [0, 0, 0, 4, 0, 0, 0, 2, 10, 3];

        let err = decode_segments(&bytes).expect_err("ids descend");
        assert_eq!(
            err,
            PostingDecodeError::NotAscending {
                doc: DocumentId::new(4),
                node: NodeId::new(3)
            }
        );
    }

    #[test]
    fn sorted_unique_dedupes() {
        assert_eq!(sorted_unique(ids(&[7, 3, 7, 1])), ids(&[1, 3, 7]));
    }

    proptest! {
        #[test]
        fn zigzag_round_trips(value in any::<i64>()) {
            prop_assert_eq!(zigzag_decode(zigzag_encode(value)), value);
        }

        #[test]
        fn delta_round_trip_restores_segments(
            segments in prop::collection::btree_map(
                any::<u32>(),
                prop::collection::btree_set(any::<u64>(), 0..40),
                0..6,
            ),
        ) {
            let mut writer = PostingWriter::new();
            let mut expected = Vec::new();
            for (doc, nodes) in &segments {
                let nodes: Vec<NodeId> = nodes.iter().copied().map(NodeId::new).collect();
                writer.write_segment(DocumentId::new(*doc), &nodes);
                expected.push((DocumentId::new(*doc), nodes));
            }

            let decoded = decode_segments(writer.as_bytes()).expect("round trip decodes");
            prop_assert_eq!(decoded, expected);
        }
    }
}
