//! Builder for constructing alignment records directly.
//!
//! Records normally come out of an input handle, but callers writing a new
//! stream (and tests) need to construct them directly. The builder takes the
//! target set the record will be resolved against and produces an immutable
//! [`AlignmentRecord`]; positions are 0-based, matching the record model.
//!
//! # Examples
//!
//! ```rust
//! use bstr::BString;
//! use samstream::{RecordBuilder, TargetSeqSet};
//!
//! let targets = TargetSeqSet::new(vec![(BString::from("chr1"), 1000)]);
//! let record = RecordBuilder::new(targets)
//!     .name("read1")
//!     .target_id(0)
//!     .position(100)
//!     .cigar_str("50M")
//!     .sequence(&"A".repeat(50))
//!     .qualities(&[30u8; 50])
//!     .build();
//! assert_eq!(record.position(), Some(100));
//! ```

use crate::record::AlignmentRecord;
use crate::targets::TargetSeqSet;
use bstr::BString;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::Data;
use noodles::sam::alignment::record_buf::data::field::Value;
use std::sync::Arc;

/// Fluent builder for [`AlignmentRecord`] values.
#[derive(Debug)]
pub struct RecordBuilder {
    targets: Arc<TargetSeqSet>,
    name: BString,
    flags: Flags,
    reference_sequence_id: Option<usize>,
    alignment_start: Option<u64>,
    mapping_quality: Option<u8>,
    cigar: Vec<(Kind, usize)>,
    sequence: Option<BString>,
    quality_scores: Vec<u8>,
    mate_reference_sequence_id: Option<usize>,
    mate_alignment_start: Option<u64>,
    template_length: Option<i64>,
    data: Data,
}

impl RecordBuilder {
    /// Starts a builder for a record resolved against `targets`.
    ///
    /// Defaults describe an unmapped, unpaired record with no sequence.
    #[must_use]
    pub fn new(targets: Arc<TargetSeqSet>) -> Self {
        Self {
            targets,
            name: BString::from(""),
            flags: Flags::empty(),
            reference_sequence_id: None,
            alignment_start: None,
            mapping_quality: None,
            cigar: Vec::new(),
            sequence: None,
            quality_scores: Vec::new(),
            mate_reference_sequence_id: None,
            mate_alignment_start: None,
            template_length: None,
            data: Data::default(),
        }
    }

    /// Sets the query name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = BString::from(name);
        self
    }

    /// Sets the raw flag word.
    #[must_use]
    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the target sequence index.
    #[must_use]
    pub fn target_id(mut self, id: usize) -> Self {
        self.reference_sequence_id = Some(id);
        self
    }

    /// Sets the 0-based leftmost aligned coordinate.
    #[must_use]
    pub fn position(mut self, position: u64) -> Self {
        self.alignment_start = Some(position);
        self
    }

    /// Sets the mapping quality.
    #[must_use]
    pub fn mapping_quality(mut self, mapq: u8) -> Self {
        self.mapping_quality = Some(mapq);
        self
    }

    /// Sets the CIGAR from `(kind, length)` pairs.
    #[must_use]
    pub fn cigar(mut self, ops: Vec<(Kind, usize)>) -> Self {
        self.cigar = ops;
        self
    }

    /// Sets the CIGAR from a string such as `"10M2D40M"`.
    ///
    /// Unrecognized operation characters are skipped, as are zero-length
    /// operations. `=` and `X` fold into plain matches.
    #[must_use]
    pub fn cigar_str(mut self, cigar: &str) -> Self {
        self.cigar = parse_cigar(cigar);
        self
    }

    /// Sets the query sequence.
    ///
    /// # Panics
    /// Panics if the sequence contains a base outside {A, C, G, T, N}.
    #[must_use]
    pub fn sequence(mut self, bases: &str) -> Self {
        assert!(
            bases.bytes().all(|b| b"ACGTN".contains(&b)),
            "query sequence must be over {{A, C, G, T, N}}: {bases}"
        );
        self.sequence = if bases.is_empty() { None } else { Some(BString::from(bases)) };
        self
    }

    /// Sets per-base quality scores.
    #[must_use]
    pub fn qualities(mut self, quals: &[u8]) -> Self {
        self.quality_scores = quals.to_vec();
        self
    }

    /// Sets the mate's target sequence index.
    #[must_use]
    pub fn mate_target_id(mut self, id: usize) -> Self {
        self.mate_reference_sequence_id = Some(id);
        self
    }

    /// Sets the mate's 0-based leftmost aligned coordinate.
    #[must_use]
    pub fn mate_position(mut self, position: u64) -> Self {
        self.mate_alignment_start = Some(position);
        self
    }

    /// Sets the observed template length. Non-positive values are treated as
    /// absent, matching the record model's merged semantics.
    #[must_use]
    pub fn insert_size(mut self, tlen: i64) -> Self {
        self.template_length = if tlen > 0 { Some(tlen) } else { None };
        self
    }

    /// Adds an integer-valued optional tag.
    ///
    /// # Panics
    /// Panics if `tag` is not exactly two characters or the value does not
    /// fit the wire format's 32-bit integer encoding.
    #[must_use]
    pub fn tag_int(mut self, tag: &str, value: i64) -> Self {
        let value = i32::try_from(value).expect("tag value fits in i32");
        self.data.insert(make_tag(tag), Value::Int32(value));
        self
    }

    /// Adds a string-valued optional tag.
    ///
    /// # Panics
    /// Panics if `tag` is not exactly two characters.
    #[must_use]
    pub fn tag_str(mut self, tag: &str, value: &str) -> Self {
        self.data.insert(make_tag(tag), Value::String(BString::from(value)));
        self
    }

    /// Finalizes the record.
    #[must_use]
    pub fn build(self) -> AlignmentRecord {
        AlignmentRecord {
            targets: self.targets,
            name: self.name,
            flags: self.flags,
            reference_sequence_id: self.reference_sequence_id,
            alignment_start: self.alignment_start,
            mapping_quality: self.mapping_quality,
            cigar: self.cigar,
            sequence: self.sequence,
            quality_scores: self.quality_scores,
            mate_reference_sequence_id: self.mate_reference_sequence_id,
            mate_alignment_start: self.mate_alignment_start,
            template_length: self.template_length,
            data: self.data,
        }
    }
}

fn make_tag(tag: &str) -> Tag {
    assert_eq!(tag.len(), 2, "tag keys are exactly two characters: {tag}");
    Tag::new(tag.as_bytes()[0], tag.as_bytes()[1])
}

/// Parses a CIGAR string into `(kind, length)` operations.
#[must_use]
pub fn parse_cigar(cigar: &str) -> Vec<(Kind, usize)> {
    let mut ops = Vec::new();
    let mut num_str = String::new();

    for ch in cigar.chars() {
        if ch.is_ascii_digit() {
            num_str.push(ch);
        } else {
            let len: usize = num_str.parse().unwrap_or(0);
            num_str.clear();

            let kind = match ch {
                'M' | '=' | 'X' => Kind::Match,
                'I' => Kind::Insertion,
                'D' => Kind::Deletion,
                'N' => Kind::Skip,
                'S' => Kind::SoftClip,
                'H' => Kind::HardClip,
                'P' => Kind::Pad,
                _ => continue,
            };

            if len > 0 {
                ops.push((kind, len));
            }
        }
    }

    ops
}
