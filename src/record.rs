//! The decoded alignment record model.
//!
//! An [`AlignmentRecord`] is an immutable snapshot of one alignment, decoded
//! once at read time from the underlying stream's representation. Every
//! accessor is a pure projection over the stored fields; the "absent data"
//! sentinels of the wire format (negative target indices and positions,
//! non-positive template lengths, missing tags) have already been folded into
//! `Option`s. Records hold an [`Arc`] to the target sequence set they were
//! read against, so name and length resolution needs no other context.

use crate::errors::{Result, SamstreamError};
use crate::location::{self, ReferenceLocation, SplicedLocation, Strand};
use crate::targets::TargetSeqSet;
use bstr::{BStr, BString, ByteSlice};
use noodles::core::Position;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record::{Flags, MappingQuality};
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::{Data, QualityScores, Sequence};
use std::sync::Arc;

/// Nucleotides this model accepts in a query sequence.
///
/// These are the characters the stream's 4-bit base codes {1, 2, 4, 8, 15}
/// decode to; anything else marks a corrupt or unsupported record.
const VALID_BASES: &[u8] = b"ACGTN";

/// An immutable, fully decoded alignment record.
///
/// Created by [`AlignmentReader::read_next`](crate::io::AlignmentReader::read_next)
/// or via [`RecordBuilder`](crate::builder::RecordBuilder) for writing. There
/// is no mutation API; records are freely shareable across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub(crate) targets: Arc<TargetSeqSet>,
    pub(crate) name: BString,
    pub(crate) flags: Flags,
    pub(crate) reference_sequence_id: Option<usize>,
    pub(crate) alignment_start: Option<u64>,
    pub(crate) mapping_quality: Option<u8>,
    pub(crate) cigar: Vec<(Kind, usize)>,
    pub(crate) sequence: Option<BString>,
    pub(crate) quality_scores: Vec<u8>,
    pub(crate) mate_reference_sequence_id: Option<usize>,
    pub(crate) mate_alignment_start: Option<u64>,
    pub(crate) template_length: Option<i64>,
    pub(crate) data: Data,
}

impl AlignmentRecord {
    /// Decodes a record from the underlying library's representation.
    ///
    /// Positions are converted from the stream's 1-based coordinates to this
    /// model's 0-based coordinates, `=`/`X` CIGAR operations collapse into
    /// plain matches, and the query sequence is validated against the
    /// A/C/G/T/N alphabet.
    ///
    /// # Errors
    /// Returns an error if the query sequence contains a base outside the
    /// recognized alphabet. Sequence decoding aborts for the whole record
    /// rather than substituting a placeholder.
    pub fn from_record_buf(record: &RecordBuf, targets: Arc<TargetSeqSet>) -> Result<Self> {
        let name = record.name().map(ToOwned::to_owned).unwrap_or_default();

        let seq_bytes = record.sequence().as_ref();
        let sequence = if seq_bytes.is_empty() {
            None
        } else {
            if let Some(bad) = seq_bytes.iter().find(|b| !VALID_BASES.contains(b)) {
                return Err(SamstreamError::RecordDecode {
                    name: name.to_string(),
                    reason: format!("unrecognized base '{}' in query sequence", *bad as char),
                });
            }
            Some(BString::from(seq_bytes))
        };

        let cigar: Vec<(Kind, usize)> = record
            .cigar()
            .as_ref()
            .iter()
            .map(|op| (collapse_kind(op.kind()), op.len()))
            .collect();

        let template_length = i64::from(record.template_length());

        Ok(Self {
            targets,
            name,
            flags: record.flags(),
            reference_sequence_id: record.reference_sequence_id(),
            alignment_start: record.alignment_start().map(|p| usize::from(p) as u64 - 1),
            mapping_quality: record.mapping_quality().map(u8::from),
            cigar,
            sequence,
            quality_scores: record.quality_scores().as_ref().to_vec(),
            mate_reference_sequence_id: record.mate_reference_sequence_id(),
            mate_alignment_start: record.mate_alignment_start().map(|p| usize::from(p) as u64 - 1),
            template_length: if template_length > 0 { Some(template_length) } else { None },
            data: record.data().clone(),
        })
    }

    /// Re-encodes the record into the underlying library's representation
    /// for serialization.
    ///
    /// # Errors
    /// Returns an error if a stored field cannot be represented on the wire
    /// (position or insert size out of range).
    pub fn to_record_buf(&self) -> Result<RecordBuf> {
        let mut buf = RecordBuf::default();

        *buf.name_mut() =
            if self.name.is_empty() { None } else { Some(self.name.clone()) };
        *buf.flags_mut() = self.flags;
        *buf.reference_sequence_id_mut() = self.reference_sequence_id;
        *buf.alignment_start_mut() = self
            .alignment_start
            .map(|p| encode_position(self.name.as_bstr(), p))
            .transpose()?;
        *buf.mapping_quality_mut() =
            self.mapping_quality.and_then(|q| MappingQuality::try_from(q).ok());
        *buf.cigar_mut() = self.cigar.iter().map(|&(kind, len)| Op::new(kind, len)).collect();

        if let Some(seq) = &self.sequence {
            *buf.sequence_mut() = Sequence::from(seq.to_vec());
        }
        *buf.quality_scores_mut() = QualityScores::from(self.quality_scores.clone());

        *buf.mate_reference_sequence_id_mut() = self.mate_reference_sequence_id;
        *buf.mate_alignment_start_mut() = self
            .mate_alignment_start
            .map(|p| encode_position(self.name.as_bstr(), p))
            .transpose()?;

        if let Some(tlen) = self.template_length {
            *buf.template_length_mut() =
                i32::try_from(tlen).map_err(|_| SamstreamError::RecordEncode {
                    name: self.name.to_string(),
                    reason: format!("insert size {tlen} out of range"),
                })?;
        }

        *buf.data_mut() = self.data.clone();

        Ok(buf)
    }

    /// The target sequence set this record was decoded against.
    #[must_use]
    pub fn targets(&self) -> &Arc<TargetSeqSet> {
        &self.targets
    }

    /// Query (read) name.
    #[must_use]
    pub fn query_name(&self) -> &BStr {
        self.name.as_bstr()
    }

    /// Raw flag word.
    #[must_use]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Index of the target this record aligns to, or `None` if unmapped.
    #[must_use]
    pub fn target_id(&self) -> Option<usize> {
        self.reference_sequence_id
    }

    /// Name of the target this record aligns to, resolved through the target
    /// set. `None` if unmapped or the index is not in the set.
    #[must_use]
    pub fn target_name(&self) -> Option<&BStr> {
        self.reference_sequence_id.and_then(|id| self.targets.name_of(id))
    }

    /// Length of the target this record aligns to. `None` if unmapped or the
    /// index is not in the set.
    #[must_use]
    pub fn target_len(&self) -> Option<u64> {
        self.reference_sequence_id.and_then(|id| self.targets.length_of(id))
    }

    /// 0-based leftmost aligned coordinate, or `None` if unmapped.
    #[must_use]
    pub fn position(&self) -> Option<u64> {
        self.alignment_start
    }

    /// Mapping quality, or `None` when unavailable.
    #[must_use]
    pub fn mapping_quality(&self) -> Option<u8> {
        self.mapping_quality
    }

    /// CIGAR operations as `(kind, length)` pairs.
    #[must_use]
    pub fn cigar(&self) -> &[(Kind, usize)] {
        &self.cigar
    }

    /// Query sequence over {A, C, G, T, N}, or `None` when the record
    /// carries no sequence.
    #[must_use]
    pub fn query_sequence(&self) -> Option<&BStr> {
        self.sequence.as_ref().map(|s| s.as_bstr())
    }

    /// Query sequence length, or `None` when the record carries no sequence.
    #[must_use]
    pub fn query_length(&self) -> Option<u64> {
        self.sequence.as_ref().map(|s| s.len() as u64)
    }

    /// Per-base quality scores. Empty when the record carries none.
    #[must_use]
    pub fn quality_scores(&self) -> &[u8] {
        &self.quality_scores
    }

    /// Index of the mate's target, or `None` if the mate is unmapped.
    #[must_use]
    pub fn mate_target_id(&self) -> Option<usize> {
        self.mate_reference_sequence_id
    }

    /// Name of the mate's target, resolved through the target set.
    #[must_use]
    pub fn mate_target_name(&self) -> Option<&BStr> {
        self.mate_reference_sequence_id.and_then(|id| self.targets.name_of(id))
    }

    /// 0-based leftmost aligned coordinate of the mate, or `None`.
    #[must_use]
    pub fn mate_position(&self) -> Option<u64> {
        self.mate_alignment_start
    }

    /// Observed template length. `None` covers both "absent" and a reported
    /// non-positive value; the two are not distinguished.
    #[must_use]
    pub fn insert_size(&self) -> Option<i64> {
        self.template_length
    }

    // Flag predicates. Each is "is bit B set in the raw flag word"; the bits
    // are independent and no combination is rejected here.

    /// 0x1: template has multiple segments.
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.flags.is_segmented()
    }

    /// 0x2: each segment properly aligned according to the aligner.
    #[must_use]
    pub fn is_proper_pair(&self) -> bool {
        self.flags.is_properly_segmented()
    }

    /// 0x4: segment unmapped.
    #[must_use]
    pub fn is_unmapped(&self) -> bool {
        self.flags.is_unmapped()
    }

    /// 0x8: next segment in the template unmapped.
    #[must_use]
    pub fn is_mate_unmapped(&self) -> bool {
        self.flags.is_mate_unmapped()
    }

    /// 0x10: sequence reverse complemented.
    #[must_use]
    pub fn is_reverse_complemented(&self) -> bool {
        self.flags.is_reverse_complemented()
    }

    /// 0x20: sequence of the next segment reverse complemented.
    #[must_use]
    pub fn is_mate_reverse_complemented(&self) -> bool {
        self.flags.is_mate_reverse_complemented()
    }

    /// 0x40: first segment in the template.
    #[must_use]
    pub fn is_first_in_template(&self) -> bool {
        self.flags.is_first_segment()
    }

    /// 0x80: last segment in the template.
    #[must_use]
    pub fn is_second_in_template(&self) -> bool {
        self.flags.is_last_segment()
    }

    /// 0x100: secondary alignment.
    #[must_use]
    pub fn is_secondary(&self) -> bool {
        self.flags.is_secondary()
    }

    /// 0x200: not passing filters.
    #[must_use]
    pub fn is_qc_fail(&self) -> bool {
        self.flags.is_qc_fail()
    }

    /// 0x400: PCR or optical duplicate.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.flags.is_duplicate()
    }

    /// Strand derived from the reverse-complemented flag.
    #[must_use]
    pub fn strand(&self) -> Strand {
        if self.is_reverse_complemented() { Strand::Reverse } else { Strand::Forward }
    }

    /// Full optional-tag table.
    #[must_use]
    pub fn data(&self) -> &Data {
        &self.data
    }

    /// NM tag: edit distance to the reference. `None` when absent or not an
    /// integer.
    #[must_use]
    pub fn mismatch_count(&self) -> Option<i64> {
        self.tag_int(Tag::from([b'N', b'M']))
    }

    /// NH tag: number of reported alignments for the query. `None` when
    /// absent or not an integer.
    #[must_use]
    pub fn hit_count(&self) -> Option<i64> {
        self.tag_int(Tag::from([b'N', b'H']))
    }

    /// MD tag: match descriptor string. `None` when absent or not a string.
    #[must_use]
    pub fn match_descriptor(&self) -> Option<&BStr> {
        match self.data.get(&Tag::from([b'M', b'D'])) {
            Some(Value::String(s)) => Some(s.as_bstr()),
            _ => None,
        }
    }

    /// Looks up an integer-valued tag, accepting any of the integer
    /// encodings the wire format allows.
    #[must_use]
    pub fn tag_int(&self, tag: Tag) -> Option<i64> {
        match self.data.get(&tag)? {
            Value::Int8(v) => Some(i64::from(*v)),
            Value::UInt8(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(i64::from(*v)),
            Value::UInt16(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::UInt32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// The reference intervals this alignment covers, split at skip
    /// operations and tagged with the strand.
    ///
    /// `None` for unmapped records or records whose CIGAR consumes no
    /// reference bases, regardless of any stored CIGAR data.
    #[must_use]
    pub fn spliced_location(&self) -> Option<SplicedLocation> {
        self.reference_sequence_id?;
        let position = self.alignment_start?;
        location::spliced_location(position, &self.cigar, self.strand())
    }

    /// The spliced location qualified with the resolved target name, or
    /// `None` when the record is unmapped or the target cannot be resolved.
    #[must_use]
    pub fn reference_location(&self) -> Option<ReferenceLocation> {
        let name = self.target_name()?;
        let location = self.spliced_location()?;
        Some(ReferenceLocation { name: name.into(), location })
    }
}

/// Folds sequence-match/mismatch operations into plain matches; the model's
/// CIGAR alphabet does not distinguish them.
fn collapse_kind(kind: Kind) -> Kind {
    match kind {
        Kind::SequenceMatch | Kind::SequenceMismatch => Kind::Match,
        other => other,
    }
}

fn encode_position(name: &BStr, position: u64) -> Result<Position> {
    usize::try_from(position)
        .ok()
        .and_then(|p| p.checked_add(1))
        .and_then(Position::new)
        .ok_or_else(|| SamstreamError::RecordEncode {
            name: name.to_string(),
            reason: format!("position {position} out of range"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RecordBuilder;

    fn test_targets() -> Arc<TargetSeqSet> {
        TargetSeqSet::new(vec![(BString::from("chr1"), 1000), (BString::from("chr2"), 500)])
    }

    #[test]
    fn test_flag_predicates_are_independent_bits() {
        let targets = test_targets();
        let predicates: [(u16, fn(&AlignmentRecord) -> bool); 11] = [
            (0x1, AlignmentRecord::is_paired),
            (0x2, AlignmentRecord::is_proper_pair),
            (0x4, AlignmentRecord::is_unmapped),
            (0x8, AlignmentRecord::is_mate_unmapped),
            (0x10, AlignmentRecord::is_reverse_complemented),
            (0x20, AlignmentRecord::is_mate_reverse_complemented),
            (0x40, AlignmentRecord::is_first_in_template),
            (0x80, AlignmentRecord::is_second_in_template),
            (0x100, AlignmentRecord::is_secondary),
            (0x200, AlignmentRecord::is_qc_fail),
            (0x400, AlignmentRecord::is_duplicate),
        ];

        for (bit, _) in predicates {
            // A word with only this bit set: exactly this predicate true.
            let only = RecordBuilder::new(targets.clone())
                .name("r")
                .flags(Flags::from(bit))
                .build();
            // A word with every bit but this one: exactly this predicate false.
            let all_but = RecordBuilder::new(targets.clone())
                .name("r")
                .flags(Flags::from(0x7FF & !bit))
                .build();

            for (other_bit, other_pred) in predicates {
                assert_eq!(
                    other_pred(&only),
                    other_bit == bit,
                    "bit {bit:#x} alone: predicate for {other_bit:#x} wrong"
                );
                assert_eq!(
                    other_pred(&all_but),
                    other_bit != bit,
                    "bit {bit:#x} cleared: predicate for {other_bit:#x} wrong"
                );
            }
        }
    }

    #[test]
    fn test_unmapped_record_has_no_target_fields() {
        let record = RecordBuilder::new(test_targets()).name("unmapped").build();
        assert_eq!(record.target_id(), None);
        assert_eq!(record.target_name(), None);
        assert_eq!(record.target_len(), None);
        assert_eq!(record.position(), None);
    }

    #[test]
    fn test_mapped_record_resolves_target() {
        let record = RecordBuilder::new(test_targets())
            .name("mapped")
            .target_id(1)
            .position(42)
            .cigar_str("10M")
            .build();
        assert_eq!(record.target_id(), Some(1));
        assert_eq!(record.target_name().map(|n| n.to_string()), Some("chr2".to_string()));
        assert_eq!(record.target_len(), Some(500));
        assert_eq!(record.position(), Some(42));
    }

    #[test]
    fn test_out_of_set_target_index_resolves_to_none() {
        let record = RecordBuilder::new(test_targets()).name("stray").target_id(7).build();
        assert_eq!(record.target_id(), Some(7));
        assert_eq!(record.target_name(), None);
        assert_eq!(record.target_len(), None);
    }

    #[test]
    fn test_query_sequence_and_length() {
        let record =
            RecordBuilder::new(test_targets()).name("r").sequence("ACGTN").build();
        assert_eq!(record.query_sequence().map(|s| s.to_string()), Some("ACGTN".to_string()));
        assert_eq!(record.query_length(), Some(5));

        let empty = RecordBuilder::new(test_targets()).name("r").build();
        assert_eq!(empty.query_sequence(), None);
        assert_eq!(empty.query_length(), None);
    }

    #[test]
    fn test_decode_rejects_unrecognized_base() {
        let mut buf = RecordBuf::default();
        *buf.sequence_mut() = Sequence::from(b"ACMT".to_vec());
        let err = AlignmentRecord::from_record_buf(&buf, test_targets()).unwrap_err();
        assert!(matches!(err, SamstreamError::RecordDecode { .. }));
        assert!(err.to_string().contains('M'));
    }

    #[test]
    fn test_insert_size_merges_absent_and_non_positive() {
        let targets = test_targets();
        let mut buf = RecordBuf::default();
        *buf.template_length_mut() = 0;
        let rec = AlignmentRecord::from_record_buf(&buf, targets.clone()).unwrap();
        assert_eq!(rec.insert_size(), None);

        *buf.template_length_mut() = -250;
        let rec = AlignmentRecord::from_record_buf(&buf, targets.clone()).unwrap();
        assert_eq!(rec.insert_size(), None);

        *buf.template_length_mut() = 250;
        let rec = AlignmentRecord::from_record_buf(&buf, targets).unwrap();
        assert_eq!(rec.insert_size(), Some(250));
    }

    #[test]
    fn test_tag_lookups() {
        let record = RecordBuilder::new(test_targets())
            .name("tagged")
            .tag_int("NM", 3)
            .tag_int("NH", 1)
            .tag_str("MD", "50A49")
            .build();
        assert_eq!(record.mismatch_count(), Some(3));
        assert_eq!(record.hit_count(), Some(1));
        assert_eq!(record.match_descriptor().map(|s| s.to_string()), Some("50A49".to_string()));
    }

    #[test]
    fn test_absent_tag_is_none_not_error() {
        let record = RecordBuilder::new(test_targets()).name("bare").build();
        assert_eq!(record.mismatch_count(), None);
        assert_eq!(record.hit_count(), None);
        assert_eq!(record.match_descriptor(), None);
    }

    #[test]
    fn test_wrong_typed_tag_is_none() {
        let record = RecordBuilder::new(test_targets())
            .name("odd")
            .tag_str("NM", "three")
            .build();
        assert_eq!(record.mismatch_count(), None);
    }

    #[test]
    fn test_spliced_location_forward() {
        let record = RecordBuilder::new(test_targets())
            .name("fwd")
            .target_id(0)
            .position(100)
            .cigar_str("50M")
            .build();
        let loc = record.spliced_location().unwrap();
        assert_eq!(loc.blocks(), &[100..150]);
        assert_eq!(loc.strand(), Strand::Forward);
    }

    #[test]
    fn test_spliced_location_reverse_strand() {
        let record = RecordBuilder::new(test_targets())
            .name("rev")
            .target_id(0)
            .position(100)
            .cigar_str("50M")
            .flags(Flags::REVERSE_COMPLEMENTED)
            .build();
        assert_eq!(record.spliced_location().unwrap().strand(), Strand::Reverse);
    }

    #[test]
    fn test_spliced_location_with_skip() {
        let record = RecordBuilder::new(test_targets())
            .name("spliced")
            .target_id(0)
            .position(100)
            .cigar_str("20M30N20M")
            .build();
        let loc = record.spliced_location().unwrap();
        assert_eq!(loc.blocks(), &[100..120, 150..170]);
    }

    #[test]
    fn test_unmapped_record_has_no_locations_despite_cigar() {
        let record = RecordBuilder::new(test_targets())
            .name("unmapped")
            .cigar_str("50M")
            .build();
        assert_eq!(record.spliced_location(), None);
        assert_eq!(record.reference_location(), None);
    }

    #[test]
    fn test_reference_location_pairs_target_name() {
        let record = RecordBuilder::new(test_targets())
            .name("q")
            .target_id(1)
            .position(10)
            .cigar_str("10M")
            .build();
        let loc = record.reference_location().unwrap();
        assert_eq!(loc.name, BString::from("chr2"));
        assert_eq!(loc.location.blocks(), &[10..20]);
    }

    #[test]
    fn test_reference_location_none_when_target_unresolvable() {
        let record = RecordBuilder::new(test_targets())
            .name("stray")
            .target_id(9)
            .position(10)
            .cigar_str("10M")
            .build();
        assert!(record.spliced_location().is_some());
        assert_eq!(record.reference_location(), None);
    }

    #[test]
    fn test_record_buf_round_trip() {
        let original = RecordBuilder::new(test_targets())
            .name("rt")
            .flags(Flags::SEGMENTED | Flags::FIRST_SEGMENT | Flags::MATE_REVERSE_COMPLEMENTED)
            .target_id(0)
            .position(99)
            .mapping_quality(60)
            .cigar_str("10M2D40M")
            .sequence(&"ACGTN".repeat(10))
            .qualities(&[30u8; 50])
            .mate_target_id(0)
            .mate_position(300)
            .insert_size(251)
            .tag_int("NM", 2)
            .build();

        let buf = original.to_record_buf().unwrap();
        let decoded =
            AlignmentRecord::from_record_buf(&buf, original.targets().clone()).unwrap();

        assert_eq!(decoded.query_name(), original.query_name());
        assert_eq!(decoded.flags(), original.flags());
        assert_eq!(decoded.target_id(), original.target_id());
        assert_eq!(decoded.position(), original.position());
        assert_eq!(decoded.mapping_quality(), original.mapping_quality());
        assert_eq!(decoded.cigar(), original.cigar());
        assert_eq!(decoded.query_sequence(), original.query_sequence());
        assert_eq!(decoded.quality_scores(), original.quality_scores());
        assert_eq!(decoded.mate_target_id(), original.mate_target_id());
        assert_eq!(decoded.mate_position(), original.mate_position());
        assert_eq!(decoded.insert_size(), original.insert_size());
        assert_eq!(decoded.mismatch_count(), original.mismatch_count());
    }

    #[test]
    fn test_encode_rejects_out_of_range_fields() {
        let record = RecordBuilder::new(test_targets())
            .name("far")
            .target_id(0)
            .position(u64::MAX)
            .build();
        let err = record.to_record_buf().unwrap_err();
        assert!(matches!(err, SamstreamError::RecordEncode { .. }));
        assert!(err.to_string().contains("encode"));

        let record = RecordBuilder::new(test_targets())
            .name("wide")
            .insert_size(i64::from(i32::MAX) + 1)
            .build();
        let err = record.to_record_buf().unwrap_err();
        assert!(matches!(err, SamstreamError::RecordEncode { .. }));
        assert!(err.to_string().contains("insert size"));
    }

    #[test]
    fn test_sequence_match_mismatch_collapse_to_match() {
        let mut buf = RecordBuf::default();
        *buf.cigar_mut() =
            [Op::new(Kind::SequenceMatch, 5), Op::new(Kind::SequenceMismatch, 3)]
                .into_iter()
                .collect();
        let rec = AlignmentRecord::from_record_buf(&buf, test_targets()).unwrap();
        assert_eq!(rec.cigar(), &[(Kind::Match, 5), (Kind::Match, 3)]);
    }
}
