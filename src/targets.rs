//! The ordered set of reference (target) sequences for an alignment stream.
//!
//! A [`TargetSeqSet`] is built once, either from a parsed stream header or
//! directly by the caller, and is immutable thereafter. It is shared via
//! [`Arc`] between a handle and every record the handle produces, so record
//! accessors can resolve target indices into names and lengths without
//! holding any lock.

use crate::errors::{Result, SamstreamError};
use bstr::{BStr, BString};
use noodles::sam::Header;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::ReferenceSequence;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Immutable ordered list of target sequence names and lengths.
///
/// Indices are positions in this ordering and are stable for the lifetime of
/// the set. Names need not be unique; name lookup returns the first match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSeqSet {
    seqs: Vec<(BString, u64)>,
}

impl TargetSeqSet {
    /// Creates a target set from `(name, length)` pairs in order.
    #[must_use]
    pub fn new(seqs: Vec<(BString, u64)>) -> Arc<Self> {
        Arc::new(Self { seqs })
    }

    /// Builds the target set from a parsed SAM header, preserving the
    /// header's reference sequence ordering.
    #[must_use]
    pub fn from_header(header: &Header) -> Arc<Self> {
        let seqs = header
            .reference_sequences()
            .iter()
            .map(|(name, map)| (name.clone(), map.length().get() as u64))
            .collect();
        Arc::new(Self { seqs })
    }

    /// Derives a SAM header carrying this set's reference sequences, for
    /// supplying to an output stream at open time.
    ///
    /// # Errors
    /// Returns an error if any target has length zero, which the header
    /// cannot represent.
    pub fn to_header(&self) -> Result<Header> {
        let mut builder = Header::builder();
        for (name, length) in &self.seqs {
            let len = NonZeroUsize::new(*length as usize).ok_or_else(|| {
                SamstreamError::InvalidTargetLength { name: name.to_string(), length: *length }
            })?;
            builder = builder.add_reference_sequence(name.clone(), Map::<ReferenceSequence>::new(len));
        }
        Ok(builder.build())
    }

    /// Number of target sequences in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    /// Returns true if the set holds no target sequences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// Returns the `(name, length)` pair at `index`.
    ///
    /// # Errors
    /// Returns an error if `index` is out of range.
    pub fn get(&self, index: usize) -> Result<(&BStr, u64)> {
        self.seqs
            .get(index)
            .map(|(name, len)| (name.as_ref(), *len))
            .ok_or(SamstreamError::TargetIndexOutOfRange { index, len: self.seqs.len() })
    }

    /// Returns the index of the first target sequence with the given name,
    /// or `None` if no target has that name. Linear scan.
    #[must_use]
    pub fn index_of(&self, name: &[u8]) -> Option<usize> {
        self.seqs.iter().position(|(n, _)| n == name)
    }

    /// Returns the name of the target at `index`, or `None` if out of range.
    #[must_use]
    pub fn name_of(&self, index: usize) -> Option<&BStr> {
        self.seqs.get(index).map(|(name, _)| name.as_ref())
    }

    /// Returns the length of the target at `index`, or `None` if out of range.
    #[must_use]
    pub fn length_of(&self, index: usize) -> Option<u64> {
        self.seqs.get(index).map(|(_, len)| *len)
    }

    /// Iterates over `(name, length)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&BStr, u64)> {
        self.seqs.iter().map(|(name, len)| (name.as_ref(), *len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_set() -> Arc<TargetSeqSet> {
        TargetSeqSet::new(vec![
            (BString::from("chr1"), 1000),
            (BString::from("chr2"), 500),
            (BString::from("chr1"), 250), // duplicate name on purpose
        ])
    }

    #[test]
    fn test_len_and_get() {
        let set = test_set();
        assert_eq!(set.len(), 3);
        let (name, len) = set.get(1).unwrap();
        assert_eq!(name, "chr2");
        assert_eq!(len, 500);
    }

    #[test]
    fn test_get_out_of_range() {
        let set = test_set();
        let err = set.get(3).unwrap_err();
        assert!(matches!(err, SamstreamError::TargetIndexOutOfRange { index: 3, len: 3 }));
    }

    #[test]
    fn test_index_of_returns_first_match() {
        let set = test_set();
        assert_eq!(set.index_of(b"chr1"), Some(0));
        assert_eq!(set.index_of(b"chr2"), Some(1));
        assert_eq!(set.index_of(b"chrM"), None);
    }

    #[test]
    fn test_name_and_length_lookups() {
        let set = test_set();
        assert_eq!(set.name_of(2).map(|n| n.to_string()), Some("chr1".to_string()));
        assert_eq!(set.length_of(2), Some(250));
        assert_eq!(set.name_of(9), None);
        assert_eq!(set.length_of(9), None);
    }

    #[test]
    fn test_header_round_trip() {
        // Headers key reference sequences by name, so use unique names here.
        let set = TargetSeqSet::new(vec![
            (BString::from("chr1"), 1000),
            (BString::from("chr2"), 500),
        ]);
        let header = set.to_header().unwrap();
        let rebuilt = TargetSeqSet::from_header(&header);
        assert_eq!(*set, *rebuilt);
    }

    #[test]
    fn test_to_header_rejects_zero_length() {
        let set = TargetSeqSet::new(vec![(BString::from("empty"), 0)]);
        let err = set.to_header().unwrap_err();
        assert!(matches!(err, SamstreamError::InvalidTargetLength { .. }));
    }

    #[test]
    fn test_iter_preserves_order() {
        let set = test_set();
        let names: Vec<String> = set.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["chr1", "chr2", "chr1"]);
    }
}
