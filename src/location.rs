//! Derivation of reference-genome intervals from CIGAR operations.
//!
//! An alignment's footprint on the reference is one contiguous interval
//! unless the CIGAR contains skip (`N`) operations, in which case the
//! footprint splits into multiple disjoint intervals (a "spliced" location,
//! typical of RNA alignments spanning introns). The translation here is a
//! pure function of the alignment start, the CIGAR, and the strand.

use bstr::BString;
use noodles::sam::alignment::record::cigar::op::Kind;
use std::fmt;
use std::ops::Range;

/// Strand of an alignment relative to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    /// Alignment reported against the reference as-is
    Forward,
    /// Alignment reported against the reverse complement
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// A stranded reference interval made of one or more disjoint blocks.
///
/// Blocks are 0-based half-open ranges, ordered by start coordinate. A
/// location with a single block is an ordinary contiguous alignment; more
/// than one block means the alignment skips over reference bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplicedLocation {
    blocks: Vec<Range<u64>>,
    strand: Strand,
}

impl SplicedLocation {
    /// The ordered interval blocks.
    #[must_use]
    pub fn blocks(&self) -> &[Range<u64>] {
        &self.blocks
    }

    /// The alignment strand.
    #[must_use]
    pub fn strand(&self) -> Strand {
        self.strand
    }

    /// Start of the first block (0-based).
    #[must_use]
    pub fn start(&self) -> u64 {
        self.blocks[0].start
    }

    /// End of the last block (0-based, exclusive).
    #[must_use]
    pub fn end(&self) -> u64 {
        self.blocks[self.blocks.len() - 1].end
    }
}

impl fmt::Display for SplicedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "[{},{})", block.start, block.end)?;
        }
        write!(f, "/{}", self.strand)
    }
}

/// A spliced location qualified with the target sequence it lies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLocation {
    /// Target sequence name
    pub name: BString,
    /// Interval blocks and strand on that target
    pub location: SplicedLocation,
}

impl fmt::Display for ReferenceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.location)
    }
}

/// Translates a CIGAR into the reference intervals it covers.
///
/// Walks the operations in order with a reference cursor starting at
/// `position` (0-based). Match and deletion operations extend the current
/// interval; a skip closes it and opens a new one past the skipped bases;
/// insertions, clips, and padding leave the cursor untouched. Returns `None`
/// when `cigar` is empty.
#[must_use]
pub fn spliced_location(position: u64, cigar: &[(Kind, usize)], strand: Strand) -> Option<SplicedLocation> {
    if cigar.is_empty() {
        return None;
    }

    let mut blocks = Vec::new();
    let mut block_start = position;
    let mut cursor = position;

    for &(kind, len) in cigar {
        let len = len as u64;
        match kind {
            Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch | Kind::Deletion => {
                cursor += len;
            }
            Kind::Skip => {
                if cursor > block_start {
                    blocks.push(block_start..cursor);
                }
                cursor += len;
                block_start = cursor;
            }
            Kind::Insertion | Kind::SoftClip | Kind::HardClip | Kind::Pad => {}
        }
    }

    if cursor > block_start {
        blocks.push(block_start..cursor);
    }

    if blocks.is_empty() {
        // CIGAR consumed no reference bases (e.g. all clips/insertions)
        return None;
    }

    Some(SplicedLocation { blocks, strand })
}
