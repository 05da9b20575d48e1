#![deny(unsafe_code)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

//! # samstream - streaming SAM/BAM alignment records
//!
//! This library provides a decoded, immutable model of SAM/BAM alignment
//! records and thread-safe handles for streaming them to and from disk.
//!
//! ## Overview
//!
//! - **[`targets`]** - the ordered set of reference (target) sequences a
//!   stream's alignments are reported against
//! - **[`record`]** - the decoded alignment record: flags, positions, CIGAR,
//!   query sequence, mate fields, and typed optional tags
//! - **[`builder`]** - fluent construction of records for writing and testing
//! - **[`location`]** - derivation of (possibly spliced) reference intervals
//!   from CIGAR operations
//! - **[`io`]** - mutex-guarded input/output handles over SAM or BAM streams
//!
//! Physical encoding (BGZF compression, BAM/SAM wire format) is delegated to
//! [noodles](https://github.com/zaeleus/noodles); this crate decodes each
//! record once at read time into an immutable value that can be shared freely
//! across threads.
//!
//! ## Quick start
//!
//! ```no_run
//! use samstream::io::{AlignmentReader, Format};
//!
//! # fn main() -> anyhow::Result<()> {
//! let reader = AlignmentReader::open("input.bam", Format::Bam)?;
//! while let Some(record) = reader.read_next()? {
//!     if let Some(loc) = record.reference_location() {
//!         println!("{} -> {}", record.query_name(), loc);
//!     }
//! }
//! reader.close()?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod errors;
pub mod io;
pub mod location;
pub mod record;
pub mod targets;

pub use builder::RecordBuilder;
pub use errors::{Result, SamstreamError};
pub use io::{AlignmentReader, AlignmentWriter, Format};
pub use location::{ReferenceLocation, SplicedLocation, Strand};
pub use record::AlignmentRecord;
pub use targets::TargetSeqSet;
