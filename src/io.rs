//! Mutex-guarded input and output handles for alignment streams.
//!
//! Each handle owns exactly one underlying stream plus a lock guarding it.
//! Read and write operations acquire the lock for the duration of a single
//! record transfer and release it before the decoded record is handed back,
//! so concurrent callers on one handle serialize at the record level while
//! handles on distinct streams never contend with each other.
//!
//! Closing a handle releases the underlying stream exactly once; a second
//! close is a no-op, and transfers attempted after close fail with
//! [`SamstreamError::HandleClosed`].

use crate::errors::{Result, SamstreamError};
use crate::record::AlignmentRecord;
use crate::targets::TargetSeqSet;
use anyhow::Context;
use log::debug;
use noodles::sam::Header;
use noodles::sam::alignment::RecordBuf;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::{bam, bgzf, sam};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

/// On-disk format of an alignment stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Text tabular format
    Sam,
    /// Binary BGZF-compressed format
    Bam,
}

/// Enum wrapping the SAM and BAM reader types behind one interface.
enum InnerReader {
    Sam(sam::io::Reader<BufReader<File>>),
    Bam(bam::io::Reader<bgzf::io::Reader<File>>),
}

impl InnerReader {
    fn read_record_buf(&mut self, header: &Header, record: &mut RecordBuf) -> io::Result<usize> {
        match self {
            InnerReader::Sam(r) => r.read_record_buf(header, record),
            InnerReader::Bam(r) => r.read_record_buf(header, record),
        }
    }
}

/// Enum wrapping the SAM and BAM writer types behind one interface.
enum InnerWriter {
    Sam(sam::io::Writer<File>),
    Bam(bam::io::Writer<bgzf::io::Writer<File>>),
}

impl InnerWriter {
    fn write_alignment_record(&mut self, header: &Header, record: &RecordBuf) -> io::Result<()> {
        match self {
            InnerWriter::Sam(w) => w.write_alignment_record(header, record),
            InnerWriter::Bam(w) => w.write_alignment_record(header, record),
        }
    }

    /// Flushes and finalizes the stream (BAM gets its BGZF EOF marker).
    fn finish(self) -> io::Result<()> {
        match self {
            InnerWriter::Sam(w) => w.into_inner().flush(),
            InnerWriter::Bam(w) => w.into_inner().finish().map(|_| ()),
        }
    }
}

/// Input handle producing a lazy, finite sequence of alignment records.
///
/// Safe to share across threads; see the module docs for the locking
/// discipline. The handle is not auto-closed at end of stream.
pub struct AlignmentReader {
    inner: Mutex<Option<InnerReader>>,
    header: Header,
    targets: Arc<TargetSeqSet>,
}

impl AlignmentReader {
    /// Opens an alignment stream and parses its header into a target set.
    ///
    /// Fails atomically: on any error the handle is never constructed.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the header cannot be
    /// read.
    pub fn open<P: AsRef<Path>>(path: P, format: Format) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .with_context(|| format!("Failed to open input alignments: {}", path_ref.display()))?;

        let (inner, header) = match format {
            Format::Sam => {
                let mut reader = sam::io::Reader::new(BufReader::new(file));
                let header = reader.read_header().with_context(|| {
                    format!("Failed to read header from: {}", path_ref.display())
                })?;
                (InnerReader::Sam(reader), header)
            }
            Format::Bam => {
                let mut reader = bam::io::Reader::new(file);
                let header = reader.read_header().with_context(|| {
                    format!("Failed to read header from: {}", path_ref.display())
                })?;
                (InnerReader::Bam(reader), header)
            }
        };

        let targets = TargetSeqSet::from_header(&header);
        debug!("opened {} for reading ({} targets)", path_ref.display(), targets.len());

        Ok(Self { inner: Mutex::new(Some(inner)), header, targets })
    }

    /// The target sequence set parsed from the stream header.
    #[must_use]
    pub fn targets(&self) -> &Arc<TargetSeqSet> {
        &self.targets
    }

    /// The parsed stream header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Reads the next record from the stream.
    ///
    /// Returns `Ok(Some(record))` while records remain and `Ok(None)` at a
    /// clean end of stream. A malformed record propagates as an error and is
    /// never converted to end-of-stream.
    ///
    /// # Errors
    /// Returns an error if the handle is closed, the underlying read fails,
    /// or the record cannot be decoded.
    pub fn read_next(&self) -> Result<Option<AlignmentRecord>> {
        let mut buf = RecordBuf::default();

        // Hold the lock for one record transfer only; decode after release.
        {
            let mut guard = self.inner.lock();
            let inner = guard
                .as_mut()
                .ok_or(SamstreamError::HandleClosed { operation: "read record" })?;
            if inner.read_record_buf(&self.header, &mut buf)? == 0 {
                return Ok(None);
            }
        }

        AlignmentRecord::from_record_buf(&buf, Arc::clone(&self.targets)).map(Some)
    }

    /// Releases the underlying stream. Idempotent and safe to call from any
    /// thread; blocks until an in-flight transfer finishes.
    pub fn close(&self) -> Result<()> {
        if self.inner.lock().take().is_some() {
            debug!("closed alignment reader");
        }
        Ok(())
    }
}

/// Output handle accepting alignment records for serialization.
///
/// Mirrors [`AlignmentReader`]'s locking and close discipline.
pub struct AlignmentWriter {
    inner: Mutex<Option<InnerWriter>>,
    header: Header,
    targets: Arc<TargetSeqSet>,
}

impl AlignmentWriter {
    /// Creates an alignment stream, deriving and writing its header from the
    /// supplied target set.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created, the target set cannot
    /// be represented as a header, or writing the header fails.
    pub fn create<P: AsRef<Path>>(
        path: P,
        format: Format,
        targets: Arc<TargetSeqSet>,
    ) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let header = targets.to_header()?;
        let file = File::create(path_ref).with_context(|| {
            format!("Failed to create output alignments: {}", path_ref.display())
        })?;

        let inner = match format {
            Format::Sam => {
                let mut writer = sam::io::Writer::new(file);
                writer.write_header(&header).with_context(|| {
                    format!("Failed to write header to: {}", path_ref.display())
                })?;
                InnerWriter::Sam(writer)
            }
            Format::Bam => {
                let mut writer = bam::io::Writer::new(file);
                writer.write_header(&header).with_context(|| {
                    format!("Failed to write header to: {}", path_ref.display())
                })?;
                InnerWriter::Bam(writer)
            }
        };

        debug!("opened {} for writing ({} targets)", path_ref.display(), targets.len());

        Ok(Self { inner: Mutex::new(Some(inner)), header, targets })
    }

    /// The target sequence set this handle's header was derived from.
    #[must_use]
    pub fn targets(&self) -> &Arc<TargetSeqSet> {
        &self.targets
    }

    /// Serializes one record through the underlying stream.
    ///
    /// No check is made that the record's target set matches this handle's;
    /// writing a record decoded against a foreign target set is the caller's
    /// responsibility to avoid.
    ///
    /// # Errors
    /// Returns an error if the handle is closed, the record cannot be
    /// re-encoded, or the underlying write fails. A failed write is never
    /// reported as success.
    pub fn write(&self, record: &AlignmentRecord) -> Result<()> {
        // Re-encoding is pure; only the transfer itself needs the lock.
        let buf = record.to_record_buf()?;

        let mut guard = self.inner.lock();
        let inner = guard
            .as_mut()
            .ok_or(SamstreamError::HandleClosed { operation: "write record" })?;
        inner.write_alignment_record(&self.header, &buf)?;
        Ok(())
    }

    /// Flushes and releases the underlying stream. Idempotent; the first
    /// close finalizes the stream (including the BGZF end-of-file marker for
    /// BAM), later closes are no-ops.
    ///
    /// # Errors
    /// Returns an error if finalizing the stream fails.
    pub fn close(&self) -> Result<()> {
        let inner = self.inner.lock().take();
        if let Some(writer) = inner {
            writer.finish()?;
            debug!("closed alignment writer");
        }
        Ok(())
    }
}

impl Drop for AlignmentWriter {
    fn drop(&mut self) {
        // Flush on scope exit; errors here have nowhere to go.
        let _ = self.close();
    }
}
