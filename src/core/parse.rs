//! Purpose: Wire the decode pipeline: detect, tokenize, split, assemble.
//! Exports: `Mode`, `DecodeOptions`, `InterchangeReader`, `decode_str`.
//! Role: Orchestration only; every stage keeps its own logic and errors.
//! Invariants: One forward pass; delimiters are re-detected per interchange.
//! Invariants: Cancellation is checked between segments, never mid-segment.
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::delim::{Delimiters, ISA_HEADER_LEN};
use crate::core::envelope::{Assembler, Feed, Interchange};
use crate::core::error::{Error, ErrorKind};
use crate::core::segment::split_segment;
use crate::core::tokenize::{RawSegment, SegmentSource};
use crate::core::warning::Warning;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Strict,
    Lenient,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DecodeOptions {
    pub mode: Mode,
}

/// Pull-based decoder over a stream of one or more concatenated interchanges.
/// Each call to `next_interchange` parses exactly one, with a fresh delimiter
/// set, and leaves the source positioned at the next.
pub struct InterchangeReader<R: BufRead> {
    source: SegmentSource<R>,
    options: DecodeOptions,
    cancel: Option<Arc<AtomicBool>>,
}

impl<R: BufRead> InterchangeReader<R> {
    pub fn new(reader: R, options: DecodeOptions) -> Self {
        Self {
            source: SegmentSource::new(reader),
            options,
            cancel: None,
        }
    }

    /// Cooperative cancellation: the flag is polled between segments and a
    /// set flag abandons the open-node stack without a partial tree.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn next_interchange(&mut self) -> Result<Option<Interchange>, Error> {
        if !self.source.skip_gap()? {
            return Ok(None);
        }

        let header_offset = self.source.offset();
        let header = self.source.read_header()?;
        let delims = Delimiters::detect(&header)?;

        let mut assembler = Assembler::new(self.options.mode);
        let isa = RawSegment {
            // Everything before the declared terminator is the ISA segment.
            text: String::from_utf8_lossy(&header[..ISA_HEADER_LEN - 1]).into_owned(),
            index: 0,
            offset: header_offset,
            truncated: false,
        };
        assembler.feed(split_segment(&isa, delims)?)?;

        loop {
            self.check_cancel()?;
            let Some(raw) = self.source.next_segment(delims, self.options.mode)? else {
                assembler.finish()?;
                return Err(Error::new(ErrorKind::Internal)
                    .with_message("segment source ended with an empty envelope stack"));
            };
            if raw.truncated {
                assembler.note_warning(
                    Warning::new(
                        "unterminated_segment",
                        "stream ended before the segment terminator; kept as-is",
                    )
                    .with_segment_index(raw.index),
                );
            }
            let segment = match split_segment(&raw, delims) {
                Ok(segment) => segment,
                Err(err)
                    if err.kind() == ErrorKind::EmptySegment
                        && self.options.mode == Mode::Lenient =>
                {
                    assembler.note_warning(
                        Warning::new("empty_segment", "segment without identifier dropped")
                            .with_segment_index(raw.index),
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };
            if let Feed::Sealed(interchange) = assembler.feed(segment)? {
                return Ok(Some(interchange));
            }
        }
    }

    fn check_cancel(&self) -> Result<(), Error> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::new(ErrorKind::Canceled)
                .with_message("decode canceled between segments")),
            _ => Ok(()),
        }
    }
}

/// Decode every interchange in an in-memory document.
pub fn decode_str(input: &str, options: DecodeOptions) -> Result<Vec<Interchange>, Error> {
    let mut reader = InterchangeReader::new(input.as_bytes(), options);
    let mut interchanges = Vec::new();
    while let Some(interchange) = reader.next_interchange()? {
        interchanges.push(interchange);
    }
    Ok(interchanges)
}
