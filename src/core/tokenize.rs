//! Purpose: Pull segments out of an EDI byte stream one at a time.
//! Exports: `RawSegment`, `SegmentSource`.
//! Role: Tokenizer stage; owns all reading so later stages never touch I/O.
//! Invariants: Single forward pass; at most one raw segment buffered at a time.
//! Invariants: A line break immediately after a terminator is never content.
use std::io::BufRead;

use bstr::ByteSlice;

use crate::core::delim::{Delimiters, ISA_HEADER_LEN};
use crate::core::error::{Error, ErrorKind};
use crate::core::parse::Mode;

/// One terminator-delimited record, prior to element splitting.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawSegment {
    pub text: String,
    /// Ordinal position within the interchange, ISA = 0.
    pub index: u64,
    /// Byte offset of the segment start within the stream.
    pub offset: u64,
    /// Lenient mode only: the stream ended before this segment's terminator.
    pub truncated: bool,
}

/// Forward-only segment reader over any `BufRead`.
pub struct SegmentSource<R: BufRead> {
    reader: R,
    offset: u64,
    next_index: u64,
}

impl<R: BufRead> SegmentSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            next_index: 0,
        }
    }

    /// Byte position of the next unread byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Skip inter-segment whitespace. Returns false at clean end of stream.
    pub fn skip_gap(&mut self) -> Result<bool, Error> {
        loop {
            let buf = self.fill()?;
            if buf.is_empty() {
                return Ok(false);
            }
            let skip = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            let any_content = skip < buf.len();
            self.consume(skip);
            if any_content {
                return Ok(true);
            }
        }
    }

    /// Read the fixed-layout interchange header, resetting the segment index
    /// for a fresh interchange. The terminator byte stays in the returned
    /// buffer; the ISA segment itself is everything before it.
    pub fn read_header(&mut self) -> Result<[u8; ISA_HEADER_LEN], Error> {
        let start = self.offset;
        let mut header = [0u8; ISA_HEADER_LEN];
        let mut filled = 0;
        while filled < ISA_HEADER_LEN {
            let buf = self.fill()?;
            if buf.is_empty() {
                return Err(Error::new(ErrorKind::MalformedHeader)
                    .with_message("stream ended inside the interchange header")
                    .with_offset(start)
                    .with_actual(filled.to_string())
                    .with_expected(ISA_HEADER_LEN.to_string()));
            }
            let take = buf.len().min(ISA_HEADER_LEN - filled);
            header[filled..filled + take].copy_from_slice(&buf[..take]);
            filled += take;
            self.consume(take);
        }
        self.next_index = 1;
        self.skip_line_break()?;
        Ok(header)
    }

    /// Pull the next segment, or `None` at a clean end of input.
    pub fn next_segment(
        &mut self,
        delims: Delimiters,
        mode: Mode,
    ) -> Result<Option<RawSegment>, Error> {
        let start = self.offset;
        let mut buf = Vec::new();
        let read = self
            .reader
            .read_until(delims.segment, &mut buf)
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read input stream")
                    .with_offset(start)
                    .with_source(err)
            })?;
        self.offset += read as u64;

        let terminated = buf.last() == Some(&delims.segment);
        if terminated {
            buf.pop();
            self.skip_line_break()?;
        } else if buf.trim().is_empty() {
            return Ok(None);
        } else if mode == Mode::Strict {
            return Err(Error::new(ErrorKind::UnterminatedSegment)
                .with_message("stream ended before the segment terminator")
                .with_segment_index(self.next_index)
                .with_offset(start)
                .with_hint("Use lenient mode to keep the trailing partial segment."));
        }

        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(RawSegment {
            text: String::from_utf8_lossy(&buf).into_owned(),
            index,
            offset: start,
            truncated: !terminated,
        }))
    }

    fn skip_line_break(&mut self) -> Result<(), Error> {
        let buf = self.fill()?;
        let skip = match buf {
            [b'\r', b'\n', ..] => 2,
            [b'\n', ..] | [b'\r', ..] => 1,
            _ => 0,
        };
        self.consume(skip);
        Ok(())
    }

    fn fill(&mut self) -> Result<&[u8], Error> {
        self.reader.fill_buf().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read input stream")
                .with_source(err)
        })
    }

    fn consume(&mut self, amount: usize) {
        self.reader.consume(amount);
        self.offset += amount as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::SegmentSource;
    use crate::core::delim::Delimiters;
    use crate::core::error::ErrorKind;
    use crate::core::parse::Mode;

    fn delims() -> Delimiters {
        Delimiters {
            segment: b'~',
            element: b'*',
            component: b'>',
            repetition: b'^',
        }
    }

    fn collect(input: &str, mode: Mode) -> Vec<String> {
        let mut source = SegmentSource::new(input.as_bytes());
        let mut out = Vec::new();
        while let Some(raw) = source.next_segment(delims(), mode).expect("segment") {
            out.push(raw.text);
        }
        out
    }

    #[test]
    fn splits_on_terminator() {
        let out = collect("GS*HC*1~ST*837*0001~", Mode::Strict);
        assert_eq!(out, vec!["GS*HC*1", "ST*837*0001"]);
    }

    #[test]
    fn tolerates_line_breaks_after_terminators() {
        let out = collect("GS*HC*1~\r\nST*837*0001~\n", Mode::Strict);
        assert_eq!(out, vec!["GS*HC*1", "ST*837*0001"]);
    }

    #[test]
    fn trailing_whitespace_is_not_a_segment() {
        let out = collect("GS*HC*1~\n  \n", Mode::Strict);
        assert_eq!(out, vec!["GS*HC*1"]);
    }

    #[test]
    fn strict_rejects_unterminated_tail() {
        let mut source = SegmentSource::new("GS*HC*1~SE*2".as_bytes());
        source.next_segment(delims(), Mode::Strict).expect("first");
        let err = source
            .next_segment(delims(), Mode::Strict)
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::UnterminatedSegment);
    }

    #[test]
    fn lenient_flags_unterminated_tail() {
        let mut source = SegmentSource::new("GS*HC*1~SE*2".as_bytes());
        source.next_segment(delims(), Mode::Lenient).expect("first");
        let raw = source
            .next_segment(delims(), Mode::Lenient)
            .expect("segment")
            .expect("some");
        assert_eq!(raw.text, "SE*2");
        assert!(raw.truncated);
    }

    #[test]
    fn tracks_offsets_and_indexes() {
        let mut source = SegmentSource::new("AAA*1~BBB*2~".as_bytes());
        let first = source
            .next_segment(delims(), Mode::Strict)
            .expect("segment")
            .expect("some");
        let second = source
            .next_segment(delims(), Mode::Strict)
            .expect("segment")
            .expect("some");
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 6);
        assert_eq!(second.index, first.index + 1);
    }

    #[test]
    fn read_header_consumes_exactly_the_header() {
        let mut input = crate::core::delim::test_header(b'|');
        input.extend_from_slice(b"GS*HC~");
        let mut source = SegmentSource::new(input.as_slice());
        assert!(source.skip_gap().expect("gap"));
        let header = source.read_header().expect("header");
        let delims = Delimiters::detect(&header).expect("detect");
        let next = source
            .next_segment(delims, Mode::Strict)
            .expect("segment")
            .expect("some");
        assert_eq!(next.text, "GS*HC");
        assert_eq!(next.index, 1);
    }
}
