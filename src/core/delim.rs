// ISA header layout: delimiter declarations live at fixed byte offsets.
use crate::core::error::{Error, ErrorKind};

/// Length of the fixed-layout ISA segment including its terminator.
pub const ISA_HEADER_LEN: usize = 106;

const ELEMENT_OFFSET: usize = 3;
const REPETITION_OFFSET: usize = 82;
const COMPONENT_OFFSET: usize = 104;
const TERMINATOR_OFFSET: usize = 105;

/// Repetition separator assumed for 4010-era headers where ISA11 still
/// carries the standard identifier (`U`) instead of a separator.
const LEGACY_REPETITION: u8 = b'^';

/// The four control characters governing one interchange. Immutable once
/// detected; threaded explicitly through every stage so documents with
/// different delimiters never interfere.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Delimiters {
    pub segment: u8,
    pub element: u8,
    pub component: u8,
    pub repetition: u8,
}

impl Delimiters {
    /// Infer the delimiter set from the first 106 bytes of the stream.
    pub fn detect(header: &[u8]) -> Result<Self, Error> {
        if header.len() < ISA_HEADER_LEN {
            return Err(Error::new(ErrorKind::MalformedHeader)
                .with_message("interchange header shorter than 106 characters")
                .with_actual(header.len().to_string())
                .with_expected(ISA_HEADER_LEN.to_string()));
        }
        if &header[0..3] != b"ISA" {
            return Err(Error::new(ErrorKind::MalformedHeader)
                .with_message("interchange header does not begin with ISA"));
        }

        let element = required(header, ELEMENT_OFFSET, "element separator")?;
        let component = required(header, COMPONENT_OFFSET, "component separator")?;
        let segment = required(header, TERMINATOR_OFFSET, "segment terminator")?;

        let declared = header[REPETITION_OFFSET];
        let repetition = if declared.is_ascii_alphanumeric() {
            LEGACY_REPETITION
        } else {
            required(header, REPETITION_OFFSET, "repetition separator")?
        };

        let delims = Self {
            segment,
            element,
            component,
            repetition,
        };
        delims.ensure_distinct()?;
        Ok(delims)
    }

    fn ensure_distinct(&self) -> Result<(), Error> {
        let all = [self.segment, self.element, self.component, self.repetition];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                if a == b {
                    return Err(Error::new(ErrorKind::MalformedHeader)
                        .with_message(format!(
                            "delimiters are not pairwise distinct: {:?} declared twice",
                            char::from(*a)
                        )));
                }
            }
        }
        Ok(())
    }
}

fn required(header: &[u8], offset: usize, role: &str) -> Result<u8, Error> {
    let byte = header[offset];
    // Printable, non-whitespace ASCII; anything else means the header layout
    // is off or the file is not X12.
    if !byte.is_ascii_graphic() {
        return Err(Error::new(ErrorKind::MalformedHeader)
            .with_message(format!("{role} at offset {offset} is not a printable character"))
            .with_offset(offset as u64));
    }
    Ok(byte)
}

/// Well-formed 106-byte ISA header for tests across the crate.
#[cfg(test)]
pub(crate) fn test_header(repetition: u8) -> Vec<u8> {
    let mut header = format!(
        "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       \
         *240101*1200*{}*00501*000000001*0*P*>~",
        char::from(repetition)
    )
    .into_bytes();
    assert_eq!(header.len(), ISA_HEADER_LEN);
    header[82] = repetition;
    header
}
