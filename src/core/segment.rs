//! Purpose: Decompose raw segments into identifiers and positional elements.
//! Exports: `Element`, `Segment`, `split_segment`.
//! Role: Splitter stage between the tokenizer and the envelope assembler.
//! Invariants: Element order is positional meaning; never reordered or deduped.
//! Invariants: Repetition, component, and scalar nesting stay distinct.
use crate::core::delim::Delimiters;
use crate::core::error::{Error, ErrorKind};
use crate::core::tokenize::RawSegment;

/// One positional field. Repetition splitting applies before component
/// splitting, so a repeat instance may itself be composite but never the
/// other way around.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Element {
    Value(String),
    Composite(Vec<String>),
    Repeated(Vec<Element>),
}

impl Element {
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Element::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn components(&self) -> Option<&[String]> {
        match self {
            Element::Composite(parts) => Some(parts),
            _ => None,
        }
    }
}

/// A split segment, still positional: `elements[0]` is the first element
/// after the identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Segment {
    pub id: String,
    pub elements: Vec<Element>,
    pub index: u64,
    pub offset: u64,
}

impl Segment {
    /// Element by X12 position (1-based), scalar value only.
    pub fn value(&self, position: usize) -> Option<&str> {
        self.element(position).and_then(Element::as_value)
    }

    pub fn element(&self, position: usize) -> Option<&Element> {
        if position == 0 {
            return None;
        }
        self.elements.get(position - 1)
    }
}

pub fn split_segment(raw: &RawSegment, delims: Delimiters) -> Result<Segment, Error> {
    let mut parts = raw.text.split(char::from(delims.element));
    let id = parts.next().unwrap_or("").trim().to_string();
    if id.is_empty() {
        return Err(Error::new(ErrorKind::EmptySegment)
            .with_message("segment has no identifier")
            .with_segment_index(raw.index)
            .with_offset(raw.offset));
    }

    // ISA is fixed-layout and *declares* the separators, so its elements may
    // legitimately contain them as data. Leave those elements scalar.
    let expand = id != "ISA";
    let elements = parts
        .map(|part| split_element(part, delims, expand))
        .collect();

    Ok(Segment {
        id,
        elements,
        index: raw.index,
        offset: raw.offset,
    })
}

fn split_element(part: &str, delims: Delimiters, expand: bool) -> Element {
    if !expand {
        return Element::Value(part.to_string());
    }
    let repetition = char::from(delims.repetition);
    if part.contains(repetition) {
        let repeats = part
            .split(repetition)
            .map(|instance| split_scalar_or_composite(instance, delims))
            .collect();
        return Element::Repeated(repeats);
    }
    split_scalar_or_composite(part, delims)
}

fn split_scalar_or_composite(part: &str, delims: Delimiters) -> Element {
    let component = char::from(delims.component);
    if part.contains(component) {
        Element::Composite(part.split(component).map(str::to_string).collect())
    } else {
        Element::Value(part.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{Element, split_segment};
    use crate::core::delim::Delimiters;
    use crate::core::error::ErrorKind;
    use crate::core::tokenize::RawSegment;

    fn delims() -> Delimiters {
        Delimiters {
            segment: b'~',
            element: b'*',
            component: b':',
            repetition: b'^',
        }
    }

    fn raw(text: &str) -> RawSegment {
        RawSegment {
            text: text.to_string(),
            index: 3,
            offset: 120,
            truncated: false,
        }
    }

    #[test]
    fn splits_identifier_and_elements() {
        let segment = split_segment(&raw("NM1*IL*1*DOE*JOHN"), delims()).expect("split");
        assert_eq!(segment.id, "NM1");
        assert_eq!(segment.value(1), Some("IL"));
        assert_eq!(segment.value(4), Some("JOHN"));
        assert_eq!(segment.value(5), None);
    }

    #[test]
    fn empty_elements_keep_their_positions() {
        let segment = split_segment(&raw("NM1*IL**DOE"), delims()).expect("split");
        assert_eq!(segment.value(2), Some(""));
        assert_eq!(segment.value(3), Some("DOE"));
    }

    #[test]
    fn component_separator_yields_composite() {
        let segment = split_segment(&raw("CLM*123*100*24:B:1"), delims()).expect("split");
        assert_eq!(
            segment.element(3),
            Some(&Element::Composite(vec![
                "24".to_string(),
                "B".to_string(),
                "1".to_string()
            ]))
        );
    }

    #[test]
    fn repetition_splits_before_components() {
        let segment = split_segment(&raw("REF*A:B^C*plain"), delims()).expect("split");
        assert_eq!(
            segment.element(1),
            Some(&Element::Repeated(vec![
                Element::Composite(vec!["A".to_string(), "B".to_string()]),
                Element::Value("C".to_string()),
            ]))
        );
        assert_eq!(segment.value(2), Some("plain"));
    }

    #[test]
    fn isa_elements_are_never_expanded() {
        let segment = split_segment(&raw("ISA*00*^*:"), delims()).expect("split");
        assert_eq!(segment.value(2), Some("^"));
        assert_eq!(segment.value(3), Some(":"));
    }

    #[test]
    fn blank_identifier_is_an_empty_segment() {
        let err = split_segment(&raw("  *A*B"), delims()).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::EmptySegment);
        assert_eq!(err.segment_index(), Some(3));
        assert_eq!(err.offset(), Some(120));
    }
}
