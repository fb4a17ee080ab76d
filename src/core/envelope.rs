//! Purpose: Assemble the nested interchange/group/transaction-set envelope.
//! Exports: `Interchange`, `FunctionalGroup`, `TransactionSet`, `Assembler`, `Feed`.
//! Role: State machine consuming split segments one at a time, no lookahead.
//! Invariants: Open nodes form a strict stack; children seal before parents.
//! Invariants: Every decision uses only the current segment and the stack top.
use crate::core::error::{Error, ErrorKind};
use crate::core::hloop::{self, LoopTree};
use crate::core::parse::Mode;
use crate::core::segment::Segment;
use crate::core::warning::Warning;

/// Sealed outermost envelope, one per transmission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Interchange {
    pub control_number: String,
    pub sender: String,
    pub receiver: String,
    pub groups: Vec<FunctionalGroup>,
    pub warnings: Vec<Warning>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FunctionalGroup {
    pub functional_code: String,
    pub control_number: String,
    pub transaction_sets: Vec<TransactionSet>,
    pub warnings: Vec<Warning>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionSet {
    pub id: String,
    pub control_number: String,
    pub loops: LoopTree,
    pub warnings: Vec<Warning>,
}

/// Outcome of feeding one segment to the assembler.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Feed {
    Open,
    Sealed(Interchange),
}

enum OpenNode {
    Interchange {
        control_number: String,
        sender: String,
        receiver: String,
        groups: Vec<FunctionalGroup>,
        warnings: Vec<Warning>,
    },
    Group {
        functional_code: String,
        control_number: String,
        transaction_sets: Vec<TransactionSet>,
        warnings: Vec<Warning>,
    },
    TransactionSet {
        id: String,
        control_number: String,
        body: Vec<Segment>,
        warnings: Vec<Warning>,
    },
}

impl OpenNode {
    fn describe(&self) -> String {
        match self {
            OpenNode::Interchange { control_number, .. } => {
                format!("interchange {control_number}")
            }
            OpenNode::Group { control_number, .. } => {
                format!("functional group {control_number}")
            }
            OpenNode::TransactionSet { control_number, .. } => {
                format!("transaction set {control_number}")
            }
        }
    }
}

pub struct Assembler {
    mode: Mode,
    stack: Vec<OpenNode>,
}

impl Assembler {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            stack: Vec::new(),
        }
    }

    /// Attach a stage-external warning (tokenizer/splitter, lenient mode) to
    /// the innermost open node.
    pub fn note_warning(&mut self, warning: Warning) {
        match self.stack.last_mut() {
            Some(OpenNode::Interchange { warnings, .. })
            | Some(OpenNode::Group { warnings, .. })
            | Some(OpenNode::TransactionSet { warnings, .. }) => warnings.push(warning),
            None => {}
        }
    }

    pub fn feed(&mut self, segment: Segment) -> Result<Feed, Error> {
        match segment.id.as_str() {
            "ISA" => self.open_interchange(&segment),
            "GS" => self.open_group(&segment),
            "ST" => self.open_transaction_set(&segment),
            "SE" => self.seal_transaction_set(&segment),
            "GE" => self.seal_group(&segment),
            "IEA" => return self.seal_interchange(&segment),
            _ => self.body_segment(segment),
        }
        .map(|()| Feed::Open)
    }

    /// End of input. A non-empty stack means the document was cut short.
    pub fn finish(&self) -> Result<(), Error> {
        match self.stack.last() {
            None => Ok(()),
            Some(open) => Err(Error::new(ErrorKind::UnclosedEnvelope)
                .with_message(format!("{} was never closed", open.describe()))),
        }
    }

    fn open_interchange(&mut self, segment: &Segment) -> Result<(), Error> {
        if !self.stack.is_empty() {
            return Err(out_of_order(segment, "ISA while an envelope is already open"));
        }
        self.stack.push(OpenNode::Interchange {
            control_number: trimmed(segment, 13),
            sender: trimmed(segment, 6),
            receiver: trimmed(segment, 8),
            groups: Vec::new(),
            warnings: Vec::new(),
        });
        Ok(())
    }

    fn open_group(&mut self, segment: &Segment) -> Result<(), Error> {
        match self.stack.last() {
            Some(OpenNode::Interchange { .. }) => {}
            _ => return Err(out_of_order(segment, "GS outside an open interchange")),
        }
        self.stack.push(OpenNode::Group {
            functional_code: trimmed(segment, 1),
            control_number: trimmed(segment, 6),
            transaction_sets: Vec::new(),
            warnings: Vec::new(),
        });
        Ok(())
    }

    fn open_transaction_set(&mut self, segment: &Segment) -> Result<(), Error> {
        match self.stack.last() {
            Some(OpenNode::Group { .. }) => {}
            _ => return Err(out_of_order(segment, "ST outside an open functional group")),
        }
        self.stack.push(OpenNode::TransactionSet {
            id: trimmed(segment, 1),
            control_number: trimmed(segment, 2),
            body: Vec::new(),
            warnings: Vec::new(),
        });
        Ok(())
    }

    fn body_segment(&mut self, segment: Segment) -> Result<(), Error> {
        match self.stack.last_mut() {
            Some(OpenNode::TransactionSet { body, .. }) => {
                body.push(segment);
                Ok(())
            }
            _ => Err(out_of_order(
                &segment,
                "segment outside any open transaction set",
            )),
        }
    }

    fn seal_transaction_set(&mut self, closing: &Segment) -> Result<(), Error> {
        let Some(OpenNode::TransactionSet { .. }) = self.stack.last() else {
            return Err(out_of_order(closing, "SE without an open transaction set"));
        };
        let Some(OpenNode::TransactionSet {
            id,
            control_number,
            body,
            mut warnings,
        }) = self.stack.pop()
        else {
            unreachable!("stack top checked above");
        };

        self.check_control_number(&control_number, &trimmed(closing, 2), closing, &mut warnings)?;
        // SE01 counts every segment in the set, ST and SE included.
        let actual_count = body.len() as u64 + 2;
        self.check_count("transaction set segment", actual_count, 1, closing, &mut warnings)?;

        let mut loops = hloop::reconstruct(body, self.mode)?;
        warnings.append(&mut loops.warnings);

        let sealed = TransactionSet {
            id,
            control_number,
            loops,
            warnings,
        };
        let Some(OpenNode::Group {
            transaction_sets, ..
        }) = self.stack.last_mut()
        else {
            unreachable!("ST only opens under a group");
        };
        transaction_sets.push(sealed);
        Ok(())
    }

    fn seal_group(&mut self, closing: &Segment) -> Result<(), Error> {
        let Some(OpenNode::Group { .. }) = self.stack.last() else {
            return Err(out_of_order(closing, "GE without an open functional group"));
        };
        let Some(OpenNode::Group {
            functional_code,
            control_number,
            transaction_sets,
            mut warnings,
        }) = self.stack.pop()
        else {
            unreachable!("stack top checked above");
        };

        self.check_control_number(&control_number, &trimmed(closing, 2), closing, &mut warnings)?;
        let actual_count = transaction_sets.len() as u64;
        self.check_count("transaction set", actual_count, 1, closing, &mut warnings)?;

        let sealed = FunctionalGroup {
            functional_code,
            control_number,
            transaction_sets,
            warnings,
        };
        let Some(OpenNode::Interchange { groups, .. }) = self.stack.last_mut() else {
            unreachable!("GS only opens under an interchange");
        };
        groups.push(sealed);
        Ok(())
    }

    fn seal_interchange(&mut self, closing: &Segment) -> Result<Feed, Error> {
        let Some(OpenNode::Interchange { .. }) = self.stack.last() else {
            return Err(out_of_order(closing, "IEA without an open interchange"));
        };
        let Some(OpenNode::Interchange {
            control_number,
            sender,
            receiver,
            groups,
            mut warnings,
        }) = self.stack.pop()
        else {
            unreachable!("stack top checked above");
        };

        self.check_control_number(&control_number, &trimmed(closing, 2), closing, &mut warnings)?;
        let actual_count = groups.len() as u64;
        self.check_count("functional group", actual_count, 1, closing, &mut warnings)?;

        Ok(Feed::Sealed(Interchange {
            control_number,
            sender,
            receiver,
            groups,
            warnings,
        }))
    }

    fn check_control_number(
        &self,
        opening: &str,
        closing: &str,
        segment: &Segment,
        warnings: &mut Vec<Warning>,
    ) -> Result<(), Error> {
        if control_numbers_match(opening, closing) {
            return Ok(());
        }
        if self.mode == Mode::Strict {
            return Err(Error::new(ErrorKind::ControlNumberMismatch)
                .with_message("closing control number does not match the opening segment")
                .with_segment_index(segment.index)
                .with_offset(segment.offset)
                .with_expected(opening)
                .with_actual(closing));
        }
        warnings.push(
            Warning::new(
                "control_number_mismatch",
                "closing control number does not match the opening segment",
            )
            .with_segment_index(segment.index)
            .with_expected(opening)
            .with_actual(closing),
        );
        Ok(())
    }

    fn check_count(
        &self,
        what: &str,
        actual: u64,
        position: usize,
        closing: &Segment,
        warnings: &mut Vec<Warning>,
    ) -> Result<(), Error> {
        let declared_text = trimmed(closing, position);
        if declared_text.parse::<u64>() == Ok(actual) {
            return Ok(());
        }
        if self.mode == Mode::Strict {
            return Err(Error::new(ErrorKind::CountMismatch)
                .with_message(format!("declared {what} count does not match"))
                .with_segment_index(closing.index)
                .with_offset(closing.offset)
                .with_expected(declared_text)
                .with_actual(actual.to_string()));
        }
        warnings.push(
            Warning::new(
                "count_mismatch",
                format!("declared {what} count does not match"),
            )
            .with_segment_index(closing.index)
            .with_expected(declared_text)
            .with_actual(actual.to_string()),
        );
        Ok(())
    }
}

fn trimmed(segment: &Segment, position: usize) -> String {
    segment.value(position).unwrap_or("").trim().to_string()
}

// Control numbers compare numerically when both sides are numeric, so
// zero-padding differences (ISA13 is fixed-width) do not count as mismatches.
fn control_numbers_match(opening: &str, closing: &str) -> bool {
    if opening == closing {
        return true;
    }
    match (opening.parse::<u64>(), closing.parse::<u64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn out_of_order(segment: &Segment, message: &str) -> Error {
    Error::new(ErrorKind::OutOfOrderSegment)
        .with_message(message)
        .with_segment_index(segment.index)
        .with_offset(segment.offset)
}

#[cfg(test)]
mod tests {
    use super::{Assembler, Feed, Interchange};
    use crate::core::delim::Delimiters;
    use crate::core::error::ErrorKind;
    use crate::core::parse::Mode;
    use crate::core::segment::split_segment;
    use crate::core::tokenize::RawSegment;

    fn feed_all(texts: &[&str], mode: Mode) -> Result<Interchange, crate::core::error::Error> {
        let delims = Delimiters {
            segment: b'~',
            element: b'*',
            component: b':',
            repetition: b'^',
        };
        let mut assembler = Assembler::new(mode);
        for (idx, text) in texts.iter().enumerate() {
            let raw = RawSegment {
                text: text.to_string(),
                index: idx as u64,
                offset: idx as u64 * 16,
                truncated: false,
            };
            let segment = split_segment(&raw, delims)?;
            if let Feed::Sealed(interchange) = assembler.feed(segment)? {
                return Ok(interchange);
            }
        }
        assembler.finish()?;
        unreachable!("well-formed test input always seals");
    }

    fn isa(control: &str) -> String {
        format!(
            "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       \
             *240101*1200*^*00501*{control}*0*P*:"
        )
    }

    #[test]
    fn seals_a_minimal_interchange() {
        let interchange = feed_all(
            &[
                &isa("000000001"),
                "GS*HC*APP*APP*20240101*1200*1*X*005010",
                "ST*837*0001",
                "SE*2*0001",
                "GE*1*1",
                "IEA*1*000000001",
            ],
            Mode::Strict,
        )
        .expect("seal");

        assert_eq!(interchange.control_number, "000000001");
        assert_eq!(interchange.sender, "SENDER");
        assert_eq!(interchange.receiver, "RECEIVER");
        assert_eq!(interchange.groups.len(), 1);
        let group = &interchange.groups[0];
        assert_eq!(group.functional_code, "HC");
        assert_eq!(group.control_number, "1");
        assert_eq!(group.transaction_sets.len(), 1);
        let txn = &group.transaction_sets[0];
        assert_eq!(txn.id, "837");
        assert_eq!(txn.control_number, "0001");
    }

    #[test]
    fn body_segments_count_toward_se01() {
        let interchange = feed_all(
            &[
                &isa("000000001"),
                "GS*HC*APP*APP*20240101*1200*1*X*005010",
                "ST*837*0001",
                "BHT*0019*00*123",
                "NM1*41*2*SUBMITTER",
                "SE*4*0001",
                "GE*1*1",
                "IEA*1*000000001",
            ],
            Mode::Strict,
        )
        .expect("seal");
        let txn = &interchange.groups[0].transaction_sets[0];
        assert_eq!(txn.loops.leading.len(), 2);
    }

    #[test]
    fn st_outside_group_is_out_of_order() {
        let err = feed_all(&[&isa("000000001"), "ST*837*0001"], Mode::Strict)
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::OutOfOrderSegment);
    }

    #[test]
    fn body_segment_outside_transaction_set_is_out_of_order() {
        let err = feed_all(
            &[
                &isa("000000001"),
                "GS*HC*APP*APP*20240101*1200*1*X*005010",
                "NM1*IL*1*DOE",
            ],
            Mode::Strict,
        )
        .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::OutOfOrderSegment);
        assert_eq!(err.segment_index(), Some(2));
    }

    #[test]
    fn control_number_mismatch_is_fatal_in_strict_mode() {
        let err = feed_all(
            &[
                &isa("000000001"),
                "GS*HC*APP*APP*20240101*1200*1*X*005010",
                "ST*837*0001",
                "SE*2*9999",
                "GE*1*1",
                "IEA*1*000000001",
            ],
            Mode::Strict,
        )
        .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::ControlNumberMismatch);
        assert_eq!(err.expected(), Some("0001"));
        assert_eq!(err.actual(), Some("9999"));
    }

    #[test]
    fn control_number_mismatch_degrades_in_lenient_mode() {
        let interchange = feed_all(
            &[
                &isa("000000001"),
                "GS*HC*APP*APP*20240101*1200*1*X*005010",
                "ST*837*0001",
                "SE*2*9999",
                "GE*1*1",
                "IEA*1*000000001",
            ],
            Mode::Lenient,
        )
        .expect("seal");
        let txn = &interchange.groups[0].transaction_sets[0];
        assert_eq!(txn.warnings.len(), 1);
        assert_eq!(txn.warnings[0].code, "control_number_mismatch");
    }

    #[test]
    fn group_count_mismatch_is_fatal_in_strict_mode() {
        let err = feed_all(
            &[
                &isa("000000001"),
                "GS*HC*APP*APP*20240101*1200*1*X*005010",
                "ST*837*0001",
                "SE*2*0001",
                "GE*3*1",
                "IEA*1*000000001",
            ],
            Mode::Strict,
        )
        .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::CountMismatch);
        assert_eq!(err.expected(), Some("3"));
        assert_eq!(err.actual(), Some("1"));
    }

    #[test]
    fn zero_padded_control_numbers_match_numerically() {
        let interchange = feed_all(
            &[
                &isa("000000001"),
                "GS*HC*APP*APP*20240101*1200*1*X*005010",
                "ST*837*0001",
                "SE*2*0001",
                "GE*1*1",
                "IEA*1*1",
            ],
            Mode::Strict,
        )
        .expect("seal");
        assert!(interchange.warnings.is_empty());
    }

    #[test]
    fn truncation_names_the_innermost_open_node() {
        let err = feed_all(
            &[
                &isa("000000001"),
                "GS*HC*APP*APP*20240101*1200*1*X*005010",
                "ST*837*0001",
            ],
            Mode::Strict,
        )
        .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::UnclosedEnvelope);
        assert!(err.message().unwrap_or("").contains("transaction set 0001"));
    }
}
