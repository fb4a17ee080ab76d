//! Purpose: Define the stable public Rust API boundary for editree.
//! Exports: Core types and operations needed by the CLI and embedders.
//! Role: Public, additive-only surface; hides internal pipeline modules.
//! Invariants: This module is the only public path to decode primitives.
//! Invariants: Internal stage modules are not re-exported wholesale.

pub use crate::core::claims::claims_json;
pub use crate::core::delim::{Delimiters, ISA_HEADER_LEN};
pub use crate::core::envelope::{FunctionalGroup, Interchange, TransactionSet};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::hloop::{LoopNode, LoopTree};
pub use crate::core::parse::{DecodeOptions, InterchangeReader, Mode, decode_str};
pub use crate::core::segment::{Element, Segment};
pub use crate::core::tree::interchange_json;
pub use crate::core::warning::Warning;
