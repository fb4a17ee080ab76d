// Core modules implementing the decode pipeline and error modeling.
pub mod claims;
pub mod delim;
pub mod envelope;
pub mod error;
pub mod hloop;
pub mod parse;
pub mod segment;
pub mod tokenize;
pub mod tree;
pub mod warning;
