//! Purpose: Shared core library crate used by the `editree` CLI and tests.
//! Exports: `core` (decode pipeline, trees, errors) and `api` (stable surface).
//! Role: Internal library backing the binary; not yet a stable public SDK.
//! Invariants: Treat the crate API as internal until a dedicated library release.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
