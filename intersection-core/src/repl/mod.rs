//! Console tooling shared between firmware and emulator targets.
//!
//! The grammar lives in [`grammar`] and is implemented with a token/parse
//! pipeline that stays compatible with `no_std`. [`status`] renders the
//! controller state for the `status` command.

pub mod catalog;
pub mod grammar;
pub mod status;
