#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Shared arbitration and light-sequencing logic for the intersection controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library and exposing abstractions the other crates can adopt.

pub mod allocation;
pub mod approach;
pub mod arbitration;
pub mod controller;
pub mod debounce;
pub mod queue;
pub mod repl;
pub mod telemetry;
pub mod timing;
