//! End-to-end scenario tests and cross-cutting property tests, one file
//! per scenario: each test owns its fixture objects and drives them
//! directly against the public API rather than through any harness.

mod properties;
mod world_args;
