//! Expose hon-xml's command line handling for use in integration tests.
pub mod cli;
