//! CLI subcommand implementations for the privacy-scan binary.

pub mod rules_cmd;
pub mod scan_cmd;
pub mod serve_cmd;
