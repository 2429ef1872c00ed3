//! CLI command definitions and argument parsing.
//!
//! Uses clap derive macros for ergonomic argument definitions.

pub mod args;

/// Tagline for clap help output: bold name, dimmed rest.
pub const ABOUT_STYLED: &str =
    "\x1b[1mrepoprobe\x1b[0m \x1b[2m· LLM-generated tests, mocks and bug reports for GitHub repositories\x1b[0m";
