//! Verify finds, builds, and runs tests declared in plain-text test
//! definition files.
//!
//! ## Test Definitions
//! Tests live in files ending in `.test` anywhere under a test root. Each
//! file declares any number of test blocks:
//! ```text
//! # Adds one, with and without the fast path.
//! test: add_one
//!   config=x86
//!   description=adds one to the input
//!   params=opt=2
//!   build.args=-O2
//!   run.args=--input data/one.txt
//!   define opt=-O$$
//!   define run fast += --fast
//! endtest
//! ```
//! A test is identified by its `config` and its name. Several blocks may share
//! a name as long as their configs differ.
//!
//! `+=` appends to a value, `=` replaces it. A `define` declares an argument
//! template that is added to the build and run arguments (or only one of them
//! with `define build` / `define run`) when a parameter of the same name is
//! passed. The first `$$` in the template is replaced with the parameter's
//! value: `opt=3` turns `-O$$` into `-O3`. Write `\$$` for a literal `$$` and
//! `\#` for a literal `#`.
//!
//! ## Configuration
//! A project directory contains a `verify.toml`:
//! ```toml
//! # Directory holding the test definitions.
//! test_root = "tests"
//! # Commands for each test. {} is replaced with the test's arguments.
//! build = "make CONFIG={config} ARGS='{}'"
//! run = "./bin/{name} {}"
//! # (Optional) Timeout for each step in seconds. Defaults to 1200 seconds.
//! timeout = 120
//! ```
//!
//! ## Running Tests
//! ```bash
//! verify x86::add_one,opt=3 arm::add_one
//! ```
//! Without test names every test is run. `-i` and `-e` narrow the selection
//! with regexes matched against `config::name`, `-l` lists tests, and `-n`
//! prints the commands instead of running them.
//!
//! ## The Test Index
//! Looking a test up by name would mean parsing every test file. Instead,
//! verify keeps an index under `.verify/` that maps `(config, name)` to the
//! file and line defining the test. The index is checked against the file on
//! every lookup and repaired automatically when tests are added, moved, or
//! deleted. `--reindex` repairs it explicitly.
pub mod cli;
pub mod config;
pub mod errors;
pub mod executor;
pub mod index;
pub mod logging;
pub mod parser;
pub mod select;
