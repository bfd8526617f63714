//! Reading test definition files.
//!
//! ```text
//! test: <identifier>
//!   config=<string>
//!   description=<string>
//!   params(=|+=)<comma-separated-string>
//!   build.args(=|+=)<string>
//!   run.args(=|+=)<string>
//!   define [build|run] <identifier>(=|+=)<string-with-optional-$$>
//! endtest
//! ```
//!
//! `#` starts a comment unless written as `\#`.

pub mod instruction;
pub mod params;
pub mod prune;
pub mod record;

pub use instruction::{Action, Instruction, Keyword, Modifier, Parser, ScopeId};
pub use record::{get_test, get_test_near, quick_parse, TestRecord, TestSummary};
