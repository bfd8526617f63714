//! Assembles instructions into test summaries (quick mode) and complete test
//! records (targeted mode).
use std::{collections::BTreeMap, io::BufRead, path::Path};
use tracing::{debug, warn};

use super::{
    instruction::{Action, Instruction, Keyword, Modifier, Parser},
    params::{join_params, split_params, substitute},
};
use crate::errors::{Location, Result, VerifyError};

/// Lightweight description of one test block, used for indexing and listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSummary {
    pub name: String,
    pub config: String,
    pub description: String,
    /// Location of the `test:` line.
    pub loc: Location,
}

impl TestSummary {
    pub fn key(&self) -> (String, String) {
        (self.config.clone(), self.name.clone())
    }
}

/// Complete definition of one test, ready to be built and run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub name: String,
    pub description: String,
    pub config: String,
    pub build_args: String,
    pub run_args: String,
    /// File-declared parameters followed by the caller's, comma separated.
    pub params: String,
    /// Templates appended to both build and run arguments.
    pub define: BTreeMap<String, String>,
    /// Templates appended to the build arguments only.
    pub build_define: BTreeMap<String, String>,
    /// Templates appended to the run arguments only.
    pub run_define: BTreeMap<String, String>,
    /// `config::name[,params](line)`
    pub log_label: String,
    /// Location of the `test:` line.
    pub loc: Location,
}

const NAME: u8 = 0b001;
const CONFIG: u8 = 0b010;
const DESCRIPTION: u8 = 0b100;
const REQUIRED: u8 = NAME | CONFIG | DESCRIPTION;

fn missing_fields(seen: u8) -> String {
    [(NAME, "name"), (CONFIG, "config"), (DESCRIPTION, "description")]
        .iter()
        .filter(|(bit, _)| seen & bit == 0)
        .map(|(_, field)| *field)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Append `value` to `field`, separated by a space.
fn append_spaced(field: &mut String, value: &str) {
    if value.is_empty() {
        return;
    }
    if !field.is_empty() {
        field.push(' ');
    }
    field.push_str(value);
}

fn apply_text(field: &mut String, action: Action, value: &str, spaced: bool) {
    match (action, spaced) {
        (Action::Append, true) => append_spaced(field, value),
        (Action::Append, false) => field.push_str(value),
        (Action::Assign, _) | (Action::None, _) => *field = value.to_string(),
    }
}

/// A test block being assembled.
struct Block {
    record: TestRecord,
    seen: u8,
}

impl Block {
    fn new(test: &Instruction) -> Self {
        Block {
            record: TestRecord {
                name: test.primary.clone(),
                description: String::new(),
                config: String::new(),
                build_args: String::new(),
                run_args: String::new(),
                params: String::new(),
                define: BTreeMap::new(),
                build_define: BTreeMap::new(),
                run_define: BTreeMap::new(),
                log_label: String::new(),
                loc: test.loc.clone(),
            },
            seen: NAME,
        }
    }

    fn apply(&mut self, inst: Instruction) {
        let rec = &mut self.record;
        match inst.keyword {
            Keyword::Config => {
                rec.config = inst.primary;
                self.seen |= CONFIG;
            }
            Keyword::Description => {
                rec.description = inst.primary;
                self.seen |= DESCRIPTION;
            }
            Keyword::Params => {
                apply_text(&mut rec.params, inst.action, &inst.primary, false)
            }
            Keyword::BuildArgs => {
                apply_text(&mut rec.build_args, inst.action, &inst.primary, true)
            }
            Keyword::RunArgs => {
                apply_text(&mut rec.run_args, inst.action, &inst.primary, true)
            }
            Keyword::Define => {
                let map = match inst.modifier {
                    Modifier::None => &mut rec.define,
                    Modifier::Build => &mut rec.build_define,
                    Modifier::Run => &mut rec.run_define,
                };
                let template = map.entry(inst.primary).or_default();
                apply_text(template, inst.action, &inst.secondary, false);
            }
            Keyword::Test | Keyword::EndTest => {}
        }
    }

    fn check(&self) -> Result<()> {
        if self.seen == REQUIRED {
            return Ok(());
        }
        Err(VerifyError::MissingField {
            loc: self.record.loc.clone(),
            name: self.record.name.clone(),
            missing: missing_fields(self.seen),
        })
    }

    fn summary(self) -> TestSummary {
        let TestRecord {
            name,
            config,
            description,
            loc,
            ..
        } = self.record;
        TestSummary {
            name,
            config,
            description,
            loc,
        }
    }

    /// Validate the block, merge in the caller's parameters, and expand the
    /// matching defines.
    fn finalize(self, cli_params: &str) -> Result<TestRecord> {
        self.check()?;
        let mut rec = self.record;
        rec.params = join_params(&rec.params, cli_params);

        for (pname, pvalue) in split_params(&rec.params) {
            if let Some(template) = rec.define.get(pname) {
                let arg = substitute(template, pvalue);
                append_spaced(&mut rec.build_args, &arg);
                append_spaced(&mut rec.run_args, &arg);
            }
            if let Some(template) = rec.build_define.get(pname) {
                append_spaced(&mut rec.build_args, &substitute(template, pvalue));
            }
            if let Some(template) = rec.run_define.get(pname) {
                append_spaced(&mut rec.run_args, &substitute(template, pvalue));
            }
        }

        let params = if rec.params.is_empty() {
            String::new()
        } else {
            format!(",{}", rec.params)
        };
        rec.log_label =
            format!("{}::{}{}({})", rec.config, rec.name, params, rec.loc.line);
        Ok(rec)
    }
}

/// Summarize every well-formed test block in the file at `path`.
///
/// Malformed blocks are logged and skipped. Only failure to read the file is
/// an error.
pub fn quick_parse(path: &Path) -> Result<Vec<TestSummary>> {
    quick_scan(&mut Parser::open(path)?)
}

pub(crate) fn quick_scan<R: BufRead>(
    parser: &mut Parser<R>,
) -> Result<Vec<TestSummary>> {
    let mut summaries = Vec::new();
    let mut block: Option<Block> = None;

    loop {
        let inst = match parser.next_instruction() {
            Ok(Some(inst)) => inst,
            Ok(None) => break,
            Err(err) if err.is_parse_error() => {
                warn!("{}; skipping test block", err);
                block = None;
                parser.resync()?;
                continue;
            }
            Err(err) => return Err(err),
        };

        match inst.keyword {
            Keyword::Test => block = Some(Block::new(&inst)),
            Keyword::EndTest => {
                if let Some(b) = block.take() {
                    match b.check() {
                        Ok(()) => summaries.push(b.summary()),
                        Err(err) => warn!("{}; skipping test block", err),
                    }
                }
            }
            _ => {
                if let Some(b) = block.as_mut() {
                    b.apply(inst);
                }
            }
        }
    }

    Ok(summaries)
}

/// Find the block defining test `name` for `config` in the file at `path`
/// and assemble it, merging in `cli_params`.
///
/// Returns `None` when the file holds no such test. Any malformed line on the
/// way is an error.
pub fn get_test(
    path: &Path,
    config: &str,
    name: &str,
    cli_params: &str,
) -> Result<Option<TestRecord>> {
    find_test(&mut Parser::open(path)?, config, name, cli_params)
}

/// Like [get_test], but first try the block starting at byte `offset`.
/// Falls back to the whole file if the test does not start there.
pub fn get_test_near(
    path: &Path,
    offset: u64,
    config: &str,
    name: &str,
    cli_params: &str,
) -> Result<Option<TestRecord>> {
    let mut parser = Parser::open(path)?;
    parser.seek_to(offset)?;
    match find_test(&mut parser, config, name, cli_params) {
        Ok(Some(rec)) if rec.loc.offset == offset => return Ok(Some(rec)),
        Ok(_) => debug!("{}::{} not at byte {} of {}", config, name, offset, path.display()),
        Err(err) if err.is_parse_error() => debug!("stale hint: {}", err),
        Err(err) => return Err(err),
    }
    parser.rewind()?;
    find_test(&mut parser, config, name, cli_params)
}

pub(crate) fn find_test<R: BufRead>(
    parser: &mut Parser<R>,
    config: &str,
    name: &str,
    cli_params: &str,
) -> Result<Option<TestRecord>> {
    let mut block: Option<Block> = None;

    while let Some(inst) = parser.next_instruction()? {
        match inst.keyword {
            Keyword::Test => {
                block = if inst.primary == name {
                    Some(Block::new(&inst))
                } else {
                    None
                };
            }
            Keyword::EndTest => {
                if let Some(b) = block.take() {
                    return b.finalize(cli_params).map(Some);
                }
            }
            // Same name, other config: keep looking.
            Keyword::Config if block.is_some() && inst.primary != config => {
                block = None;
            }
            _ => {
                if let Some(b) = block.as_mut() {
                    b.apply(inst);
                }
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parser(src: &str) -> Parser<Cursor<Vec<u8>>> {
        Parser::new(Cursor::new(src.as_bytes().to_vec()), "t.test")
    }

    fn target(src: &str, config: &str, name: &str, params: &str) -> Result<Option<TestRecord>> {
        find_test(&mut parser(src), config, name, params)
    }

    #[test]
    fn params_append_without_separator() {
        let src = "test: t\nconfig=c\ndescription=d\nparams=a\nparams+=,b\nendtest\n";
        let rec = target(src, "c", "t", "").unwrap().unwrap();
        assert_eq!(rec.params, "a,b");
        assert_eq!(rec.log_label, "c::t,a,b(1)");
    }

    #[test]
    fn args_append_with_space() {
        let src = "\
test: t
config=c
description=d
build.args=-O2
build.args+=-g
run.args+=--quick
endtest
";
        let rec = target(src, "c", "t", "").unwrap().unwrap();
        assert_eq!(rec.build_args, "-O2 -g");
        assert_eq!(rec.run_args, "--quick");
        assert_eq!(rec.log_label, "c::t(1)");
    }

    #[test]
    fn assign_replaces() {
        let src = "test: t\nconfig=c\ndescription=d\nrun.args=a\nrun.args=b\nendtest\n";
        assert_eq!(target(src, "c", "t", "").unwrap().unwrap().run_args, "b");
    }

    #[test]
    fn missing_description_is_fatal_when_targeted() {
        let err = target("test: t\nconfig=c\nendtest", "c", "t", "").unwrap_err();
        match err {
            VerifyError::MissingField { name, missing, .. } => {
                assert_eq!(name, "t");
                assert_eq!(missing, "description");
            }
            other => panic!("expected missing field, got {:?}", other),
        }
    }

    #[test]
    fn missing_description_is_dropped_when_quick() {
        let src = "test: t\nconfig=c\nendtest\ntest: u\nconfig=c\ndescription=d\nendtest\n";
        let found = quick_scan(&mut parser(src)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "u");
        assert_eq!(found[0].loc.line, 4);
    }

    #[test]
    fn quick_mode_survives_broken_blocks() {
        let src = "\
test: a
config=c
description=d
garbage here
endtest
test: b
test: c
config=c
description=d
endtest
endtest
test: d
config=c
description=d
endtest
test: e
";
        let names: Vec<_> = quick_scan(&mut parser(src))
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["c", "d"]);
    }

    #[test]
    fn multi_config_same_name_skips_to_matching_block() {
        let src = "\
test: t
config=x
description=first
run.args=from-x
endtest
test: t
config=y
description=second
run.args=from-y
endtest
";
        let rec = target(src, "y", "t", "").unwrap().unwrap();
        assert_eq!(rec.description, "second");
        assert_eq!(rec.run_args, "from-y");
        assert_eq!(rec.loc.line, 6);

        let rec = target(src, "x", "t", "").unwrap().unwrap();
        assert_eq!(rec.description, "first");
    }

    #[test]
    fn config_after_other_fields_still_discards() {
        let src = "\
test: t
run.args=wrong
config=x
description=d
endtest
test: t
description=d
config=y
endtest
";
        let rec = target(src, "y", "t", "").unwrap().unwrap();
        assert_eq!(rec.run_args, "");
    }

    #[test]
    fn absent_test_is_not_an_error() {
        let src = "test: t\nconfig=x\ndescription=d\nendtest\n";
        assert!(target(src, "x", "other", "").unwrap().is_none());
        assert!(target(src, "z", "t", "").unwrap().is_none());
    }

    #[test]
    fn defines_expand_into_args() {
        let src = "\
test: t
config=c
description=d
params=opt=5
build.args=-O2
define opt=+opt+$$
define build dbg=-g$$
define run n=-n $$
define run lit=\\$$x
endtest
";
        let rec = target(src, "c", "t", "dbg,n=3,lit,unknown").unwrap().unwrap();
        assert_eq!(rec.params, "opt=5,dbg,n=3,lit,unknown");
        assert_eq!(rec.build_args, "-O2 +opt+5 -g");
        assert_eq!(rec.run_args, "+opt+5 -n 3 $$x");
        assert_eq!(rec.define.get("opt").map(String::as_str), Some("+opt+$$"));
        assert_eq!(rec.log_label, "c::t,opt=5,dbg,n=3,lit,unknown(1)");
    }

    #[test]
    fn define_append_concatenates() {
        let src = "\
test: t
config=c
description=d
define opt=+a
define opt+=+$$
endtest
";
        let rec = target(src, "c", "t", "opt=1").unwrap().unwrap();
        assert_eq!(rec.define["opt"], "+a+$$");
        assert_eq!(rec.build_args, "+a+1");
    }

    #[test]
    fn reads_from_files() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("a.test");
        std::fs::write(&path, "test: t\nconfig=c\ndescription=d\nendtest\n").unwrap();

        let rec = get_test(&path, "c", "t", "").unwrap().unwrap();
        assert_eq!(rec.loc.path, path);
        assert_eq!(quick_parse(&path).unwrap().len(), 1);
        assert!(matches!(
            quick_parse(&dir.path().join("missing.test")),
            Err(VerifyError::Io { .. })
        ));
    }

    #[test]
    fn hinted_lookup_reports_current_line() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("a.test");
        let block = "test: t\nconfig=c\ndescription=d\nendtest\n";
        std::fs::write(&path, format!("#a\n#b\n{}", block)).unwrap();
        let hint = quick_parse(&path).unwrap()[0].loc.clone();
        assert_eq!((hint.line, hint.offset), (3, 6));

        // Same bytes before the block, one line fewer.
        std::fs::write(&path, format!("#abc\n{}", block)).unwrap();
        let rec = get_test_near(&path, hint.offset, "c", "t", "").unwrap().unwrap();
        assert_eq!(rec.loc.line, 2);
        assert_eq!(rec.log_label, "c::t(2)");
    }

    #[test]
    fn stale_hint_falls_back_to_whole_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("a.test");
        std::fs::write(
            &path,
            "test: t\nconfig=c\ndescription=d\nendtest\ntest: u\nconfig=c\ndescription=e\nendtest\n",
        )
        .unwrap();
        let rec = get_test_near(&path, 3, "c", "u", "").unwrap().unwrap();
        assert_eq!(rec.loc.line, 5);
    }

    #[test]
    fn syntax_errors_abort_targeted_parse() {
        let src = "test: a\nbogus\nendtest\ntest: t\nconfig=c\ndescription=d\nendtest\n";
        let err = target(src, "c", "t", "").unwrap_err();
        assert!(matches!(err, VerifyError::Syntax { .. }));
    }
}
