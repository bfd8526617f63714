//! Line-oriented state machine turning test definition files into
//! instructions.
//!
//! The parser is either idle or inside one `test:` .. `endtest` block. Blocks
//! do not nest. Each block gets a fresh scope id from a counter owned by the
//! parser, so every open file has its own independent state.
use regex::Regex;
use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::OnceLock,
};

use super::prune::prune;
use crate::errors::{Location, Result, VerifyError};

/// Identifier of one `test:` .. `endtest` block within a file.
pub type ScopeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Test,
    EndTest,
    Config,
    Description,
    Params,
    BuildArgs,
    RunArgs,
    Define,
}

/// Restricts a `define` to the build or run arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    None,
    Build,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Structural keywords (`test:`, `endtest`).
    None,
    /// `=`
    Assign,
    /// `+=`
    Append,
}

impl Action {
    fn from_op(op: &str) -> Self {
        if op == "+=" {
            Action::Append
        } else {
            Action::Assign
        }
    }
}

/// One directive read from a test definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub keyword: Keyword,
    pub modifier: Modifier,
    /// Block the instruction belongs to.
    pub scope: Option<ScopeId>,
    /// Test name for `test:`, the value for assignments, the parameter name
    /// for `define`.
    pub primary: String,
    /// Template of a `define`.
    pub secondary: String,
    pub action: Action,
    /// Where the instruction was read.
    pub loc: Location,
}

struct Grammar {
    test: Regex,
    endtest: Regex,
    config: Regex,
    description: Regex,
    params: Regex,
    build_args: Regex,
    run_args: Regex,
    define: Regex,
    define_args: Regex,
}

fn grammar() -> &'static Grammar {
    static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        let re = |pat: &str| Regex::new(pat).expect("Invalid grammar regex");
        Grammar {
            test: re(r"^test:\s*([A-Za-z0-9_]+)$"),
            endtest: re(r"^endtest$"),
            config: re(r"^config\s*=\s*(.*)$"),
            description: re(r"^description\s*=\s*(.*)$"),
            params: re(r"^params\s*(\+?=)\s*(.*)$"),
            build_args: re(r"^build\.args\s*(\+?=)\s*(.*)$"),
            run_args: re(r"^run\.args\s*(\+?=)\s*(.*)$"),
            define: re(r"^define(\s|$)"),
            define_args: re(
                r"^define\s+(?:(build|run)\s+)?([A-Za-z0-9_]+)\s*(\+?=)\s*(.*)$",
            ),
        }
    })
}

/// The block currently being parsed.
#[derive(Debug)]
struct OpenBlock {
    id: ScopeId,
    text: String,
    loc: Location,
}

/// Forward-only instruction reader over one test definition file.
pub struct Parser<R> {
    reader: R,
    path: PathBuf,
    /// Number of the last line read.
    line: usize,
    /// Byte offset of the next line.
    offset: u64,
    open: Option<OpenBlock>,
    next_scope: ScopeId,
    /// A line handed back by `resync` to be read again.
    pending: Option<(String, Location)>,
    /// The line that produced the last error.
    failed: Option<(String, Location)>,
    buf: Vec<u8>,
}

impl Parser<BufReader<File>> {
    /// Open a test definition file for parsing.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| VerifyError::io(path, err))?;
        Ok(Parser::new(BufReader::new(file), path))
    }
}

impl<R: BufRead> Parser<R> {
    /// Create a parser reading from `reader`. `path` is only used to report
    /// locations.
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            path: path.into(),
            line: 0,
            offset: 0,
            open: None,
            next_scope: 0,
            pending: None,
            failed: None,
            buf: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scope of the block currently open, if any.
    pub fn scope(&self) -> Option<ScopeId> {
        self.open.as_ref().map(|block| block.id)
    }

    /// Next pruned, non-empty line with its location. Bytes that are not
    /// valid UTF-8 are replaced with U+FFFD.
    fn read_pruned(&mut self) -> Result<Option<(String, Location)>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .map_err(|err| VerifyError::io(&self.path, err))?;
            if read == 0 {
                return Ok(None);
            }
            let loc = Location::new(&self.path, self.line + 1, self.offset);
            self.line += 1;
            self.offset += read as u64;

            let text = prune(&String::from_utf8_lossy(&self.buf));
            if !text.is_empty() {
                return Ok(Some((text, loc)));
            }
        }
    }

    /// Read the next instruction. Returns `None` on a clean end of file.
    pub fn next_instruction(&mut self) -> Result<Option<Instruction>> {
        let (text, loc) = match self.read_pruned()? {
            Some(line) => line,
            None => {
                self.failed = None;
                return match self.open.take() {
                    Some(block) => Err(VerifyError::Scope {
                        loc: block.loc,
                        text: block.text,
                        reason: "unterminated test block",
                    }),
                    None => Ok(None),
                };
            }
        };

        match self.interpret(&text, &loc) {
            Ok(inst) => Ok(Some(inst)),
            Err(err) => {
                self.failed = Some((text, loc));
                Err(err)
            }
        }
    }

    fn interpret(&mut self, text: &str, loc: &Location) -> Result<Instruction> {
        let g = grammar();
        let scope_err = |reason| VerifyError::Scope {
            loc: loc.clone(),
            text: text.to_string(),
            reason,
        };

        if let Some(caps) = g.test.captures(text) {
            if self.open.is_some() {
                return Err(scope_err("nested test blocks not allowed"));
            }
            let id = self.next_scope;
            self.next_scope += 1;
            self.open = Some(OpenBlock {
                id,
                text: text.to_string(),
                loc: loc.clone(),
            });
            return Ok(Instruction {
                keyword: Keyword::Test,
                modifier: Modifier::None,
                scope: Some(id),
                primary: caps[1].to_string(),
                secondary: String::new(),
                action: Action::None,
                loc: loc.clone(),
            });
        }

        if g.endtest.is_match(text) {
            let block = self
                .open
                .take()
                .ok_or_else(|| scope_err("endtest without test"))?;
            return Ok(Instruction {
                keyword: Keyword::EndTest,
                modifier: Modifier::None,
                scope: Some(block.id),
                primary: String::new(),
                secondary: String::new(),
                action: Action::None,
                loc: loc.clone(),
            });
        }

        let assign = |caps: regex::Captures| (Action::Assign, caps[1].to_string());
        let either = |caps: regex::Captures| (Action::from_op(&caps[1]), caps[2].to_string());

        let (keyword, modifier, action, primary, secondary) =
            if let Some(caps) = g.config.captures(text) {
                let (action, value) = assign(caps);
                (Keyword::Config, Modifier::None, action, value, String::new())
            } else if let Some(caps) = g.description.captures(text) {
                let (action, value) = assign(caps);
                (Keyword::Description, Modifier::None, action, value, String::new())
            } else if let Some(caps) = g.params.captures(text) {
                let (action, value) = either(caps);
                (Keyword::Params, Modifier::None, action, value, String::new())
            } else if let Some(caps) = g.build_args.captures(text) {
                let (action, value) = either(caps);
                (Keyword::BuildArgs, Modifier::None, action, value, String::new())
            } else if let Some(caps) = g.run_args.captures(text) {
                let (action, value) = either(caps);
                (Keyword::RunArgs, Modifier::None, action, value, String::new())
            } else if g.define.is_match(text) {
                let caps = g.define_args.captures(text).ok_or_else(|| {
                    VerifyError::Syntax {
                        loc: loc.clone(),
                        text: text.to_string(),
                        reason: "malformed define",
                    }
                })?;
                let modifier = match caps.get(1).map(|m| m.as_str()) {
                    Some("build") => Modifier::Build,
                    Some("run") => Modifier::Run,
                    _ => Modifier::None,
                };
                (
                    Keyword::Define,
                    modifier,
                    Action::from_op(&caps[3]),
                    caps[2].to_string(),
                    caps[4].to_string(),
                )
            } else {
                return Err(VerifyError::Syntax {
                    loc: loc.clone(),
                    text: text.to_string(),
                    reason: "bad syntax",
                });
            };

        let scope = self
            .scope()
            .ok_or_else(|| scope_err("keyword outside of a test block"))?;

        Ok(Instruction {
            keyword,
            modifier,
            scope: Some(scope),
            primary,
            secondary,
            action,
            loc: loc.clone(),
        })
    }

    /// Recover after an error so parsing can continue with the next block.
    ///
    /// The broken block is abandoned: lines are skipped up to and including
    /// its `endtest`, or up to (not including) the next `test:` line.
    pub fn resync(&mut self) -> Result<()> {
        let g = grammar();
        self.open = None;

        if let Some((text, loc)) = self.failed.take() {
            if g.test.is_match(&text) {
                self.pending = Some((text, loc));
                return Ok(());
            }
        }

        while let Some((text, loc)) = self.read_pruned()? {
            if g.endtest.is_match(&text) {
                return Ok(());
            }
            if g.test.is_match(&text) {
                self.pending = Some((text, loc));
                return Ok(());
            }
        }
        Ok(())
    }
}

impl<R: BufRead + Seek> Parser<R> {
    /// Jump to byte `offset`. Line numbers stay exact: the lines before
    /// `offset` are counted but not parsed. Any open block is dropped.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(|err| VerifyError::io(&self.path, err))?;

        let (mut lines, mut skipped) = (0, 0);
        let mut prefix = (&mut self.reader).take(offset);
        loop {
            self.buf.clear();
            let read = prefix
                .read_until(b'\n', &mut self.buf)
                .map_err(|err| VerifyError::io(&self.path, err))?;
            if read == 0 {
                break;
            }
            skipped += read as u64;
            if self.buf.ends_with(b"\n") {
                lines += 1;
            }
        }

        self.line = lines;
        self.offset = skipped;
        self.open = None;
        self.pending = None;
        self.failed = None;
        Ok(())
    }

    /// Go back to the start of the file.
    pub fn rewind(&mut self) -> Result<()> {
        self.seek_to(0)
    }
}
