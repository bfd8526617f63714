use crate::errors::VerifyError;
use std::path::PathBuf;
use structopt::StructOpt;

/// Options for the CLI.
#[derive(StructOpt, Debug)]
#[structopt(name = "verify", about = "Index, resolve, and run declared tests.")]
pub struct Opts {
    /// Project directory containing verify.toml.
    #[structopt(short = "C", long = "dir", default_value = ".", parse(from_os_str))]
    pub dir: PathBuf,

    /// Tests to run, written as config::name[,param,param=value]. Runs every
    /// test when empty.
    #[structopt(name = "TESTS")]
    pub tests: Vec<TestSpec>,

    /// Comma separated parameters passed to every selected test.
    #[structopt(short, long, default_value = "")]
    pub params: String,

    /// Only select tests whose config::name matches this regex.
    #[structopt(short, long = "include")]
    pub include_filter: Option<String>,

    /// Skip tests whose config::name matches this regex.
    #[structopt(short, long = "exclude")]
    pub exclude_filter: Option<String>,

    /// List the selected tests and exit.
    #[structopt(short, long)]
    pub list: bool,

    /// Repair the test index before doing anything else.
    #[structopt(long)]
    pub reindex: bool,

    /// Print the commands that would be executed.
    #[structopt(short = "n", long)]
    pub dry_run: bool,

    /// Do not run the build step.
    #[structopt(long)]
    pub skip_build: bool,

    /// Number of tests run in parallel. Defaults to the number of CPUs.
    #[structopt(short, long)]
    pub jobs: Option<usize>,

    /// Log more (-v, -vv, -vvv) and show the output of failing tests.
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u64,

    /// Write the log to this file instead of stderr.
    #[structopt(long, parse(from_os_str))]
    pub log_file: Option<PathBuf>,
}

/// A test named on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSpec {
    pub config: String,
    pub name: String,
    /// Comma separated parameters for this test only.
    pub params: String,
}

impl TestSpec {
    /// Parameters for this test followed by the ones given to every test.
    pub fn params_with(&self, shared: &str) -> String {
        crate::parser::params::join_params(&self.params, shared)
    }
}

impl std::str::FromStr for TestSpec {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (test, params) = s.split_once(',').unwrap_or((s, ""));
        match test.split_once("::") {
            Some((config, name)) if !config.is_empty() && !name.is_empty() => Ok(TestSpec {
                config: config.to_string(),
                name: name.to_string(),
                params: params.to_string(),
            }),
            _ => Err(VerifyError::Config(format!(
                "`{}` must be written as config::name[,params]",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_test_spec() {
        let spec: TestSpec = "x86::add,fast,n=3".parse().unwrap();
        assert_eq!(spec.config, "x86");
        assert_eq!(spec.name, "add");
        assert_eq!(spec.params, "fast,n=3");
        assert_eq!(spec.params_with("dbg"), "fast,n=3,dbg");

        let bare: TestSpec = "x86::add".parse().unwrap();
        assert_eq!(bare.params, "");
    }

    #[test]
    fn rejects_malformed_spec() {
        for bad in ["add", "::add", "x86::", "x86:add"] {
            assert!(bad.parse::<TestSpec>().is_err(), "{}", bad);
        }
    }

    #[test]
    fn parses_flags() {
        let opts = Opts::from_iter(&[
            "verify", "-C", "proj", "-j", "4", "-vv", "-p", "a,b=1", "x86::add",
        ]);
        assert_eq!(opts.dir, PathBuf::from("proj"));
        assert_eq!(opts.jobs, Some(4));
        assert_eq!(opts.verbose, 2);
        assert_eq!(opts.params, "a,b=1");
        assert_eq!(opts.tests.len(), 1);
    }
}
