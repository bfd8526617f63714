use verify::{
    cli, config::Config, errors,
    executor::{self, Job},
    index::{self, TestIndex, TomlStore},
    logging, select,
};

use cli::Opts;
use errors::VerifyError;
use structopt::StructOpt;
use tokio::runtime;
use tracing::error;

fn dry_run(jobs: &[Job]) {
    use colored::*;
    for job in jobs {
        println!("{}", job.record.log_label.blue());
        for cmd in job.build.iter().chain(job.run.iter()) {
            println!("  {}", cmd);
        }
    }
}

fn run() -> Result<i32, VerifyError> {
    let opts = Opts::from_args();
    logging::init(opts.verbose, opts.log_file.as_deref())?;

    let conf = Config::from_path(&opts.dir)?;
    let filter = select::Filter::new(
        opts.include_filter.as_deref(),
        opts.exclude_filter.as_deref(),
    )?;

    // Switch to directory containing verify.toml.
    std::env::set_current_dir(&opts.dir).map_err(|err| VerifyError::io(&opts.dir, err))?;

    let mut test_index = TestIndex::open(
        &conf.test_root,
        conf.suffix.as_str(),
        TomlStore::in_dir(&conf.index_dir),
    )?;

    if opts.reindex {
        let (added, removed) = if test_index.is_built() {
            test_index.reconcile()?
        } else {
            (test_index.rebuild()?, 0)
        };
        println!("index: {} added / {} removed", added, removed);
    }

    if opts.list {
        use colored::*;
        let found = index::list_tests(&conf.test_root, &conf.suffix)?;
        for test in filter.summaries(&found) {
            println!(
                "{}  {}  {}",
                format!("{}::{}", test.config, test.name).blue(),
                test.description,
                test.loc.to_string().dimmed()
            );
        }
        return Ok(0);
    }

    let found = if opts.tests.is_empty() {
        index::list_tests(&conf.test_root, &conf.suffix)?
    } else {
        Vec::new()
    };
    let specs = select::select_tests(&opts.tests, &found, &filter);

    // Resolve everything up front so only this process ever writes the index.
    let mut jobs = Vec::with_capacity(specs.len());
    let mut errors = Vec::new();
    for spec in specs {
        let params = spec.params_with(&opts.params);
        match test_index.resolve_and_parse(&spec.config, &spec.name, &params) {
            Ok(record) => {
                let build = if opts.skip_build { None } else { conf.build.as_deref() };
                jobs.push(Job::new(record, build, conf.run.as_deref(), conf.timeout()));
            }
            Err(err) => {
                error!("{}", err);
                errors.push(err);
            }
        }
    }

    // Print out the commands for each test in dry run mode.
    if opts.dry_run {
        dry_run(&jobs);
        return Ok(errors.len() as i32);
    }

    let parallel = opts.jobs.unwrap_or_else(num_cpus::get);
    let ctx = executor::Context::new(jobs, parallel, errors);
    let runtime = runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(parallel.max(1))
        .build()
        .map_err(|err| VerifyError::Exec {
            label: "verify".to_string(),
            msg: format!("cannot start runtime: {}", err),
        })?;

    // Run all the tests.
    runtime.block_on(ctx.flat_summary(opts.verbose > 0))
}

fn main() {
    std::process::exit(match run() {
        Err(err) => {
            println!("error: {}", err);
            1
        }
        Ok(failed_tests) => failed_tests,
    })
}
