use super::{results, Job};
use crate::errors::{RichResult, VerifyError};
use futures::{
    io::{AllowStdIo, AsyncWriteExt},
    stream, StreamExt,
};
use std::path::Path;

/// An executor manages the execution of a list of jobs.
pub struct Executor {
    /// Jobs to be executed.
    jobs: Vec<Job>,
    /// Maximum number of jobs running at once.
    parallel: usize,
}

impl Executor {
    /// Execute the jobs and generate results in completion order.
    pub fn execute_all(
        self,
    ) -> impl stream::Stream<Item = Result<results::Test, VerifyError>> {
        stream::iter(self.jobs.into_iter().map(|job| {
            let label = job.record.log_label.clone();
            async move {
                tokio::spawn(job.execute())
                    .await
                    .map_err(|err| VerifyError::Exec {
                        label,
                        msg: err.to_string(),
                    })
                    // Collapse the join error and the job error into one.
                    .collapse()
            }
        }))
        .buffer_unordered(self.parallel.max(1))
    }
}

/// An execution context runs the jobs of resolved tests and reports them
/// alongside the tests that failed to resolve.
pub struct Context {
    /// Jobs to be executed.
    pub exec: Executor,
    /// Tests that could not be turned into jobs.
    errors: Vec<VerifyError>,
}

impl Context {
    pub fn new(jobs: Vec<Job>, parallel: usize, errors: Vec<VerifyError>) -> Self {
        Context {
            exec: Executor { jobs, parallel },
            errors,
        }
    }

    /// Streams one line per test as soon as it completes, then the summary.
    /// Returns the number of tests that did not pass.
    pub async fn flat_summary(self, show_output: bool) -> Result<i32, VerifyError> {
        let Context { exec, mut errors } = self;
        let stdout_err = |err| VerifyError::io(Path::new("<stdout>"), err);

        let mut tasks = exec.execute_all();
        let stdout_buf = std::io::BufWriter::new(std::io::stdout());
        let mut handle = AllowStdIo::new(stdout_buf);
        let mut summary = results::Summary::default();

        while let Some(res) = tasks.next().await {
            match res {
                Ok(test) => {
                    summary.record(&test);
                    let buf = test.report_str(show_output) + "\n";
                    handle.write_all(buf.as_bytes()).await.map_err(stdout_err)?;
                    handle.flush().await.map_err(stdout_err)?;
                }
                Err(err) => errors.push(err),
            }
        }

        summary.errors = errors.len() as i32;
        let buf = summary.report_str(&errors) + "\n";
        handle.write_all(buf.as_bytes()).await.map_err(stdout_err)?;
        handle.flush().await.map_err(stdout_err)?;

        Ok(summary.failing())
    }
}
