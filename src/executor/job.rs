use super::results;
use crate::{errors::VerifyError, parser::TestRecord};
use std::time::Duration;
use tokio::{process::Command, time};
use tracing::{debug, info};

/// A test to be built and run.
pub struct Job {
    /// The test definition.
    pub record: TestRecord,
    /// Build command with arguments filled in. `None` skips the build.
    pub build: Option<String>,
    /// Run command with arguments filled in. `None` skips the run.
    pub run: Option<String>,
    /// Timeout for each step.
    pub timeout: Duration,
}

impl Job {
    /// Fill in a command template for `record`.
    /// `{}` is replaced with `args`, `{config}`, `{name}`, and `{file}` with
    /// the matching fields of the record.
    pub fn expand(template: &str, args: &str, record: &TestRecord) -> String {
        template
            .replace("{config}", &record.config)
            .replace("{name}", &record.name)
            .replace("{file}", &record.loc.path.to_string_lossy())
            .replace("{}", args)
    }

    pub fn new(
        record: TestRecord,
        build: Option<&str>,
        run: Option<&str>,
        timeout: Duration,
    ) -> Self {
        let build = build.map(|t| Self::expand(t, &record.build_args, &record));
        let run = run.map(|t| Self::expand(t, &record.run_args, &record));
        Self {
            record,
            build,
            run,
            timeout,
        }
    }

    /// Construct a shell command for one step.
    fn construct_command(cmd: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(cmd);
        command.kill_on_drop(true);
        command
    }

    /// Run the build step and then the run step, stopping at the first one
    /// that fails or times out.
    pub async fn execute(self) -> Result<results::Test, VerifyError> {
        let label = self.record.log_label.clone();
        let steps = [
            (results::Step::Build, &self.build),
            (results::Step::Run, &self.run),
        ];

        for (step, cmd) in steps.iter() {
            let cmd = match cmd {
                Some(cmd) => cmd,
                None => continue,
            };
            info!("{} {}: {}", label, step, cmd);

            let out = match time::timeout(self.timeout, Self::construct_command(cmd).output())
                .await
            {
                Err(_) => {
                    return Ok(results::Test {
                        label,
                        state: results::State::Timeout(*step),
                    })
                }
                Ok(res) => res.map_err(|err| VerifyError::Exec {
                    label: label.clone(),
                    msg: format!("cannot start {} step: {}", step, err),
                })?,
            };

            let status = out.status.code().unwrap_or(-1);
            debug!("{} {} exited with {}", label, step, status);
            if !out.status.success() {
                let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
                output.push_str(&String::from_utf8_lossy(&out.stderr));
                return Ok(results::Test {
                    label,
                    state: results::State::Failed(*step, status, output),
                });
            }
        }

        Ok(results::Test {
            label,
            state: results::State::Pass,
        })
    }
}
