use crate::errors::VerifyError;
use std::fmt;

/// A step of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Build,
    Run,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Step::Build => write!(f, "build"),
            Step::Run => write!(f, "run"),
        }
    }
}

/// Outcome of a job.
#[derive(Debug, PartialEq)]
pub enum State {
    /// Every step succeeded.
    Pass,
    /// A step exited with a non-zero status. Contains the exit status and
    /// the captured stdout and stderr.
    Failed(Step, i32, String),
    /// A step ran past the timeout.
    Timeout(Step),
}

/// Store information related to one executed test.
#[derive(Debug)]
pub struct Test {
    /// Log label of the test.
    pub label: String,
    /// Result of the build and run steps.
    pub state: State,
}

impl Test {
    pub fn passed(&self) -> bool {
        self.state == State::Pass
    }

    /// Generate colorized string to report the results of this test.
    pub fn report_str(&self, show_output: bool) -> String {
        use colored::*;

        let mut buf = String::new();
        match &self.state {
            State::Pass => {
                buf.push_str(&"✓ ".green().to_string());
                buf.push_str(&self.label.green().to_string());
            }
            State::Timeout(step) => {
                buf.push_str(&"✗ ".red().to_string());
                buf.push_str(&self.label.red().to_string());
                buf.push_str(&format!(" ({} timeout)", step).dimmed().to_string());
            }
            State::Failed(step, status, output) => {
                buf.push_str(&"✗ ".red().to_string());
                buf.push_str(&self.label.red().to_string());
                buf.push_str(
                    &format!(" ({} failed: exit {})", step, status)
                        .dimmed()
                        .to_string(),
                );
                if show_output && !output.is_empty() {
                    for line in output.lines() {
                        buf.push_str("\n    ");
                        buf.push_str(line);
                    }
                }
            }
        };
        buf
    }
}

/// Counts for the final report.
#[derive(Debug, Default, PartialEq)]
pub struct Summary {
    pub pass: i32,
    pub fail: i32,
    /// Tests that could not be resolved or started.
    pub errors: i32,
}

impl Summary {
    pub fn record(&mut self, test: &Test) {
        if test.passed() {
            self.pass += 1;
        } else {
            self.fail += 1;
        }
    }

    /// Exit status of the run: the number of tests that did not pass.
    pub fn failing(&self) -> i32 {
        self.fail + self.errors
    }

    pub fn report_str(&self, errors: &[VerifyError]) -> String {
        use colored::*;

        let mut buf = String::new();
        if !errors.is_empty() {
            buf.push_str(&format!("{}\n", "verify errors".red()));
            errors
                .iter()
                .for_each(|err| buf.push_str(&format!("  {}\n", err.to_string().red())));
        }
        buf.push_str(&format!(
            "  {} passing / {} failing",
            self.pass.to_string().green(),
            self.failing().to_string().red()
        ));
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_report_includes_output_on_request() {
        colored::control::set_override(false);
        let test = Test {
            label: "x86::add(1)".to_string(),
            state: State::Failed(Step::Run, 2, "oops\nmore\n".to_string()),
        };
        assert_eq!(test.report_str(false), "✗ x86::add(1) (run failed: exit 2)");
        assert_eq!(
            test.report_str(true),
            "✗ x86::add(1) (run failed: exit 2)\n    oops\n    more"
        );
    }

    #[test]
    fn summary_counts_errors_as_failing() {
        let mut summary = Summary::default();
        summary.record(&Test {
            label: "a".to_string(),
            state: State::Pass,
        });
        summary.record(&Test {
            label: "b".to_string(),
            state: State::Timeout(Step::Build),
        });
        summary.errors = 2;
        assert_eq!(summary.pass, 1);
        assert_eq!(summary.failing(), 3);
    }
}
