//! Choosing which tests a run covers.
use regex::Regex;
use std::collections::BTreeSet;

use crate::{cli::TestSpec, errors::VerifyError, parser::TestSummary};

/// Include and exclude regexes matched against `config::name`.
#[derive(Debug, Default)]
pub struct Filter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl Filter {
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Result<Self, VerifyError> {
        let compile = |flag: &str, reg: Option<&str>| {
            reg.map(Regex::new)
                .transpose()
                .map_err(|err| VerifyError::Config(format!("Invalid --{} regex: {}", flag, err)))
        };
        Ok(Filter {
            include: compile("include", include)?,
            exclude: compile("exclude", exclude)?,
        })
    }

    /// True if `config::name` passes both filters.
    pub fn accepts(&self, config: &str, name: &str) -> bool {
        let label = format!("{}::{}", config, name);
        self.include.as_ref().map_or(true, |inc| inc.is_match(&label))
            && !self.exclude.as_ref().map_or(false, |ex| ex.is_match(&label))
    }

    /// Filter the discovered tests, dropping repeated `(config, name)` pairs.
    pub fn summaries<'a>(&self, found: &'a [TestSummary]) -> Vec<&'a TestSummary> {
        let mut seen = BTreeSet::new();
        found
            .iter()
            .filter(|s| {
                self.accepts(&s.config, &s.name)
                    && seen.insert((s.config.as_str(), s.name.as_str()))
            })
            .collect()
    }
}

/// Tests to run: the ones named on the command line, or every discovered
/// test. Both pass through `filter`.
pub fn select_tests(named: &[TestSpec], found: &[TestSummary], filter: &Filter) -> Vec<TestSpec> {
    if !named.is_empty() {
        return named
            .iter()
            .filter(|spec| filter.accepts(&spec.config, &spec.name))
            .cloned()
            .collect();
    }
    filter
        .summaries(found)
        .into_iter()
        .map(|s| TestSpec {
            config: s.config.clone(),
            name: s.name.clone(),
            params: String::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Location;
    use std::path::Path;

    fn summary(config: &str, name: &str) -> TestSummary {
        TestSummary {
            name: name.to_string(),
            config: config.to_string(),
            description: String::new(),
            loc: Location::new(Path::new("a.test"), 1, 0),
        }
    }

    #[test]
    fn include_and_exclude() {
        let filter = Filter::new(Some("^x86::"), Some("slow")).unwrap();
        assert!(filter.accepts("x86", "add"));
        assert!(!filter.accepts("arm", "add"));
        assert!(!filter.accepts("x86", "slow_add"));
    }

    #[test]
    fn bad_regex_is_reported() {
        assert!(Filter::new(Some("("), None).is_err());
    }

    #[test]
    fn selects_discovered_tests_once() {
        let found = vec![summary("x86", "add"), summary("arm", "add"), summary("x86", "add")];
        let filter = Filter::new(None, Some("^arm")).unwrap();
        let picked = select_tests(&[], &found, &filter);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].config, "x86");
    }

    #[test]
    fn named_tests_take_precedence() {
        let named: Vec<TestSpec> = vec!["arm::mul,n=2".parse().unwrap()];
        let picked = select_tests(&named, &[summary("x86", "add")], &Filter::default());
        assert_eq!(picked, named);
    }
}
