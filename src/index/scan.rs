use std::{io, path::Path};

use crate::errors::{Result, VerifyError};

/// Call `visit` with the path, relative to `root`, of every file under `root`
/// whose name ends in `suffix`.
pub fn scan<F>(root: &Path, suffix: &str, mut visit: F) -> Result<()>
where
    F: FnMut(&Path) -> Result<()>,
{
    if !root.is_dir() {
        return Err(VerifyError::io(
            root,
            io::Error::new(io::ErrorKind::NotFound, "test root is not a directory"),
        ));
    }
    let root_str = root.to_str().ok_or_else(|| {
        VerifyError::Config(format!("{} is not valid UTF-8", root.display()))
    })?;
    let pattern = format!(
        "{}/**/*{}",
        glob::Pattern::escape(root_str),
        glob::Pattern::escape(suffix)
    );

    let paths = glob::glob(&pattern).map_err(|err| {
        VerifyError::Config(format!("Invalid test suffix `{}`: {}", suffix, err))
    })?;

    for entry in paths {
        let path = entry.map_err(|err| {
            let path = err.path().to_path_buf();
            VerifyError::io(&path, err.into_error())
        })?;
        if !path.is_file() {
            continue;
        }
        visit(path.strip_prefix(root).unwrap_or(&path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::scan;
    use std::{fs, path::PathBuf};

    #[test]
    fn visits_matching_files_recursively() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::create_dir_all(root.join("c.test")).unwrap();
        for file in ["top.test", "a/one.test", "a/b/two.test", "a/notes.txt"] {
            fs::write(root.join(file), "").unwrap();
        }

        let mut seen = Vec::new();
        scan(root, ".test", |p| {
            seen.push(p.to_path_buf());
            Ok(())
        })
        .unwrap();
        seen.sort();

        let expected: Vec<PathBuf> = ["a/b/two.test", "a/one.test", "top.test"]
            .iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert!(scan(&dir.path().join("nope"), ".test", |_| Ok(())).is_err());
    }
}
