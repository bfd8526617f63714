/// Strip the comment and surrounding whitespace from a raw line.
///
/// An unescaped `#` starts a comment that runs to the end of the line. `\#`
/// is kept as a literal `#` with the backslash removed. An empty result means
/// the line carries nothing and should be skipped.
pub fn prune(line: &str) -> String {
    let mut buf = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix("\\#") {
            buf.push('#');
            rest = after;
            continue;
        }
        if c == '#' {
            break;
        }
        buf.push(c);
        rest = &rest[c.len_utf8()..];
    }

    buf.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::prune;

    #[test]
    fn escaped_hash_survives_comment_does_not() {
        assert_eq!(prune("a \\#b # c"), "a #b");
    }

    #[test]
    fn blank_lines_prune_to_nothing() {
        assert_eq!(prune("   "), "");
        assert_eq!(prune("\t\r"), "");
        assert_eq!(prune("   # only a comment"), "");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(prune("  config=x86  \n"), "config=x86");
    }

    #[test]
    fn lone_backslash_is_kept() {
        assert_eq!(prune("run.args=a\\b"), "run.args=a\\b");
    }
}
