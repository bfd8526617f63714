/// Replace the first unescaped `$$` in `template` with `argument`.
///
/// `\$$` stands for a literal `$$`: the backslash is dropped and nothing is
/// substituted there.
pub fn substitute(template: &str, argument: &str) -> String {
    let mut buf = String::with_capacity(template.len() + argument.len());
    let mut rest = template;
    let mut done = false;

    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix("\\$$") {
            buf.push_str("$$");
            rest = after;
        } else if let (false, Some(after)) = (done, rest.strip_prefix("$$")) {
            buf.push_str(argument);
            rest = after;
            done = true;
        } else {
            buf.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    buf
}

/// Split a comma separated parameter list into `(name, value)` pairs.
/// `name=value` yields the value, a bare `name` yields an empty one.
pub fn split_params(params: &str) -> impl Iterator<Item = (&str, &str)> {
    params
        .split(',')
        .map(str::trim)
        .filter(|tok| !tok.is_empty())
        .map(|tok| match tok.split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (tok, ""),
        })
}

/// Join two comma separated lists, dropping empty ones.
pub fn join_params(file: &str, cli: &str) -> String {
    [file, cli]
        .iter()
        .map(|p| p.trim().trim_matches(','))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}
