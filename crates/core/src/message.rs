//! Positional message templates.
//!
//! Templates use `{0}`, `{1}`, ... placeholders. Substitution is a single
//! left-to-right pass, so text inserted from an argument is never itself
//! scanned for placeholders.

/// Render `template`, replacing `{i}` with `args[i]`.
///
/// Placeholders whose index is beyond `args` are left untouched, as is any
/// brace sequence that is not a decimal index.
pub fn format_message<S: AsRef<str>>(template: &str, args: &[S]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let substituted = after.find('}').and_then(|close| {
            let index = &after[..close];
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let arg = args.get(index.parse::<usize>().ok()?)?;
            Some((arg.as_ref(), close))
        });

        match substituted {
            Some((arg, close)) => {
                out.push_str(arg);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
