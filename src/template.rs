//! Placeholder substitution for OTA URL templates.
//!
//! Placeholders look like `{checkin}`. Names match case-insensitively, and a
//! placeholder with no supplied value is left in the URL as written.

use crate::error::TemplateError;
use std::fmt::Display;

/// Replace every placeholder named in `values` with the value's string form.
///
/// Only spaces are escaped (as `%20`); other reserved characters pass through.
pub fn expand<K, V>(template: &str, values: &[(K, V)]) -> Result<String, TemplateError>
where
    K: AsRef<str>,
    V: Display,
{
    if template.trim().is_empty() {
        return Err(TemplateError::InvalidTemplate);
    }

    let mut url = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        url.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];

        let Some(close) = after_open.find(['{', '}']) else {
            url.push_str(&rest[open..]);
            return Ok(url);
        };

        if after_open.as_bytes()[close] == b'{' {
            // Unbalanced brace, the inner one may still open a placeholder
            url.push('{');
            url.push_str(&after_open[..close]);
            rest = &after_open[close..];
            continue;
        }

        let name = &after_open[..close];
        match lookup(values, name) {
            Some(value) => url.push_str(&escape_spaces(&value.to_string())),
            None => {
                url.push('{');
                url.push_str(name);
                url.push('}');
            }
        }
        rest = &after_open[close + 1..];
    }

    url.push_str(rest);
    Ok(url)
}

fn lookup<'a, K, V>(values: &'a [(K, V)], name: &str) -> Option<&'a V>
where
    K: AsRef<str>,
{
    values
        .iter()
        .find(|(key, _)| key.as_ref().eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn escape_spaces(value: &str) -> String {
    value.replace(' ', "%20")
}
