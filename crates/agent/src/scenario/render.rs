//! Prompt template rendering

use std::collections::BTreeMap;

/// Replace `{key}` with `data[key]`. Unknown keys and unbalanced braces
/// are left as written.
pub fn render_template(template: &str, data: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(&['{', '}'][..]) {
            Some(close) if after.as_bytes()[close] == b'}' => {
                let key = &after[..close];
                match data.get(key) {
                    Some(value) if is_placeholder(key) => out.push_str(value),
                    _ => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    },
                }
                rest = &after[close + 1..];
            },
            _ => {
                out.push('{');
                rest = after;
            },
        }
    }
    out.push_str(rest);
    out
}

fn is_placeholder(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_')
}
