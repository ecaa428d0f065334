// Rendering JSON values as Python source literals for conf.py

use crate::sphinx::IntersphinxTarget;
use serde_json::Value;

const INDENT: &str = "    ";
const MAX_INLINE: usize = 72;

/// Render a Python string literal (double quoted, escaped)
pub fn python_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a value as a single-line Python literal
pub fn to_python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => python_string(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(to_python_literal).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", python_string(k), to_python_literal(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

/// Render a value as a Python literal, breaking long containers over
/// several lines. `level` is the indentation depth of the first line.
pub fn to_python_literal_pretty(value: &Value, level: usize) -> String {
    let inline = to_python_literal(value);
    let fits = inline.len() + level * INDENT.len() <= MAX_INLINE;

    match value {
        Value::Array(items) if !fits && !items.is_empty() => {
            let pad = INDENT.repeat(level + 1);
            let mut out = String::from("[\n");
            for item in items {
                out.push_str(&pad);
                out.push_str(&to_python_literal_pretty(item, level + 1));
                out.push_str(",\n");
            }
            out.push_str(&INDENT.repeat(level));
            out.push(']');
            out
        }
        Value::Object(map) if !fits && !map.is_empty() => {
            let pad = INDENT.repeat(level + 1);
            let mut out = String::from("{\n");
            for (k, v) in map {
                out.push_str(&pad);
                out.push_str(&python_string(k));
                out.push_str(": ");
                out.push_str(&to_python_literal_pretty(v, level + 1));
                out.push_str(",\n");
            }
            out.push_str(&INDENT.repeat(level));
            out.push('}');
            out
        }
        _ => inline,
    }
}

/// Render an intersphinx mapping; each entry becomes `(url, inventory)`,
/// with `None` when Sphinx should fetch `<url>/objects.inv` itself
pub fn intersphinx_literal<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a IntersphinxTarget)>,
{
    let lines: Vec<String> = entries
        .into_iter()
        .map(|(name, target)| {
            let inventory = target
                .inventory
                .as_deref()
                .map(python_string)
                .unwrap_or_else(|| "None".to_string());
            format!(
                "{}{}: ({}, {}),",
                INDENT,
                python_string(name),
                python_string(&target.url),
                inventory
            )
        })
        .collect();

    if lines.is_empty() {
        "{}".to_string()
    } else {
        format!("{{\n{}\n}}", lines.join("\n"))
    }
}
