use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static VARIABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*variable\s+"([^"]+)"\s*\{"#).expect("Invalid variable regex")
});

static DEFAULT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*default\s*=").expect("Invalid default regex"));

static TYPE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*type\s*=\s*(\S[^\n]*)$").expect("Invalid type regex"));

static DESCRIPTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*description\s*=\s*"((?:[^"\\]|\\.)*)""#)
        .expect("Invalid description regex")
});

/// A `variable` block found in a module's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredVariable {
    pub name: String,
    pub type_: Option<String>,
    pub description: Option<String>,
    /// No `default` attribute, so callers must supply a value.
    pub required: bool,
    pub file: String,
}

/// Shallow scanner for `variable` blocks in Terraform files.
///
/// Only the top level of each block body is inspected, so `default` keys
/// inside nested blocks or object type constraints are not mistaken for the
/// variable's own default.
pub struct TerraformParser {
    content: String,
}

impl TerraformParser {
    pub fn new(content: String) -> Self {
        Self { content }
    }

    pub fn parse_variables(&self, file_name: &str) -> Vec<DeclaredVariable> {
        VARIABLE_REGEX
            .captures_iter(&self.content)
            .filter_map(|captures| {
                let name = captures.get(1)?.as_str().to_string();
                let body_start = captures.get(0)?.end();
                let top_level = top_level_body(&self.content[body_start..]);

                let type_ = TYPE_REGEX
                    .captures(&top_level)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().trim().to_string());
                let description = DESCRIPTION_REGEX
                    .captures(&top_level)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string());

                Some(DeclaredVariable {
                    name,
                    type_,
                    description,
                    required: !DEFAULT_REGEX.is_match(&top_level),
                    file: file_name.to_string(),
                })
            })
            .collect()
    }
}

/// Text of a block body up to its closing brace, with nested `{...}`
/// sections removed. Skips string literals and comments.
fn top_level_body(rest: &str) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut chars = rest.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if depth == 0 {
                    out.push(c);
                }
                let mut escaped = false;
                for s in chars.by_ref() {
                    if depth == 0 {
                        out.push(s);
                    }
                    if escaped {
                        escaped = false;
                    } else if s == '\\' {
                        escaped = true;
                    } else if s == '"' {
                        break;
                    }
                }
            }
            '#' => skip_line(&mut chars, &mut out, depth),
            '/' if chars.peek() == Some(&'/') => skip_line(&mut chars, &mut out, depth),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for s in chars.by_ref() {
                    if prev == '*' && s == '/' {
                        break;
                    }
                    prev = s;
                }
            }
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            _ => {
                if depth == 0 {
                    out.push(c);
                }
            }
        }
    }

    out
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String, depth: usize) {
    for s in chars.by_ref() {
        if s == '\n' {
            if depth == 0 {
                out.push('\n');
            }
            break;
        }
    }
}
