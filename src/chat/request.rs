//! Routing of one line of user input.

/// What a line typed at the prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Blank line
    Empty,
    /// Natural-language question, full pipeline
    Ask(String),
    /// `direct:` question, generated from table names only
    Direct(String),
    /// `sql:` statement typed by the user
    Raw(String),
}

impl Request {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Request::Empty;
        }
        if let Some(rest) = strip_prefix_ignore_case(line, "sql:") {
            return Request::Raw(rest.trim().to_string());
        }
        if let Some(rest) = strip_prefix_ignore_case(line, "direct:") {
            return Request::Direct(rest.trim().to_string());
        }
        Request::Ask(line.to_string())
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}
