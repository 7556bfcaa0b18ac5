//! Severity-tagged compiler messages.
//!
//! Messages render as `[severity]line:col: text`; the location part is
//! omitted when unknown. [`MessageBuilder`] accumulates fragments and
//! finalizes into an immutable [`DiagnosticMessage`].

use std::fmt;

use colored::Colorize;

use crate::source::{SourceFile, SourceLocation};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticMessage {
    severity: Severity,
    location: Option<SourceLocation>,
    content: String,
}

impl DiagnosticMessage {
    pub fn new(severity: Severity, location: Option<SourceLocation>, content: String) -> Self {
        Self {
            severity,
            location,
            content,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn location(&self) -> Option<SourceLocation> {
        self.location
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Renders the message together with the offending source line, the
    /// culprit range highlighted.
    pub fn render(&self, source: &SourceFile) -> String {
        let Some(loc) = self.location else {
            return self.to_string();
        };

        let Some(line_str) = source.content().lines().nth(loc.line.saturating_sub(1)) else {
            return self.to_string();
        };

        let margin = format!("{}", loc.line).len();
        let margin_fill = " ".repeat(margin);
        let padding = " ".repeat(loc.col.saturating_sub(1));

        let (before, after) = line_str.split_at((loc.col - 1).min(line_str.len()));

        format!(
            "{self}\n{margin_fill} |\n{line} |{before}{after}\n{margin_fill} |{padding}^",
            line = loc.line,
            after = after.red(),
        )
    }
}

impl fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) if loc.is_valid() => {
                write!(f, "[{}]{}: {}", self.severity, loc, self.content)
            }
            _ => write!(f, "[{}]: {}", self.severity, self.content),
        }
    }
}

/// Concatenates message fragments, then finalizes to a [`DiagnosticMessage`].
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    severity: Severity,
    location: Option<SourceLocation>,
    content: String,
}

impl MessageBuilder {
    pub fn new(severity: Severity) -> Self {
        Self {
            severity,
            location: None,
            content: String::new(),
        }
    }

    pub fn info() -> Self {
        Self::new(Severity::Info)
    }

    pub fn warning() -> Self {
        Self::new(Severity::Warning)
    }

    pub fn error() -> Self {
        Self::new(Severity::Error)
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn part(mut self, fragment: impl fmt::Display) -> Self {
        use fmt::Write;
        let _ = write!(self.content, "{fragment}");
        self
    }

    pub fn build(self) -> DiagnosticMessage {
        DiagnosticMessage {
            severity: self.severity,
            location: self.location,
            content: self.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_format() {
        let m = MessageBuilder::error()
            .at(SourceLocation {
                offset: 4,
                line: 2,
                col: 5,
            })
            .part("unexpected token '")
            .part(";")
            .part("'")
            .build();

        assert_eq!(m.to_string(), "[error]2:5: unexpected token ';'");
    }

    #[test]
    fn test_message_without_location() {
        let m = MessageBuilder::warning().part("something odd").build();
        assert_eq!(m.to_string(), "[warning]: something odd");
    }
}
