//! Source buffers and locations.
//!
//! A [`SourceFile`] is an immutable, cheaply clonable buffer shared between
//! the lexer, the AST (for diagnostics) and any template whose definition
//! outlives the script that declared it.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug)]
struct SourceFileData {
    path: Option<PathBuf>,
    content: String,
}

/// An immutable source buffer.
#[derive(Debug, Clone)]
pub struct SourceFile {
    data: Rc<SourceFileData>,
}

impl SourceFile {
    /// Wraps an in-memory string, e.g. for command compilation or tests.
    pub fn from_string(content: impl Into<String>) -> Self {
        Self {
            data: Rc::new(SourceFileData {
                path: None,
                content: content.into(),
            }),
        }
    }

    /// Reads a file from disk. This is the only place the pipeline touches I/O.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Ok(Self {
            data: Rc::new(SourceFileData {
                path: Some(path.to_owned()),
                content,
            }),
        })
    }

    pub fn content(&self) -> &str {
        &self.data.content
    }

    pub fn path(&self) -> Option<&Path> {
        self.data.path.as_deref()
    }

    /// Computes the `(line, col)` pair for a byte offset, both 1-based.
    pub fn position(&self, offset: usize) -> SourceLocation {
        let mut line = 1;
        let mut col = 1;
        for (i, c) in self.data.content.char_indices() {
            if i >= offset {
                break;
            }
            if c == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        SourceLocation { offset, line, col }
    }
}

impl PartialEq for SourceFile {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for SourceFile {}

/// A `(offset, line, col)` triple into some source buffer.
///
/// `line` and `col` are 1-based; a defaulted location (all zeroes) means
/// "no location" and renders as nothing.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct SourceLocation {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

impl SourceLocation {
    pub fn is_valid(&self) -> bool {
        self.line != 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.col != 0 {
            write!(f, "{}:{}", self.line, self.col)
        } else {
            write!(f, "{}", self.line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_of_offset() {
        let src = SourceFile::from_string("int a = 5;\na = 6;");

        assert_eq!(
            src.position(0),
            SourceLocation {
                offset: 0,
                line: 1,
                col: 1
            }
        );
        assert_eq!(
            src.position(11),
            SourceLocation {
                offset: 11,
                line: 2,
                col: 1
            }
        );
        assert_eq!(
            src.position(15),
            SourceLocation {
                offset: 15,
                line: 2,
                col: 5
            }
        );
    }
}
