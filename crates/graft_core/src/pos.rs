//! Source position representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A line/column position in source text. Both are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    /// Line number.
    pub line: u32,
    /// Column number.
    pub column: u32,
}

impl Pos {
    /// Creates a new position.
    #[must_use]
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// The position of the first byte of a document.
    #[must_use]
    #[inline]
    pub const fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl Default for Pos {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_display() {
        assert_eq!(Pos::new(3, 14).to_string(), "3:14");
    }

    #[test]
    fn test_pos_ordering() {
        assert!(Pos::new(1, 9) < Pos::new(2, 1));
        assert!(Pos::new(2, 1) < Pos::new(2, 2));
        assert_eq!(Pos::default(), Pos::start());
    }
}
