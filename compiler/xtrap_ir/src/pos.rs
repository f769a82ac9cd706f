//! Source positions.
//!
//! Compact line/column pair attached to declarations, statements and
//! expressions. The engine only needs lines for registration records and
//! columns to keep synthesized temporaries distinct.

use std::fmt;

/// Line/column position (both 1-based; `0:0` means "synthesized").
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    /// Position for nodes produced by the engine.
    pub const DUMMY: Pos = Pos { line: 0, col: 0 };

    /// Create a new position.
    #[inline]
    pub const fn new(line: u32, col: u32) -> Self {
        Pos { line, col }
    }

    /// Check if this is the dummy position.
    #[inline]
    pub const fn is_dummy(&self) -> bool {
        self.line == 0 && self.col == 0
    }
}

impl fmt::Debug for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
