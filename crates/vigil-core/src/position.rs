use std::fmt;

/// A zero-based (line, column) pair.
///
/// A missing column means "the whole line, column unspecified". Both fields
/// are unsigned, so non-negativity holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: Option<u32>,
}

impl Position {
    #[inline]
    pub const fn new(line: u32, column: Option<u32>) -> Self {
        Self { line, column }
    }

    #[inline]
    pub const fn line_start(line: u32) -> Self {
        Self { line, column: None }
    }

    pub fn with_column(self, column: u32) -> Self {
        Self {
            line: self.line,
            column: Some(column),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "{}:{}", self.line, column),
            None => write!(f, "{}", self.line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_puts_unspecified_column_first() {
        let whole_line = Position::line_start(3);
        let col_zero = Position::new(3, Some(0));
        assert!(whole_line < col_zero);
        assert!(Position::new(2, Some(80)) < whole_line);
    }

    #[test]
    fn display() {
        assert_eq!(Position::new(4, Some(2)).to_string(), "4:2");
        assert_eq!(Position::line_start(4).to_string(), "4");
    }
}
