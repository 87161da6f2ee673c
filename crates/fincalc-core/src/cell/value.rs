//! Spreadsheet error codes

use std::fmt;

/// Display code for a cell whose formula evaluated to an error
///
/// These are the familiar spreadsheet error literals. An orchestration layer
/// can store or render them without inspecting error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized function name
    Name,
    /// #NUM! - Invalid numeric operation (overflow, negative root, ...)
    Num,
    /// #CIRC! - Circular dependency
    Circ,
    /// #ERROR! - Formula text could not be parsed
    Syntax,
}

impl CellError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::Circ => "#CIRC!",
            CellError::Syntax => "#ERROR!",
        }
    }

    /// Parse an error string
    pub fn from_code(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "#DIV/0!" => Some(CellError::Div0),
            "#VALUE!" => Some(CellError::Value),
            "#REF!" => Some(CellError::Ref),
            "#NAME?" => Some(CellError::Name),
            "#NUM!" => Some(CellError::Num),
            "#CIRC!" => Some(CellError::Circ),
            "#ERROR!" => Some(CellError::Syntax),
            _ => None,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for err in [
            CellError::Div0,
            CellError::Value,
            CellError::Ref,
            CellError::Name,
            CellError::Num,
            CellError::Circ,
            CellError::Syntax,
        ] {
            assert_eq!(CellError::from_code(err.as_str()), Some(err));
        }
        assert_eq!(CellError::from_code("#div/0!"), Some(CellError::Div0));
        assert_eq!(CellError::from_code("#N/A"), None);
    }
}
