use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HsaError {
    #[error("Width mismatch: expected {expected} positions, found {found}")]
    WidthMismatch { expected: usize, found: usize },
    #[error("Invalid ternary symbol: {0:?}")]
    InvalidSymbol(char),
    #[error("Position {position} out of range for width {width}")]
    PositionOutOfRange { position: usize, width: usize },
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Value does not fit field {field} ({width} bits)")]
    ValueTooWide { field: String, width: usize },
    #[error("Field {field} is {width} bits wide, at most 64 are supported")]
    FieldTooWide { field: String, width: usize },
    #[error("Cannot read an empty ternary array")]
    EmptyArray,
}

impl HsaError {
    /// Returns an error if `found` differs from `expected`.
    #[inline]
    pub(crate) fn check_width(expected: usize, found: usize) -> Result<(), Self> {
        if expected == found {
            Ok(())
        } else {
            Err(Self::WidthMismatch { expected, found })
        }
    }
}
