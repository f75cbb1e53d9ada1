//! Header-space algebra.
//!
//! Sets of packet headers are modelled as [`TernaryArray`]s (one wildcard pattern) and
//! [`HeaderSpace`]s (a lazily simplified union of patterns minus other patterns). Rules
//! rewrite headers through a [`Rewrite`]; [`convert`] maps protocol matches onto arrays.

mod error;
pub use error::HsaError;

mod ternary;
pub use ternary::{TernaryArray, Trit};

mod header_space;
pub use header_space::HeaderSpace;

mod rewrite;
pub use rewrite::Rewrite;

pub mod convert;
pub use convert::{FieldLayout, HeaderSpaceConverter, Match, SetField};
