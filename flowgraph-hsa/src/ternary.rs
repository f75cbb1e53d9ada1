//! Fixed-width ternary arrays.
//!
//! A [`TernaryArray`] describes one set of packet headers as a vector over `{0, 1, x}` where
//! `x` matches either bit. Positions are packed four to a byte, most significant pair first:
//!
//! | bits | position |
//! |------|----------|
//! | `01` | `0`      |
//! | `10` | `1`      |
//! | `11` | `x`      |
//! | `00` | contradiction |
//!
//! The high bit of a pair reads "may be one", the low bit "may be zero". Intersection is then
//! a plain bitwise AND, and any pair collapsing to `00` turns the whole array into the empty
//! set. Unused positions in the last byte are kept at `11` so that byte-wise operations never
//! see a spurious contradiction there.
use std::{fmt, str::FromStr};

use crate::HsaError;

/// Mask selecting the "may be one" bit of every pair.
const HIGH: u8 = 0xAA;
/// Mask selecting the "may be zero" bit of every pair.
const LOW: u8 = 0x55;

/// The value of a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trit {
    Zero,
    One,
    Wildcard,
}

impl Trit {
    #[inline]
    const fn bits(self) -> u8 {
        match self {
            Self::Zero => 0b01,
            Self::One => 0b10,
            Self::Wildcard => 0b11,
        }
    }

    #[inline]
    const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0b01 => Some(Self::Zero),
            0b10 => Some(Self::One),
            0b11 => Some(Self::Wildcard),
            _ => None,
        }
    }

    /// Returns the opposite concrete value, or `None` for a wildcard.
    #[inline]
    pub const fn flipped(self) -> Option<Self> {
        match self {
            Self::Zero => Some(Self::One),
            Self::One => Some(Self::Zero),
            Self::Wildcard => None,
        }
    }

    #[inline]
    pub const fn is_concrete(self) -> bool {
        !matches!(self, Self::Wildcard)
    }

    const fn as_char(self) -> char {
        match self {
            Self::Zero => '0',
            Self::One => '1',
            Self::Wildcard => 'x',
        }
    }
}

impl From<bool> for Trit {
    fn from(bit: bool) -> Self {
        if bit {
            Self::One
        } else {
            Self::Zero
        }
    }
}

/// A fixed-width vector over `{0, 1, x}`, or the empty set of that width.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TernaryArray {
    width: usize,
    /// Packed positions. All zero when `empty` is set.
    bytes: Vec<u8>,
    empty: bool,
}

#[inline]
const fn byte_len(width: usize) -> usize {
    (width + 3) / 4
}

/// Bits of the last byte that hold padding positions.
#[inline]
const fn padding_mask(width: usize) -> u8 {
    match width % 4 {
        0 => 0,
        rem => 0xFF >> (2 * rem),
    }
}

#[inline]
const fn shift(position: usize) -> usize {
    6 - 2 * (position % 4)
}

/// Returns `true` if any pair in `byte` is `00`.
#[inline]
const fn has_contradiction(byte: u8) -> bool {
    (byte | (byte >> 1)) & LOW != LOW
}

impl TernaryArray {
    fn filled(width: usize, pattern: u8) -> Self {
        let mut bytes = vec![pattern; byte_len(width)];
        if let Some(last) = bytes.last_mut() {
            *last |= padding_mask(width);
        }
        Self { width, bytes, empty: false }
    }

    /// Creates an array matching every header of the given width.
    pub fn wildcard(width: usize) -> Self {
        Self::filled(width, 0xFF)
    }

    /// Creates an array with every position fixed to `0`.
    pub fn zeros(width: usize) -> Self {
        Self::filled(width, LOW)
    }

    /// Creates an array with every position fixed to `1`.
    pub fn ones(width: usize) -> Self {
        Self::filled(width, HIGH)
    }

    /// Creates the empty set of the given width.
    pub fn empty(width: usize) -> Self {
        Self { width, bytes: vec![0; byte_len(width)], empty: true }
    }

    /// Creates an exact array from the `width` least significant bits of `value`, most
    /// significant bit first. Positions beyond the 128 bits of `value` are `0`.
    pub fn from_value(width: usize, value: u128) -> Self {
        let mut array = Self::zeros(width);
        for position in 0..width {
            let bit = width - 1 - position;
            if bit < 128 && (value >> bit) & 1 == 1 {
                array.put(position, Trit::One);
            }
        }
        array
    }

    #[inline]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Returns `true` if this array is the empty set.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.empty
    }

    /// Returns the packed positions, four per byte. Used as trie symbols.
    #[inline]
    pub fn digits(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns `true` if every position is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        !self.empty && self.bytes.iter().all(|byte| *byte == 0xFF)
    }

    /// Returns `true` if no position is a wildcard, i.e. the array describes one header.
    pub fn is_exact(&self) -> bool {
        if self.empty {
            return false;
        }
        let last = self.bytes.len().saturating_sub(1);
        self.bytes.iter().enumerate().all(|(i, byte)| {
            let mut wildcards = byte & (byte >> 1) & LOW;
            if i == last {
                wildcards &= !padding_mask(self.width);
            }
            wildcards == 0
        })
    }

    /// Returns the value at `position`.
    pub fn get(&self, position: usize) -> Result<Option<Trit>, HsaError> {
        self.check_position(position)?;
        if self.empty {
            return Ok(None);
        }
        Ok(Trit::from_bits(self.bytes[position / 4] >> shift(position)))
    }

    /// Sets the value at `position`. Setting a position of the empty set is a no-op.
    pub fn set(&mut self, position: usize, value: Trit) -> Result<(), HsaError> {
        self.check_position(position)?;
        if !self.empty {
            self.put(position, value);
        }
        Ok(())
    }

    #[inline]
    fn put(&mut self, position: usize, value: Trit) {
        let byte = &mut self.bytes[position / 4];
        let shift = shift(position);
        *byte = (*byte & !(0b11 << shift)) | (value.bits() << shift);
    }

    fn check_position(&self, position: usize) -> Result<(), HsaError> {
        if position < self.width {
            Ok(())
        } else {
            Err(HsaError::PositionOutOfRange { position, width: self.width })
        }
    }

    fn check_width(&self, other: &Self) -> Result<(), HsaError> {
        HsaError::check_width(self.width, other.width)
    }

    /// Iterates over the values of all positions. Yields nothing for the empty set.
    pub fn trits(&self) -> impl Iterator<Item = Trit> + '_ {
        let width = if self.empty { 0 } else { self.width };
        (0..width).filter_map(move |position| {
            Trit::from_bits(self.bytes[position / 4] >> shift(position))
        })
    }

    fn into_empty(mut self) -> Self {
        self.bytes.iter_mut().for_each(|byte| *byte = 0);
        self.empty = true;
        self
    }

    /// Returns the intersection of `self` and `other`.
    pub fn intersect(&self, other: &Self) -> Result<Self, HsaError> {
        self.check_width(other)?;
        if self.empty || other.empty {
            return Ok(Self::empty(self.width));
        }

        let bytes: Vec<u8> = self.bytes.iter().zip(&other.bytes).map(|(a, b)| a & b).collect();
        let result = Self { width: self.width, bytes, empty: false };
        if result.bytes.iter().any(|byte| has_contradiction(*byte)) {
            return Ok(result.into_empty());
        }

        Ok(result)
    }

    /// Returns `true` if `self` and `other` share at least one header.
    pub fn has_intersection(&self, other: &Self) -> Result<bool, HsaError> {
        self.check_width(other)?;
        if self.empty || other.empty {
            return Ok(false);
        }
        Ok(!self.bytes.iter().zip(&other.bytes).any(|(a, b)| has_contradiction(a & b)))
    }

    /// Returns `true` if every header of `self` is also in `other`.
    pub fn is_subset_of(&self, other: &Self) -> Result<bool, HsaError> {
        self.check_width(other)?;
        if self.empty {
            return Ok(true);
        }
        if other.empty {
            return Ok(false);
        }
        Ok(self.bytes.iter().zip(&other.bytes).all(|(a, b)| a & !b == 0))
    }

    /// Returns the arrays whose union is the complement of `self`: one array per concrete
    /// position, all-wildcard except for that position flipped.
    pub fn complement(&self) -> Vec<Self> {
        if self.empty {
            return vec![Self::wildcard(self.width)];
        }

        self.trits()
            .enumerate()
            .filter_map(|(position, trit)| {
                let flipped = trit.flipped()?;
                let mut array = Self::wildcard(self.width);
                array.put(position, flipped);
                Some(array)
            })
            .collect()
    }

    /// Returns `self \ other` as a list of non-empty arrays.
    pub fn difference(&self, other: &Self) -> Result<Vec<Self>, HsaError> {
        self.check_width(other)?;
        if self.empty {
            return Ok(Vec::new());
        }
        if !self.has_intersection(other)? {
            return Ok(vec![self.clone()]);
        }

        let mut pieces = Vec::new();
        for piece in other.complement() {
            let piece = self.intersect(&piece)?;
            if !piece.is_empty() {
                pieces.push(piece);
            }
        }
        Ok(pieces)
    }

    /// Merges two arrays that differ in exactly one position holding `0` in one and `1` in
    /// the other. Returns `None` for any other pair, including identical arrays.
    pub fn try_merge(&self, other: &Self) -> Result<Option<Self>, HsaError> {
        self.check_width(other)?;
        if self.empty || other.empty {
            return Ok(None);
        }

        let mut differing = None;
        for (i, (a, b)) in self.bytes.iter().zip(&other.bytes).enumerate() {
            let diff = a ^ b;
            let pairs = (diff | (diff >> 1)) & LOW;
            match (pairs.count_ones(), differing) {
                (0, _) => {}
                (1, None) => differing = Some((i, diff)),
                _ => return Ok(None),
            }
        }

        let Some((i, diff)) = differing else { return Ok(None) };
        let pair_shift = diff.trailing_zeros() as usize & !1;
        if (diff >> pair_shift) & 0b11 != 0b11 {
            // One side is a wildcard.
            return Ok(None);
        }

        let mut merged = self.clone();
        merged.bytes[i] |= 0b11 << pair_shift;
        Ok(Some(merged))
    }

    /// Three-valued AND: `0` wins, `x ∧ 1 = x`.
    pub fn and(&self, other: &Self) -> Result<Self, HsaError> {
        self.kleene(other, |a, b| ((a & b) & HIGH) | ((a | b) & LOW))
    }

    /// Three-valued OR: `1` wins, `x ∨ 0 = x`.
    pub fn or(&self, other: &Self) -> Result<Self, HsaError> {
        self.kleene(other, |a, b| ((a | b) & HIGH) | ((a & b) & LOW))
    }

    /// Three-valued NOT. Wildcards stay wildcards.
    pub fn not(&self) -> Self {
        if self.empty {
            return self.clone();
        }
        let bytes = self.bytes.iter().map(|byte| ((byte & HIGH) >> 1) | ((byte & LOW) << 1)).collect();
        Self { width: self.width, bytes, empty: false }
    }

    fn kleene(&self, other: &Self, op: impl Fn(u8, u8) -> u8) -> Result<Self, HsaError> {
        self.check_width(other)?;
        if self.empty || other.empty {
            return Ok(Self::empty(self.width));
        }
        let bytes = self.bytes.iter().zip(&other.bytes).map(|(a, b)| op(*a, *b)).collect();
        Ok(Self { width: self.width, bytes, empty: false })
    }

    /// Rewrites the headers of `self` as `(self ∧ mask) ∨ value`.
    pub fn apply_rewrite(&self, mask: &Self, value: &Self) -> Result<Self, HsaError> {
        self.and(mask)?.or(value)
    }
}

impl FromStr for TernaryArray {
    type Err = HsaError;

    /// Parses `0`, `1`, `x` / `X` / `*`. A `z` anywhere yields the empty set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let width = s.chars().count();
        let mut array = Self::wildcard(width);
        let mut empty = false;

        for (position, c) in s.chars().enumerate() {
            let trit = match c {
                '0' => Trit::Zero,
                '1' => Trit::One,
                'x' | 'X' | '*' => Trit::Wildcard,
                'z' | 'Z' => {
                    empty = true;
                    continue;
                }
                other => return Err(HsaError::InvalidSymbol(other)),
            };
            array.put(position, trit);
        }

        if empty {
            return Ok(array.into_empty());
        }
        Ok(array)
    }
}

impl fmt::Display for TernaryArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.empty {
            return f.write_str("empty");
        }
        self.trits().try_for_each(|trit| write!(f, "{}", trit.as_char()))
    }
}
