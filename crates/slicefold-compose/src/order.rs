//! Establishing slice order before composition.
//!
//! The composer folds slices exactly in the order it is given. Listings are
//! only an input to that order: callers pick a [`SliceOrder`] and run
//! [`prepare_slices`] so the ordering is an explicit decision rather than
//! whatever the storage service happened to return.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use slicefold_core::{ObjectPath, ObjectRef};

/// How a listed slice collection is ordered before folding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SliceOrder {
    /// Keep the order the listing returned.
    AsListed,
    /// Byte-wise lexicographic by object name.
    #[default]
    Lexicographic,
    /// Lexicographic, but digit runs compare numerically (`part-2` < `part-10`).
    Natural,
}

impl SliceOrder {
    /// The canonical name of this ordering.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AsListed => "as-listed",
            Self::Lexicographic => "lexicographic",
            Self::Natural => "natural",
        }
    }
}

impl fmt::Display for SliceOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SliceOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "as-listed" | "listed" => Ok(Self::AsListed),
            "lexicographic" | "lex" => Ok(Self::Lexicographic),
            "natural" => Ok(Self::Natural),
            other => Err(format!("unknown slice order: {other}")),
        }
    }
}

/// Order `slices` in place. Sorting is stable.
pub fn order_slices(slices: &mut [ObjectRef], order: SliceOrder) {
    match order {
        SliceOrder::AsListed => {}
        SliceOrder::Lexicographic => slices.sort_by(|a, b| a.name().cmp(b.name())),
        SliceOrder::Natural => slices.sort_by(|a, b| natural_cmp(a.name(), b.name())),
    }
}

/// Turn a raw listing into the slice sequence for `destination`.
///
/// Drops the destination itself (a rerun may list a previous result under
/// the same prefix), then applies `order`.
#[must_use]
pub fn prepare_slices(
    listed: Vec<ObjectRef>,
    destination: &ObjectPath,
    order: SliceOrder,
) -> Vec<ObjectRef> {
    let mut slices: Vec<ObjectRef> = listed
        .into_iter()
        .filter(|s| &s.path != destination)
        .collect();
    order_slices(&mut slices, order);
    slices
}

/// Compare two names, treating runs of ASCII digits as numbers.
///
/// Equal numeric values with different zero padding order the shorter run
/// first, so the comparison stays total.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let (start_a, start_b) = (i, j);
            while i < a.len() && a[i].is_ascii_digit() {
                i += 1;
            }
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            let run_a = trim_leading_zeros(&a[start_a..i]);
            let run_b = trim_leading_zeros(&b[start_b..j]);
            let ord = run_a
                .len()
                .cmp(&run_b.len())
                .then_with(|| run_a.cmp(run_b))
                .then_with(|| (i - start_a).cmp(&(j - start_b)));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = a[i].cmp(&b[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

fn trim_leading_zeros(digits: &[u8]) -> &[u8] {
    let first = digits.iter().position(|&d| d != b'0').unwrap_or(digits.len());
    &digits[first..]
}
