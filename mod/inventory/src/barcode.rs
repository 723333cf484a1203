//! Barcode allocation — derives the next free scan code in a name family.
//!
//! Products named "Red Mug" and "RED MUG" normalize to the same base
//! `REDMUG` and draw suffixes from the same family: `REDMUG-001`,
//! `REDMUG-002`, ... Allocation is a pure read-then-compute; the UNIQUE
//! barcode column is the serialization point, and the caller retries on a
//! constraint violation.

use thiserror::Error;

/// Largest suffix a family can hold. The next allocation past this fails.
pub const SUFFIX_MAX: u32 = 999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarcodeError {
    #[error("barcode family '{0}' has no free suffix left (max {SUFFIX_MAX})")]
    SpaceExhausted(String),
}

/// Normalize a product name into its barcode base: strip all whitespace,
/// uppercase the rest.
pub fn base_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Extract the 3-digit family suffix from a barcode, if it belongs to `base`.
///
/// A barcode is in the family when it starts with `{base}-` and ends in a
/// `-`-delimited run of exactly three ASCII digits.
fn family_suffix(barcode: &str, base: &str) -> Option<u32> {
    let rest = barcode.strip_prefix(base)?.strip_prefix('-')?;
    let tail = match rest.rsplit_once('-') {
        Some((_, tail)) => tail,
        None => rest,
    };
    if tail.len() == 3 && tail.bytes().all(|b| b.is_ascii_digit()) {
        tail.parse().ok()
    } else {
        None
    }
}

/// Allocate the next barcode for `name`, given every existing barcode that
/// may belong to the same family.
///
/// The new suffix is the family maximum plus one (gaps are never reused),
/// zero-padded to three digits; `001` when the family is empty.
pub fn allocate(name: &str, existing: &[String]) -> Result<String, BarcodeError> {
    let base = base_name(name);
    let max = existing
        .iter()
        .filter_map(|b| family_suffix(b, &base))
        .max()
        .unwrap_or(0);

    if max >= SUFFIX_MAX {
        return Err(BarcodeError::SpaceExhausted(base));
    }

    Ok(format!("{}-{:03}", base, max + 1))
}
