//! Address normalization for equality comparison
//!
//! The normalized form is never shown to callers; it only answers
//! "did the provider change this address materially?"

/// Reduce an address to its canonical comparable form
///
/// Lower-cases, turns every character that is not a letter, digit or
/// whitespace into a space, collapses whitespace runs and trims.
///
/// Lower-casing runs first: some upper-case letters lower-case into a
/// letter plus a combining mark, and the mark must be replaced in the same
/// pass for `normalize(normalize(s)) == normalize(s)` to hold.
pub fn normalize(address: &str) -> String {
    let mapped: String = address
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}
