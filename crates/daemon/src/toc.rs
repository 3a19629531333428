//! Audio table-of-contents parsing and content fingerprinting.
//!
//! Audio discs carry no filesystem label or UUID, so their identity is a
//! fingerprint of the ordered track-length sequence reported by the TOC
//! probe. The fingerprint names output directories, so it must be stable
//! across process restarts.

use sha2::{Digest, Sha256};

/// Lines of probe boilerplate before the first track row.
const HEADER_LINES: usize = 6;
/// Lines of probe boilerplate after the last track row.
const FOOTER_LINES: usize = 2;
/// A well-formed track row has exactly this many whitespace-separated fields.
const TRACK_FIELDS: usize = 8;
/// 0-based field index holding the track length.
const LENGTH_FIELD: usize = 1;

/// Extract the ordered track-length sequence from TOC probe output.
///
/// The fixed header and footer are discarded; remaining rows that do not
/// have exactly [`TRACK_FIELDS`] fields (or whose length field does not
/// parse) are discarded as boilerplate.
pub fn parse_toc(table: &str) -> Vec<u32> {
    let lines: Vec<&str> = table.split('\n').collect();
    if lines.len() <= HEADER_LINES + FOOTER_LINES {
        return Vec::new();
    }

    lines[HEADER_LINES..lines.len() - FOOTER_LINES]
        .iter()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != TRACK_FIELDS {
                return None;
            }
            fields[LENGTH_FIELD].parse::<u32>().ok()
        })
        .collect()
}

/// Hash an ordered track-length sequence into a single integer.
///
/// Identical sequences (including order) always produce the same value; any
/// permutation or length change produces a different value with
/// overwhelming probability.
pub fn fingerprint(lengths: &[u32]) -> u64 {
    let mut hasher = Sha256::new();
    for length in lengths {
        hasher.update(length.to_be_bytes());
    }
    let digest = hasher.finalize();
    digest[..8].iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// The fingerprint rendered as unsigned lowercase hex, for use in names.
pub fn fingerprint_hex(lengths: &[u32]) -> String {
    format!("{:x}", fingerprint(lengths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Build probe-shaped output around the given track rows.
    fn table_with_tracks(lengths: &[u32]) -> String {
        let mut lines = vec![
            "cdparanoia III release 10.2".to_string(),
            "".to_string(),
            "Table of contents (audio tracks only):".to_string(),
            "track        length               begin        copy pre ch".to_string(),
            "===========================================================".to_string(),
            "".to_string(),
        ];
        for (i, len) in lengths.iter().enumerate() {
            lines.push(format!(
                "{:>3}.  {:>8} [00:00.00]  {:>8} [00:00.00]  no   no  2",
                i + 1,
                len,
                0
            ));
        }
        lines.push("TOTAL   12345 [00:00.00]    (audio only)".to_string());
        lines.push("".to_string());
        lines.join("\n")
    }

    #[test]
    fn test_parse_extracts_lengths_in_order() {
        let table = table_with_tracks(&[150, 12045, 9823]);
        assert_eq!(parse_toc(&table), vec![150, 12045, 9823]);
    }

    #[test]
    fn test_malformed_rows_are_discarded() {
        let good = table_with_tracks(&[150]);
        let mut lines: Vec<&str> = good.split('\n').collect();
        // Splice a row with the wrong field count between track and footer
        lines.insert(lines.len() - 2, "this row does not have eight fields");
        let table = lines.join("\n");

        assert_eq!(parse_toc(&table), vec![150]);
    }

    #[test]
    fn test_short_input_yields_no_tracks() {
        assert!(parse_toc("").is_empty());
        assert!(parse_toc("just\na\nfew\nlines").is_empty());
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint(&[150, 12045, 9823]);
        let b = fingerprint(&[150, 12045, 9823]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_order_sensitive() {
        let a = fingerprint(&[150, 12045, 9823]);
        let b = fingerprint(&[12045, 150, 9823]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_hex_is_lowercase() {
        let hex = fingerprint_hex(&[150, 12045, 9823]);
        assert!(!hex.is_empty());
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // *For any* track-length sequence, the fingerprint is a pure function
        // of the ordered sequence.
        #[test]
        fn prop_fingerprint_deterministic(lengths in prop::collection::vec(0u32..1_000_000, 0..30)) {
            prop_assert_eq!(fingerprint(&lengths), fingerprint(&lengths));
        }

        // Changing any single length changes the fingerprint.
        #[test]
        fn prop_fingerprint_length_sensitive(
            lengths in prop::collection::vec(0u32..1_000_000, 1..30),
            index in 0usize..30,
            delta in 1u32..1000,
        ) {
            let index = index % lengths.len();
            let mut changed = lengths.clone();
            changed[index] = changed[index].wrapping_add(delta);
            prop_assume!(changed != lengths);
            prop_assert_ne!(fingerprint(&lengths), fingerprint(&changed));
        }

        // Parsing a synthesized table recovers exactly the burned order.
        #[test]
        fn prop_parse_round_trips_track_order(
            lengths in prop::collection::vec(1u32..1_000_000, 0..20)
        ) {
            let table = table_with_tracks(&lengths);
            prop_assert_eq!(parse_toc(&table), lengths);
        }
    }
}
