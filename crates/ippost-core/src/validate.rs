//! Syntactic IPv4 validation

/// Check that `candidate` is a dotted-quad IPv4 address
///
/// Exactly four dot-separated segments, each made only of ASCII digits with a
/// value in `0..=255`. A multi-digit segment may not start with `0`, so every
/// accepted string parses to the same [`std::net::Ipv4Addr`] it spells.
/// No check is made for reserved or private ranges.
pub fn is_valid_ipv4(candidate: &str) -> bool {
    let segments: Vec<&str> = candidate.split('.').collect();
    segments.len() == 4 && segments.iter().all(|s| is_valid_segment(s))
}

fn is_valid_segment(segment: &str) -> bool {
    if segment.is_empty() || segment.len() > 3 {
        return false;
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if segment.len() > 1 && segment.starts_with('0') {
        return false;
    }
    segment.parse::<u16>().is_ok_and(|value| value <= 255)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_dotted_quads() {
        assert!(is_valid_ipv4("192.168.1.1"));
        assert!(is_valid_ipv4("0.0.0.0"));
        assert!(is_valid_ipv4("255.255.255.255"));
        assert!(is_valid_ipv4("10.0.0.1"));
    }

    #[test]
    fn test_rejects_out_of_range_segment() {
        assert!(!is_valid_ipv4("256.1.1.1"));
        assert!(!is_valid_ipv4("1.1.1.1000"));
    }

    #[test]
    fn test_rejects_wrong_segment_count() {
        assert!(!is_valid_ipv4("1.2.3"));
        assert!(!is_valid_ipv4("1.2.3.4.5"));
        assert!(!is_valid_ipv4(""));
        assert!(!is_valid_ipv4("1.2.3."));
    }

    #[test]
    fn test_rejects_non_digits() {
        assert!(!is_valid_ipv4("abc.1.1.1"));
        assert!(!is_valid_ipv4(" 1.1.1.1"));
        assert!(!is_valid_ipv4("1.1.1.1\n"));
        assert!(!is_valid_ipv4("+1.1.1.1"));
        assert!(!is_valid_ipv4("::1"));
    }

    #[test]
    fn test_rejects_leading_zeros() {
        assert!(!is_valid_ipv4("01.1.1.1"));
        assert!(!is_valid_ipv4("1.1.1.007"));
    }

    #[test]
    fn test_agrees_with_std_parser() {
        for candidate in ["8.8.8.8", "256.0.0.1", "1.2.3", "010.0.0.1", "a.b.c.d"] {
            assert_eq!(
                is_valid_ipv4(candidate),
                candidate.parse::<std::net::Ipv4Addr>().is_ok(),
                "disagreement on {candidate:?}"
            );
        }
    }
}
