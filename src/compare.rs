use std::cmp::Ordering;

use unicase::UniCase;

/// Orders two cell values.
///
/// When both sides parse as finite numbers they are compared numerically,
/// otherwise as strings: case-folded first, raw bytes as the tie break so
/// the order stays total.
pub fn compare_values(a: &str, b: &str) -> Ordering {
    match (parse_number(a), parse_number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => collate(a, b),
    }
}

pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn collate(a: &str, b: &str) -> Ordering {
    UniCase::new(a)
        .cmp(&UniCase::new(b))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(compare_values("3", "10"), Ordering::Less);
        assert_eq!(compare_values("10", "3"), Ordering::Greater);
        assert_eq!(compare_values("2.5", "2.50"), Ordering::Equal);
        assert_eq!(compare_values(" 7", "7"), Ordering::Equal);
    }

    #[test]
    fn mixed_values_fall_back_to_strings() {
        assert_eq!(compare_values("10", "abc"), Ordering::Less);
        assert_eq!(compare_values("", "1"), Ordering::Less);
        assert_eq!(compare_values("", ""), Ordering::Equal);
    }

    #[test]
    fn strings_are_case_folded_first() {
        assert_eq!(compare_values("apple", "Banana"), Ordering::Less);
        assert_eq!(compare_values("Banana", "apple"), Ordering::Greater);
        // Same letters, tie broken by raw order.
        assert_ne!(compare_values("a", "A"), Ordering::Equal);
    }

    #[test]
    fn non_finite_words_are_not_numbers() {
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("3"), Some(3.0));
    }
}
