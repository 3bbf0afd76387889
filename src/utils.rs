//! Shared, low-level helpers used throughout the pcmpack Rust core.

/// Product of `dims`, or `None` on overflow. The empty product is 1.
pub fn checked_product(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_product() {
        assert_eq!(checked_product(&[]), Some(1));
        assert_eq!(checked_product(&[3, 0, 5]), Some(0));
        assert_eq!(checked_product(&[usize::MAX, 2]), None);
    }
}
