//! Location normalization.

/// Normalize an Azure location to its canonical short form.
///
/// `"West US"` and `"westus"` name the same region; ARM returns the latter.
pub fn normalize_location(location: &str) -> String {
    location
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("West US"), "westus");
        assert_eq!(normalize_location("westus"), "westus");
        assert_eq!(normalize_location("North Europe "), "northeurope");
        assert_eq!(normalize_location("UK South"), "uksouth");
    }
}
