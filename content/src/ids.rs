//! Deterministic identifier generation for destination tenants
//!
//! Photo identifiers are unique per tenant, so an image or gallery copied into
//! another tenant needs a fresh identifier. The new identifier is derived from
//! the source identifier and the destination tenant name alone, which keeps
//! repeated runs idempotent: an image found inside a gallery receives the same
//! identifier it would receive when migrated on its own.

use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha256};

/// Length of a platform content identifier
pub const ID_LENGTH: usize = 26;

/// Generate the destination-tenant identifier for a source identifier
///
/// The result is the first 26 characters of the RFC 4648 base32 encoding of
/// `SHA256(old_id + destination_tenant)`, the same alphabet and length as
/// identifiers minted by the platform itself.
///
/// # Example
///
/// ```rust
/// use content::generate_id;
///
/// let first = generate_id("MBDJUMH35VA4VKRW2Y6S2IR44A", "cetest");
/// let second = generate_id("MBDJUMH35VA4VKRW2Y6S2IR44A", "cetest");
/// assert_eq!(first, second);
/// assert_eq!(first.len(), 26);
/// ```
pub fn generate_id(old_id: &str, destination_tenant: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(old_id.as_bytes());
    hasher.update(destination_tenant.as_bytes());
    let digest = hasher.finalize();

    let mut encoded = BASE32_NOPAD.encode(&digest);
    encoded.truncate(ID_LENGTH);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn is_platform_id(candidate: &str) -> bool {
        candidate.len() == ID_LENGTH
            && candidate
                .bytes()
                .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
    }

    #[test]
    fn test_generate_id_is_deterministic() {
        let a = generate_id("IMGSOURCE000000000000000001", "to1");
        let b = generate_id("IMGSOURCE000000000000000001", "to1");
        assert_eq!(a, b);
    }

    #[rstest]
    #[case("img1", "to1", "to2")]
    #[case("MBDJUMH35VA4VKRW2Y6S2IR44A", "cetest", "sandbox.cetest")]
    #[case("", "a", "b")]
    fn test_distinct_tenants_get_distinct_ids(
        #[case] source: &str,
        #[case] first: &str,
        #[case] second: &str,
    ) {
        assert_ne!(generate_id(source, first), generate_id(source, second));
    }

    #[test]
    fn test_generated_id_has_platform_shape() {
        let id = generate_id("gal1", "to1");
        assert_eq!(id.len(), ID_LENGTH);
        assert!(is_platform_id(&id));
    }

    #[rstest]
    #[case("img1", "to1", "MNQOXEQN247Q2AYKMPPR6I6WVI")]
    #[case("MBDJUMH35VA4VKRW2Y6S2IR44A", "cetest", "VHZRMALFN32NTHXQVURPE23I3P")]
    fn test_generate_id_known_values(#[case] source: &str, #[case] tenant: &str, #[case] expected: &str) {
        assert_eq!(generate_id(source, tenant), expected);
    }
}
