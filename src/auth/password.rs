use bcrypt::BcryptError;

/// Hash a password with bcrypt at the given work factor.
pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    bcrypt::hash(password, cost)
}

/// Check `password` against a bcrypt hash. Unparsable hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_and_are_salted() {
        let first = hash_password("hunter22", 4).unwrap();
        let second = hash_password("hunter22", 4).unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("$2b$04$"));
        assert!(verify_password("hunter22", &first));
        assert!(!verify_password("hunter23", &first));
        assert!(!verify_password("hunter22", "garbage"));
    }

    #[test]
    fn accepts_2a_prefixed_hashes() {
        let stored = bcrypt::hash_with_salt("secret", 4, [7u8; 16])
            .unwrap()
            .format_for_version(bcrypt::Version::TwoA);
        assert!(stored.starts_with("$2a$"));
        assert!(verify_password("secret", &stored));
    }
}
