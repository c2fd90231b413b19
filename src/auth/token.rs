use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

pub const RESET_TOKEN_LEN: usize = 48;

/// Generate a password-reset token from the OS CSPRNG. Exact-match lookup is
/// the only check on redemption, so unguessability is the whole security story.
pub fn generate_reset_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_has_expected_length_and_alphabet() {
        let token = generate_reset_token();
        assert_eq!(token.len(), RESET_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn consecutive_tokens_differ() {
        assert_ne!(generate_reset_token(), generate_reset_token());
    }
}
