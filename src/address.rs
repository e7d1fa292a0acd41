use solana_pubkey::Pubkey;
use std::str::FromStr;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Check that `address` looks like a base58 Solana public key
///
/// Requires 32-44 characters from the base58 alphabet that decode to a
/// 32-byte key.
pub fn is_valid_solana_address(address: &str) -> bool {
    if address.len() < 32 || address.len() > 44 {
        return false;
    }

    if !address.chars().all(|c| BASE58_ALPHABET.contains(c)) {
        return false;
    }

    Pubkey::from_str(address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        assert!(is_valid_solana_address("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P"));
        assert!(is_valid_solana_address("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA"));
        assert!(is_valid_solana_address("So11111111111111111111111111111111111111112"));
        assert!(is_valid_solana_address("11111111111111111111111111111111"));
    }

    #[test]
    fn test_invalid_addresses() {
        // Too short / too long
        assert!(!is_valid_solana_address(""));
        assert!(!is_valid_solana_address("6EF8rrecthR5Dkzon8Nwu78h"));
        assert!(!is_valid_solana_address(
            "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P6EF8rrecth"
        ));

        // Characters outside the base58 alphabet (0, O, I, l)
        assert!(!is_valid_solana_address("0EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P"));
        assert!(!is_valid_solana_address("OEF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P"));
        assert!(!is_valid_solana_address("IEF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P"));
        assert!(!is_valid_solana_address("lEF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P"));
        assert!(!is_valid_solana_address("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6 "));
    }
}
