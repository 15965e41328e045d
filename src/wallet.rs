//! On-demand wallet generation.

use alloy::signers::local::PrivateKeySigner;
use tracing::warn;

/// Generates a fresh, uniformly random keypair and returns only the derived
/// address in its EIP-55 string form.
///
/// SECURITY GAP (known non-goal): the private key is dropped when the signer
/// goes out of scope - never persisted, logged, or returned. Funds sent to a
/// generated address cannot be spent through this service; custody requires
/// an external key-management service that derives keys out of band.
pub fn generate_address() -> String {
    let signer = PrivateKeySigner::random();
    let address = signer.address().to_string();
    warn!(%address, "Generated wallet address; private key was not retained");
    address
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::is_valid_address;

    #[test]
    fn generated_address_is_syntactically_valid() {
        let address = generate_address();
        assert!(is_valid_address(&address));
    }

    #[test]
    fn generated_addresses_are_unique() {
        assert_ne!(generate_address(), generate_address());
    }
}
