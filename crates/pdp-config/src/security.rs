//! [`BundleSecurityPolicy`] (spec §4.4.4).

use pdp_bundle::Bundle;

use crate::error::{ConfigError, FatalError};

/// How a bundle's authenticity is established before it is accepted.
#[derive(Clone)]
pub enum BundleSecurityPolicy {
    /// Bundles must carry a valid Ed25519 `MANIFEST` signature under this
    /// key.
    Verified {
        /// The expected signer.
        public_key: ed25519_dalek::VerifyingKey,
    },
    /// Bundles are accepted without signature verification. Construction
    /// fails unless `accept_risk` is `true`.
    Unverified {
        /// Must be `true`; a human-legible opt-in to running unsigned
        /// bundles.
        accept_risk: bool,
    },
}

impl BundleSecurityPolicy {
    /// Validate this policy can be used to construct a bundle source.
    pub fn validate(&self) -> Result<(), FatalError> {
        match self {
            Self::Verified { .. } => Ok(()),
            Self::Unverified { accept_risk: true } => Ok(()),
            Self::Unverified { accept_risk: false } => Err(FatalError::UnverifiedRiskNotAccepted),
        }
    }

    /// Apply this policy to `bundle`, returning an error if it is rejected.
    pub fn check(&self, bundle: &Bundle) -> Result<(), ConfigError> {
        match self {
            Self::Verified { public_key } => {
                bundle.verify(public_key).map_err(ConfigError::BundleRejected)
            }
            Self::Unverified { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdp_bundle::BundleBuilder;

    fn unsigned_bundle() -> Bundle {
        let bytes = BundleBuilder::new(b"{}".to_vec(), "2026-01-01T00:00:00Z".to_string())
            .with_document("p.sapl", b"permit".to_vec())
            .build()
            .unwrap();
        pdp_bundle::BundleParser::parse(&bytes).unwrap()
    }

    #[test]
    fn unverified_without_accepting_risk_fails_validation() {
        let policy = BundleSecurityPolicy::Unverified { accept_risk: false };
        assert!(matches!(policy.validate(), Err(FatalError::UnverifiedRiskNotAccepted)));
    }

    #[test]
    fn unverified_with_accepted_risk_passes_any_bundle() {
        let policy = BundleSecurityPolicy::Unverified { accept_risk: true };
        assert!(policy.validate().is_ok());
        assert!(policy.check(&unsigned_bundle()).is_ok());
    }

    #[test]
    fn verified_rejects_an_unsigned_bundle() {
        let key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
        let policy = BundleSecurityPolicy::Verified { public_key: key.verifying_key() };
        assert!(policy.validate().is_ok());
        assert!(policy.check(&unsigned_bundle()).is_err());
    }

    #[test]
    fn verified_accepts_a_correctly_signed_bundle() {
        let key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
        let bytes = BundleBuilder::new(b"{}".to_vec(), "2026-01-01T00:00:00Z".to_string())
            .with_document("p.sapl", b"permit".to_vec())
            .signed_with(key.clone(), "k1")
            .build()
            .unwrap();
        let bundle = pdp_bundle::BundleParser::parse(&bytes).unwrap();
        let policy = BundleSecurityPolicy::Verified { public_key: key.verifying_key() };
        assert!(policy.check(&bundle).is_ok());
    }
}
