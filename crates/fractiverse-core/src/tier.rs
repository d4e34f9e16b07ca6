//! Purchasable token tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A fixed token package offered through checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTier {
    /// 100 tokens for $4.99.
    Starter,
    /// 500 tokens for $19.99.
    Standard,
    /// 1,500 tokens for $49.99.
    Pro,
    /// 5,000 tokens for $149.99.
    Ultimate,
}

impl TokenTier {
    /// Every tier, cheapest first.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Starter, Self::Standard, Self::Pro, Self::Ultimate]
    }

    /// Tokens credited when a purchase of this tier settles.
    #[must_use]
    pub const fn token_amount(&self) -> i64 {
        match self {
            Self::Starter => 100,
            Self::Standard => 500,
            Self::Pro => 1_500,
            Self::Ultimate => 5_000,
        }
    }

    /// Price charged by the payment processor, in US cents.
    #[must_use]
    pub const fn price_cents(&self) -> i64 {
        match self {
            Self::Starter => 499,
            Self::Standard => 1_999,
            Self::Pro => 4_999,
            Self::Ultimate => 14_999,
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Standard => "standard",
            Self::Pro => "pro",
            Self::Ultimate => "ultimate",
        }
    }

    /// Product name shown on the processor's checkout page.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} FractiVerse tokens", self.token_amount())
    }
}

impl fmt::Display for TokenTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenTier {
    type Err = TierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|tier| tier.as_str() == name)
            .ok_or(TierError::Unknown(s.to_string()))
    }
}

/// Errors that can occur when resolving a tier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TierError {
    /// The name is not one of the offered tiers.
    #[error("unknown token tier: {0:?}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tiers_case_insensitively() {
        assert_eq!("starter".parse(), Ok(TokenTier::Starter));
        assert_eq!(" PRO ".parse(), Ok(TokenTier::Pro));
    }

    #[test]
    fn rejects_unknown_tier() {
        assert_eq!(
            "platinum".parse::<TokenTier>(),
            Err(TierError::Unknown("platinum".into()))
        );
        assert!("".parse::<TokenTier>().is_err());
    }

    #[test]
    fn larger_tiers_are_cheaper_per_token() {
        let per_token: Vec<f64> = TokenTier::all()
            .iter()
            .map(|t| t.price_cents() as f64 / t.token_amount() as f64)
            .collect();
        assert!(per_token.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TokenTier::Ultimate).unwrap(),
            "\"ultimate\""
        );
    }
}
