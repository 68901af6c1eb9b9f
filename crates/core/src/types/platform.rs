//! Marketplace platform identifiers.

use serde::{Deserialize, Serialize};

/// A marketplace platform orders are ingested from.
///
/// Each platform has its own API dialect (auth header, success code, date
/// parameter, payload field names), but those differences live in the ingest
/// crate's configuration - this enum is only the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Shopee,
    Lazada,
    /// TikTok Shop. Serialized as `tiktok` everywhere (env prefixes, CLI
    /// arguments, warehouse rows).
    #[serde(rename = "tiktok")]
    TiktokShop,
}

impl Platform {
    /// All platforms, in the order pipelines are launched.
    pub const ALL: [Self; 3] = [Self::Shopee, Self::Lazada, Self::TiktokShop];

    /// Stable lowercase identifier used in logs, env prefixes, and rows.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shopee => "shopee",
            Self::Lazada => "lazada",
            Self::TiktokShop => "tiktok",
        }
    }

    /// Uppercase prefix for this platform's environment variables,
    /// e.g. `SHOPEE_BASE_URL`.
    #[must_use]
    pub const fn env_prefix(self) -> &'static str {
        match self {
            Self::Shopee => "SHOPEE",
            Self::Lazada => "LAZADA",
            Self::TiktokShop => "TIKTOK",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shopee" => Ok(Self::Shopee),
            "lazada" => Ok(Self::Lazada),
            "tiktok" | "tiktok_shop" => Ok(Self::TiktokShop),
            _ => Err(format!("unknown platform: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_round_trips_through_from_str() {
        for platform in Platform::ALL {
            let parsed: Platform = platform.as_str().parse().unwrap();
            assert_eq!(parsed, platform);
        }
    }

    #[test]
    fn tiktok_shop_accepts_both_spellings() {
        assert_eq!("tiktok".parse::<Platform>().unwrap(), Platform::TiktokShop);
        assert_eq!(
            "tiktok_shop".parse::<Platform>().unwrap(),
            Platform::TiktokShop
        );
    }

    #[test]
    fn unknown_platform_is_rejected() {
        assert!("amazon".parse::<Platform>().is_err());
    }

    #[test]
    fn serializes_as_lowercase_string() {
        let json = serde_json::to_string(&Platform::TiktokShop).unwrap();
        assert_eq!(json, "\"tiktok\"");
    }
}
