use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownMarketplace;
use crate::llm::ModelTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketplaceId {
    MercariShops,
    Rakuten,
    YahooShopping,
    Rakuma,
}

/// Per-marketplace prompt and model policy.
#[derive(Debug)]
pub struct MarketplaceProfile {
    pub display_name: &'static str,
    pub product_tier: ModelTier,
    pub category_tier: ModelTier,
    pub mappable: bool,
}

const MERCARI_SHOPS: MarketplaceProfile = MarketplaceProfile {
    display_name: "メルカリShops",
    product_tier: ModelTier::Fast,
    category_tier: ModelTier::Strong,
    mappable: true,
};

const RAKUTEN: MarketplaceProfile = MarketplaceProfile {
    display_name: "楽天市場",
    product_tier: ModelTier::Fast,
    category_tier: ModelTier::Strong,
    mappable: true,
};

const YAHOO_SHOPPING: MarketplaceProfile = MarketplaceProfile {
    display_name: "ヤフーショッピング",
    product_tier: ModelTier::Fast,
    category_tier: ModelTier::Strong,
    mappable: true,
};

const RAKUMA: MarketplaceProfile = MarketplaceProfile {
    display_name: "楽天ラクマ",
    product_tier: ModelTier::Fast,
    category_tier: ModelTier::Strong,
    mappable: false,
};

impl MarketplaceId {
    pub const ALL: [MarketplaceId; 4] = [
        MarketplaceId::MercariShops,
        MarketplaceId::Rakuten,
        MarketplaceId::YahooShopping,
        MarketplaceId::Rakuma,
    ];

    pub const MAPPABLE: [MarketplaceId; 3] = [
        MarketplaceId::MercariShops,
        MarketplaceId::Rakuten,
        MarketplaceId::YahooShopping,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MercariShops => "mercari_shops",
            Self::Rakuten => "rakuten",
            Self::YahooShopping => "yahoo_shopping",
            Self::Rakuma => "rakuma",
        }
    }

    pub fn profile(self) -> &'static MarketplaceProfile {
        match self {
            Self::MercariShops => &MERCARI_SHOPS,
            Self::Rakuten => &RAKUTEN,
            Self::YahooShopping => &YAHOO_SHOPPING,
            Self::Rakuma => &RAKUMA,
        }
    }

    pub fn display_name(self) -> &'static str {
        self.profile().display_name
    }
}

impl fmt::Display for MarketplaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketplaceId {
    type Err = UnknownMarketplace;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|marketplace| marketplace.as_str() == normalized)
            .ok_or_else(|| UnknownMarketplace(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Storage-internal key; never shown to the model or to callers.
    #[serde(skip_serializing)]
    pub id: String,
    pub marketplace_id: MarketplaceId,
    pub category_name: String,
    /// Marketplace-native code, unique per marketplace.
    pub category_id: String,
    pub full_path: Option<String>,
    pub parent_category_id: Option<String>,
}

impl Category {
    pub fn display_label(&self) -> &str {
        self.full_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .unwrap_or(&self.category_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSelection {
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCategory {
    pub marketplace_id: MarketplaceId,
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MappingSubject {
    ProductName(String),
    SourceCategory(SourceCategory),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingResult {
    #[serde(flatten)]
    pub subject: MappingSubject,
    pub mappings: BTreeMap<MarketplaceId, MappingSelection>,
}

impl MappingResult {
    pub fn label(&self) -> &str {
        match &self.subject {
            MappingSubject::ProductName(name) => name,
            MappingSubject::SourceCategory(source) => &source.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningRecord {
    pub source_marketplace_id: MarketplaceId,
    pub source_category_name: String,
    pub source_category_id: String,
    pub target_marketplace_id: MarketplaceId,
    pub target_category_name: String,
    pub target_category_id: String,
    pub is_manual_correction: bool,
}

impl LearningRecord {
    pub fn from_selection(
        source: &SourceCategory,
        target: MarketplaceId,
        selection: &MappingSelection,
        is_manual_correction: bool,
    ) -> Self {
        Self {
            source_marketplace_id: source.marketplace_id,
            source_category_name: source.name.clone(),
            source_category_id: source.id.clone(),
            target_marketplace_id: target,
            target_category_name: selection.name.clone(),
            target_category_id: selection.id.clone(),
            is_manual_correction,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketplaceCount {
    pub marketplace: MarketplaceId,
    pub categories: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marketplace_id_parses_snake_and_kebab_case() {
        assert_eq!(
            "mercari_shops".parse::<MarketplaceId>().expect("should parse"),
            MarketplaceId::MercariShops
        );
        assert_eq!(
            "Yahoo-Shopping".parse::<MarketplaceId>().expect("should parse"),
            MarketplaceId::YahooShopping
        );
        assert!("amazon".parse::<MarketplaceId>().is_err());
    }

    #[test]
    fn rakuma_is_known_but_not_mappable() {
        assert!(!MarketplaceId::MAPPABLE.contains(&MarketplaceId::Rakuma));
        assert!(!MarketplaceId::Rakuma.profile().mappable);
        assert_eq!(MarketplaceId::Rakuma.display_name(), "楽天ラクマ");
    }

    #[test]
    fn product_result_serializes_with_product_name_and_keyed_mappings() {
        let mut mappings = BTreeMap::new();
        mappings.insert(
            MarketplaceId::Rakuten,
            MappingSelection {
                name: "Tシャツ".to_string(),
                id: "100371".to_string(),
                full_path: Some("メンズファッション > トップス > Tシャツ".to_string()),
            },
        );
        let result = MappingResult {
            subject: MappingSubject::ProductName("赤いTシャツ".to_string()),
            mappings,
        };

        let value = serde_json::to_value(&result).expect("result should serialize");
        assert_eq!(value["productName"], "赤いTシャツ");
        assert_eq!(value["mappings"]["rakuten"]["id"], "100371");
        assert_eq!(
            value["mappings"]["rakuten"]["fullPath"],
            "メンズファッション > トップス > Tシャツ"
        );
        assert!(value.get("sourceCategory").is_none());
    }

    #[test]
    fn category_result_serializes_source_category() {
        let result = MappingResult {
            subject: MappingSubject::SourceCategory(SourceCategory {
                marketplace_id: MarketplaceId::MercariShops,
                name: "Tシャツ".to_string(),
                id: "m-1".to_string(),
            }),
            mappings: BTreeMap::new(),
        };

        let value = serde_json::to_value(&result).expect("result should serialize");
        assert_eq!(value["sourceCategory"]["marketplaceId"], "mercari_shops");
        assert!(value.get("productName").is_none());
        assert_eq!(value["mappings"], serde_json::json!({}));
    }

    #[test]
    fn display_label_prefers_non_empty_full_path() {
        let mut category = Category {
            id: "cat_1".to_string(),
            marketplace_id: MarketplaceId::Rakuten,
            category_name: "Tシャツ".to_string(),
            category_id: "100371".to_string(),
            full_path: Some(String::new()),
            parent_category_id: None,
        };
        assert_eq!(category.display_label(), "Tシャツ");

        category.full_path = Some("トップス > Tシャツ".to_string());
        assert_eq!(category.display_label(), "トップス > Tシャツ");
    }
}
