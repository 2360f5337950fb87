use crate::llm::ModelTier;
use crate::model::{Category, MarketplaceId, SourceCategory};

/// What is being mapped onto a target marketplace.
#[derive(Debug, Clone, Copy)]
pub enum PromptSubject<'a> {
    ProductName(&'a str),
    Category(&'a SourceCategory),
}

impl PromptSubject<'_> {
    /// Free text handed to keyword retrieval.
    pub fn query_text(&self) -> &str {
        match self {
            Self::ProductName(name) => name,
            Self::Category(source) => &source.name,
        }
    }

    pub fn model_tier(&self, target: MarketplaceId) -> ModelTier {
        let profile = target.profile();
        match self {
            Self::ProductName(_) => profile.product_tier,
            Self::Category(_) => profile.category_tier,
        }
    }
}

const RESPONSE_FORMAT: &str = "JSON形式で以下のように返してください:
{
  \"name\": \"カテゴリ名\",
  \"id\": \"カテゴリID\"
}";

pub fn compile(
    subject: &PromptSubject<'_>,
    target: MarketplaceId,
    candidates: &[&Category],
) -> String {
    let target_name = target.display_name();
    let candidate_list = candidate_list(candidates);
    let body = match subject {
        PromptSubject::ProductName(product_name) => {
            format!(
                "以下の商品名に対して、{target_name}のカテゴリ一覧から最も適切なカテゴリを1つ選択してください。\n\n\
                 商品名: {product_name}\n\n\
                 カテゴリ一覧:\n{candidate_list}\n\n\
                 重要: 上記のカテゴリ一覧の中から、商品名に最も適したカテゴリを1つだけ選択してください。\
                 カテゴリIDは必ず上記のリストに含まれているものを、一字一句そのまま使用してください。\
                 出力は\"name\"と\"id\"の2つのキーだけを持つJSONオブジェクトにしてください。\n\n"
            )
        }
        PromptSubject::Category(source) => {
            format!(
                "以下の{source_name}のカテゴリに対して、{target_name}のカテゴリ一覧から最も適切なカテゴリを1つ選択してください。\n\n\
                 元カテゴリ:\n\
                 - モール: {source_marketplace}\n\
                 - カテゴリ名: {source_category}\n\
                 - カテゴリID: {source_id}\n\n\
                 カテゴリ一覧:\n{candidate_list}\n\n\
                 重要: 上記のカテゴリ一覧の中から、元カテゴリに最も適したカテゴリを1つだけ選択してください。\
                 カテゴリIDは必ず上記のリストに含まれているものを、一字一句そのまま使用してください。\
                 出力は\"name\"と\"id\"の2つのキーだけを持つJSONオブジェクトにしてください。\n\n",
                source_name = source.marketplace_id.display_name(),
                source_marketplace = source.marketplace_id,
                source_category = source.name,
                source_id = source.id,
            )
        }
    };

    format!("{body}{RESPONSE_FORMAT}")
}

fn candidate_list(candidates: &[&Category]) -> String {
    candidates
        .iter()
        .map(|category| format!("{} (ID: {})", category.display_label(), category.category_id))
        .collect::<Vec<String>>()
        .join("\n")
}
