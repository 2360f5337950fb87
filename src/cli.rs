use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::engine::{CandidatePolicy, MapperSettings};
use crate::llm::gemini::GeminiSettings;
use crate::model::MarketplaceId;

#[derive(Parser, Debug)]
#[command(
    name = "category-mapper",
    version,
    about = "Map product names and marketplace categories onto target marketplace categories"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Import(ImportArgs),
    Search(SearchArgs),
    MapProducts(MapProductsArgs),
    MapCategory(MapCategoryArgs),
    Learn(LearnArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = ".cache/category-mapper")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

impl StoreArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("categories.sqlite"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct LlmArgs {
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(
        long,
        env = "GEMINI_API_BASE",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub api_base: String,

    #[arg(long, default_value = "gemini-2.0-flash-lite")]
    pub fast_model: String,

    #[arg(long, default_value = "gemini-2.5-flash")]
    pub strong_model: String,

    #[arg(long, default_value_t = 30_000)]
    pub llm_timeout_ms: u64,

    #[arg(long, value_enum, default_value_t = CandidatePolicyArg::Strict)]
    pub candidate_policy: CandidatePolicyArg,
}

impl LlmArgs {
    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            api_key: self.api_key.clone().filter(|key| !key.trim().is_empty()),
            api_base: self.api_base.trim_end_matches('/').to_string(),
            fast_model: self.fast_model.clone(),
            strong_model: self.strong_model.clone(),
        }
    }

    pub fn mapper_settings(&self) -> MapperSettings {
        MapperSettings {
            llm_timeout: Duration::from_millis(self.llm_timeout_ms),
            candidate_policy: self.candidate_policy.into(),
            ..MapperSettings::default()
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CandidatePolicyArg {
    Strict,
    Catalog,
}

impl From<CandidatePolicyArg> for CandidatePolicy {
    fn from(value: CandidatePolicyArg) -> Self {
        match value {
            CandidatePolicyArg::Strict => CandidatePolicy::Strict,
            CandidatePolicyArg::Catalog => CandidatePolicy::Catalog,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub marketplace: MarketplaceId,

    #[arg(long)]
    pub csv: PathBuf,

    #[arg(long, default_value_t = false)]
    pub replace: bool,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub marketplace: MarketplaceId,

    #[arg(long)]
    pub query: String,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MapProductsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub llm: LlmArgs,

    /// Newline-delimited product names; reads stdin when omitted.
    #[arg(long)]
    pub input: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// One row per product with an id and full-path column per marketplace.
    #[arg(long, default_value_t = false, conflicts_with = "json")]
    pub csv: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MapCategoryArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub llm: LlmArgs,

    #[arg(long)]
    pub source_marketplace: MarketplaceId,

    #[arg(long)]
    pub source_name: String,

    #[arg(long)]
    pub source_id: String,

    #[arg(long = "target")]
    pub targets: Vec<MarketplaceId>,

    /// Record every produced mapping as a confirmed learning record.
    #[arg(long, default_value_t = false)]
    pub confirm: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long, default_value_t = false, conflicts_with = "json")]
    pub csv: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LearnArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub source_marketplace: MarketplaceId,

    #[arg(long)]
    pub source_name: String,

    #[arg(long)]
    pub source_id: String,

    /// `<marketplace>=<categoryId>`, repeatable.
    #[arg(long = "target", required = true)]
    pub targets: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub manual: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}
