//! Content-addressed translation cache with multi-tier provider failover
//! (DeepL -> OpenAI -> Google) and cost-controlled circuit breaking.
//!
//! [`TranslationService`] is the intended entry point for consumers (CLI
//! utilities today, an HTTP surface later): it owns the store, wires the
//! three backends from [`Config`], and exposes the pipeline's `translate`
//! call plus the dashboard/cache-admin operations the CLI tools need.

pub mod backends;
pub mod config;
pub mod cost_control;
pub mod error;
pub mod external_data;
pub mod fingerprint;
pub mod http;
pub mod pipeline;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use pipeline::Pipeline;
pub use types::{TranslationOptions, TranslationResponse};

use std::sync::Arc;

use backends::deepl::DeeplBackend;
use backends::google::GoogleBackend;
use backends::openai::OpenaiBackend;
use external_data::{DefaultDataSource, ExternalDataService};
use store::Store;

/// Wires a [`Pipeline`] from [`Config`], owning the store for the lifetime
/// of the process. Cheap to clone (everything behind it is `Arc`-shared).
#[derive(Clone)]
pub struct TranslationService {
    pipeline: Arc<Pipeline>,
}

impl TranslationService {
    /// Opens the store, runs the external-data staleness check/refresh (see
    /// `ExternalDataService::initialize`), and wires the pipeline. Async
    /// because the external-data refresh may perform network I/O.
    pub async fn new(config: &Config) -> CoreResult<Self> {
        let store = Store::open(&config.sqlite_db_path)?;

        ExternalDataService::new(&store).initialize(&DefaultDataSource).await?;

        let cost_controller = cost_control::CostController::new(
            config.daily_budget_google,
            config.daily_budget_openai,
            config.google_price_per_million_chars,
        );

        let deepl = Box::new(DeeplBackend::new(config.deepl_api_key.clone()));
        let openai = Box::new(OpenaiBackend::new(
            config.openai_api_key.clone(),
            config.openai_translation_model.clone(),
            config.openai_refinement_model.clone(),
            config.openai_price_input,
            config.openai_price_output,
        ));
        let google = Box::new(GoogleBackend::new(
            config.google_access_token.clone(),
            config.google_cloud_project.clone(),
            config.google_price_per_million_chars,
        ));
        let refiner = Box::new(OpenaiBackend::new(
            config.openai_api_key.clone(),
            config.openai_translation_model.clone(),
            config.openai_refinement_model.clone(),
            config.openai_price_input,
            config.openai_price_output,
        ));

        let pipeline = Pipeline::new(store, cost_controller, deepl, openai, google, refiner);
        Ok(Self { pipeline: Arc::new(pipeline) })
    }

    pub async fn translate(&self, text: &str, source_lang: &str, target_lang: &str, options: &TranslationOptions) -> TranslationResponse {
        self.pipeline.translate(text, source_lang, target_lang, options).await
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
