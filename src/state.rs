//! Application state: record store, query cache, passage sources, graders
//! and the optional OpenAI client.
//!
//! When OPENAI_API_KEY is set, the remote passage source and grader are
//! built from the same client. Without it the seeded pool and the keyword
//! grader serve every request.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::cache::QueryCache;
use crate::config::{load_app_config_from_env, AppConfig, PracticeConfig};
use crate::domain::PassageOrigin;
use crate::grading::{KeywordGrader, RemoteGrader, ShortAnswerGrader};
use crate::openai::OpenAI;
use crate::passages::{PassageSource, RemotePassageSource, SeededPassageSource};
use crate::seeds::seed_passages;
use crate::store::MemoryStore;

pub struct AppState {
    pub store: MemoryStore,
    pub cache: QueryCache,
    pub remote_passages: Option<Arc<dyn PassageSource>>,
    pub seeded: SeededPassageSource,
    pub remote_grader: Option<Arc<dyn ShortAnswerGrader>>,
    pub keyword_grader: KeywordGrader,
    pub practice: PracticeConfig,
    pub openai: Option<OpenAI>,
}

impl AppState {
    /// Build state from env: TOML config (if any) and the OpenAI client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_app_config_from_env().unwrap_or_default();
        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "reading_coach", base_url = %oa.base_url, generation_model = %oa.generation_model, grading_model = %oa.grading_model, "OpenAI enabled.");
        } else {
            info!(target: "reading_coach", "OpenAI disabled (no OPENAI_API_KEY). Using seeded passages and keyword grading.");
        }
        Self::from_parts(cfg, openai)
    }

    pub fn from_parts(cfg: AppConfig, openai: Option<OpenAI>) -> Self {
        let AppConfig { prompts, grading, practice, passages } = cfg;
        let seeded = SeededPassageSource::new(seed_passages(), passages);

        let bank = seeded.count_origin(PassageOrigin::LocalBank);
        info!(target: "passages", seeded = seeded.len() - bank, local_bank = bank, "Startup passage inventory");

        let remote_passages = openai.clone().map(|oa| {
            Arc::new(RemotePassageSource::new(oa, prompts.clone())) as Arc<dyn PassageSource>
        });
        let remote_grader = openai.clone().map(|oa| {
            Arc::new(RemoteGrader::new(oa, prompts)) as Arc<dyn ShortAnswerGrader>
        });

        Self {
            store: MemoryStore::new(),
            cache: QueryCache::new(),
            remote_passages,
            seeded,
            remote_grader,
            keyword_grader: KeywordGrader::new(grading),
            practice,
            openai,
        }
    }

    /// Replace the remote passage source.
    pub fn with_remote_passages(mut self, source: Arc<dyn PassageSource>) -> Self {
        self.remote_passages = Some(source);
        self
    }

    /// Replace the remote short-answer grader.
    pub fn with_remote_grader(mut self, grader: Arc<dyn ShortAnswerGrader>) -> Self {
        self.remote_grader = Some(grader);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_parts(AppConfig::default(), None)
    }
}
