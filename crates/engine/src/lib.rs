pub mod builder;
pub mod config;
pub mod env;
pub mod resolver;
pub mod speech;
pub mod table;
pub mod template;

pub use builder::{Builder, Pipeline, PipelineError};
pub use config::VoiceConfig;
pub use env::{EnvValue, Environment};
pub use resolver::{Resolution, Resolver};

use rand::Rng;
use std::sync::Arc;
use vocanvas_protocol::{CanvasPayload, Swap, WebhookRequest, WebhookResponse};

/// Builder pipeline plus resolver over one immutable config. Cheap to clone and
/// safe to share between concurrent requests.
#[derive(Debug, Clone)]
pub struct Engine {
    pipeline: Arc<Pipeline>,
    resolver: Resolver,
}

impl Engine {
    pub fn new(config: VoiceConfig) -> Result<Self, PipelineError> {
        let pipeline = Pipeline::standard(&config)?;
        Ok(Self::with_pipeline(Arc::new(config), pipeline))
    }

    pub fn with_pipeline(config: Arc<VoiceConfig>, pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            resolver: Resolver::new(config),
        }
    }

    pub fn config(&self) -> &VoiceConfig {
        self.resolver.config()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn environment(&self, req: &WebhookRequest, hostname: Option<&str>) -> Environment {
        self.pipeline.build(req, hostname)
    }

    pub fn respond(&self, req: &WebhookRequest, hostname: Option<&str>) -> WebhookResponse {
        self.respond_with(req, hostname, &mut rand::thread_rng())
    }

    pub fn respond_with<R: Rng + ?Sized>(
        &self,
        req: &WebhookRequest,
        hostname: Option<&str>,
        rng: &mut R,
    ) -> WebhookResponse {
        let env = self.environment(req, hostname);
        let resolution = self.resolver.resolve_with(&env, rng);
        let url = env
            .get("pageUrl")
            .map(|u| u.to_string())
            .filter(|u| !u.is_empty());

        WebhookResponse {
            utterance: resolution.utterance,
            ssml: resolution.ssml,
            canvas: CanvasPayload {
                url,
                swap: if resolution.scene_change {
                    Swap::Replace
                } else {
                    Swap::Merge
                },
                data: resolution.fragment.into_iter().collect(),
            },
        }
    }
}
