//! Routine pipeline - classify intake, synthesize a routine, enrich each
//! step with retrieved products, and summarize usage.
//!
//! Events are emitted incrementally in a fixed order over a channel-backed
//! stream. Generation and retrieval usage are accumulated in two separate
//! aggregates and summarized exactly once, in the terminal event. Any stage
//! failure becomes a terminal error event; nothing escapes the pipeline
//! boundary as a fault.

use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::adapters::ai::CompletionClient;
use crate::domain::foundation::UserId;
use crate::domain::intake::{collate_advice, IntakeAnswers};
use crate::domain::pricing;
use crate::domain::routine::{parse_routine, routine_prompt, strip_code_fences, RoutineStep};
use crate::ports::{EventStore, ProductIndex, ProductMatch, UnitUsage};

/// Products retrieved per routine step.
const PRODUCTS_PER_STEP: usize = 3;

/// Embedding model assumed by the cost estimate.
const EMBEDDING_MODEL: &str = "text-embedding-004";

/// One event on the pipeline's wire stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum PipelineEvent {
    Status(String),
    Content(String),
    Error(ErrorDetail),
    ProductRecommendation(EnrichedStep),
    TokenSummary(UsageSummary),
}

/// Terminal failure payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    /// Accumulated plan text, included when parsing it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

/// A routine step joined with its retrieved products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedStep {
    #[serde(flatten)]
    pub step: RoutineStep,
    pub products: Vec<ProductMatch>,
}

/// Generation-side usage aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationAggregate {
    pub calls: u32,
    pub prompt_units: u64,
    pub completion_units: u64,
    pub total_units: u64,
    pub estimated_cost_usd: f64,
}

/// Retrieval-side usage aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingAggregate {
    pub calls: u32,
    pub prompt_units: u64,
    pub total_units: u64,
    pub estimated_cost_usd: f64,
}

/// Terminal usage summary carrying both aggregates and their sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub generation: GenerationAggregate,
    pub embeddings: EmbeddingAggregate,
    pub grand_total_units: u64,
    pub estimated_cost_usd: f64,
}

/// Input to one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub answers: IntakeAnswers,
    /// When present, the generated routine is persisted for this user.
    pub user_id: Option<UserId>,
}

/// The streaming routine pipeline.
pub struct RoutinePipeline {
    client: Arc<CompletionClient>,
    index: Arc<dyn ProductIndex>,
    store: Arc<dyn EventStore>,
}

impl RoutinePipeline {
    /// Creates a pipeline.
    pub fn new(
        client: Arc<CompletionClient>,
        index: Arc<dyn ProductIndex>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            client,
            index,
            store,
        }
    }

    /// Runs the pipeline, returning its ordered event stream. Events arrive
    /// incrementally; the stream ends after the terminal summary or error
    /// event.
    pub fn run(&self, request: PipelineRequest) -> impl Stream<Item = PipelineEvent> + Send {
        let (tx, rx) = mpsc::channel::<PipelineEvent>(32);
        let client = Arc::clone(&self.client);
        let index = Arc::clone(&self.index);
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            let emitter = Emitter(tx);
            match run_stages(&emitter, client, index, store, request).await {
                Ok(()) | Err(StageAbort::Cancelled) => {}
                Err(StageAbort::Failed(detail)) => {
                    warn!(message = %detail.message, "pipeline run failed");
                    let _ = emitter.0.send(PipelineEvent::Error(detail)).await;
                }
            }
        });

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }
}

enum StageAbort {
    /// The caller went away; stop emitting.
    Cancelled,
    Failed(ErrorDetail),
}

struct Emitter(mpsc::Sender<PipelineEvent>);

impl Emitter {
    async fn emit(&self, event: PipelineEvent) -> Result<(), StageAbort> {
        self.0.send(event).await.map_err(|_| StageAbort::Cancelled)
    }

    async fn status(&self, text: &str) -> Result<(), StageAbort> {
        self.emit(PipelineEvent::Status(text.to_string())).await
    }
}

fn failed(message: impl Into<String>, raw_output: Option<String>, trace: Option<String>) -> StageAbort {
    StageAbort::Failed(ErrorDetail {
        message: message.into(),
        raw_output,
        trace,
    })
}

async fn run_stages(
    emitter: &Emitter,
    client: Arc<CompletionClient>,
    index: Arc<dyn ProductIndex>,
    store: Arc<dyn EventStore>,
    request: PipelineRequest,
) -> Result<(), StageAbort> {
    emitter.status("Processing your input...").await?;
    let advice = collate_advice(&request.answers);

    emitter.status("Generating routine...").await?;
    let mut generation_usage = UnitUsage::default();
    let mut generation_calls: u32 = 0;
    let mut plan_text = String::new();

    let mut fragments = client.complete(&routine_prompt(&advice), None);
    generation_calls += 1;
    while let Some(item) = fragments.next().await {
        match item {
            Ok(crate::ports::Fragment::Content(text)) => {
                plan_text.push_str(&text);
                emitter.emit(PipelineEvent::Content(text)).await?;
            }
            Ok(crate::ports::Fragment::Reasoning(_)) => {}
            Ok(crate::ports::Fragment::Usage(usage)) => {
                // Usage counters are cumulative within a call; keep the latest.
                generation_usage = usage;
            }
            Err(error) => {
                return Err(failed(
                    format!("Routine generation failed: {}", error),
                    None,
                    Some(error.to_string()),
                ));
            }
        }
    }

    let routine = parse_routine(&plan_text).map_err(|error| {
        failed(
            format!("Failed to parse routine: {}", error),
            Some(strip_code_fences(&plan_text)),
            Some(error.to_string()),
        )
    })?;
    info!(steps = routine.steps.len(), "routine parsed");

    emitter.status("Creating product recommendations...").await?;
    let mut embedding_calls: u32 = 0;
    let mut embedding_prompt_units: u64 = 0;
    let mut embedding_total_units: u64 = 0;

    for step in &routine.steps {
        let response = index
            .search(&step.retrieval_query(), PRODUCTS_PER_STEP)
            .await
            .map_err(|error| {
                failed(
                    format!("Product retrieval failed: {}", error),
                    None,
                    Some(error.to_string()),
                )
            })?;

        if let Some(usage) = response.usage {
            embedding_calls += 1;
            embedding_prompt_units += usage.prompt_units;
            embedding_total_units += usage.total_units;
        }

        emitter
            .emit(PipelineEvent::ProductRecommendation(EnrichedStep {
                step: step.clone(),
                products: response.matches,
            }))
            .await?;
    }

    if let Some(user) = &request.user_id {
        match serde_json::to_value(&routine) {
            Ok(value) => {
                if let Err(error) = store.save_routine(user, value).await {
                    warn!(user = %user, error = %error, "routine persistence failed");
                }
            }
            Err(error) => {
                warn!(user = %user, error = %error, "routine serialization failed");
            }
        }
    }

    emitter.status("All recommendations complete!").await?;

    let generation_cost = pricing::generation_cost(
        client.primary_model(),
        generation_usage.prompt_units,
        generation_usage.completion_units,
    );
    let embedding_cost = pricing::embedding_cost(EMBEDDING_MODEL, embedding_total_units);

    emitter
        .emit(PipelineEvent::TokenSummary(UsageSummary {
            generation: GenerationAggregate {
                calls: generation_calls,
                prompt_units: generation_usage.prompt_units,
                completion_units: generation_usage.completion_units,
                total_units: generation_usage.total_units,
                estimated_cost_usd: generation_cost,
            },
            embeddings: EmbeddingAggregate {
                calls: embedding_calls,
                prompt_units: embedding_prompt_units,
                total_units: embedding_total_units,
                estimated_cost_usd: embedding_cost,
            },
            grand_total_units: generation_usage.total_units + embedding_total_units,
            estimated_cost_usd: generation_cost + embedding_cost,
        }))
        .await?;

    Ok(())
}
