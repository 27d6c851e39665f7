//! Research run orchestration
//!
//! A run walks `Idle -> ToolInit -> TaskBuilt -> Executing -> {Completed, Failed}`.
//! Each run builds its own tool registry and task from scratch; nothing is
//! shared between runs except the immutable configuration.
//!
//! Progress milestones:
//!
//! | Transition            | Event                                   |
//! |-----------------------|-----------------------------------------|
//! | `Idle -> ToolInit`    | 30, "Initializing research agent..."    |
//! | `ToolInit -> TaskBuilt` | label only, "Creating research task..." |
//! | `TaskBuilt -> Executing` | 60, "Researching {ticker}..."        |
//! | `Executing -> Completed` | 100, empty label                     |
//! | any `-> Failed`       | terminal failure event                  |

use crate::config::{LLM_API_KEY_VAR, ResearchConfig, SEARCH_API_KEY_VAR};
use crate::coverage::SectionCoverage;
use crate::error::{ConfigError, FailureKind, RunError, SearchError};
use crate::progress::{ProgressEvent, ProgressSink, ProgressTracker};
use crate::search::{SearchProvider, SerperSearch, WebSearchTool};
use crate::task::ResearchTaskSpec;
use async_trait::async_trait;
use futures::FutureExt;
use research_core::{Agent, Error};
use research_llm::LLMProvider;
use research_llm::providers::{OpenAIConfig, OpenAIProvider};
use research_runtime::{AgentExecutorBuilder, ExecutorConfig, ExecutorEventHandler, ToolAgent};
use research_tools::{Tool, ToolRegistry};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Outcome of one research run
pub type RunResult = Result<ResearchReport, RunError>;

/// Builds the search backend for a run's tool binding
pub type SearchFactory =
    Arc<dyn Fn(&ResearchConfig) -> Result<Arc<dyn SearchProvider>, SearchError> + Send + Sync>;

/// Lifecycle of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Idle,
    ToolInit,
    TaskBuilt,
    Executing,
    Completed,
    Failed,
}

impl RunState {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::ToolInit)
                | (Self::ToolInit, Self::TaskBuilt | Self::Failed)
                | (Self::TaskBuilt, Self::Executing | Self::Failed)
                | (Self::Executing, Self::Completed | Self::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn advance(&mut self, next: Self) {
        debug_assert!(
            self.can_transition_to(next),
            "invalid run transition {self} -> {next}"
        );
        debug!(from = %self, to = %next, "Run state transition");
        *self = next;
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::ToolInit => "ToolInit",
            Self::TaskBuilt => "TaskBuilt",
            Self::Executing => "Executing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Runs a bound research task to completion
///
/// The orchestrator sees this as one atomic step; iteration and token
/// ceilings travel inside the task's bounds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResearchExecutor: Send + Sync {
    async fn execute(
        &self,
        spec: &ResearchTaskSpec,
        tools: Arc<ToolRegistry>,
        observer: Arc<dyn ExecutorEventHandler>,
    ) -> research_core::Result<String>;
}

/// [`ResearchExecutor`] driving an LLM through the bounded agent loop
pub struct LlmResearchExecutor {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: usize,
}

impl LlmResearchExecutor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ResearchConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens_per_completion,
        }
    }

    /// OpenAI-compatible executor from the configured endpoint and key
    pub fn from_config(config: &ResearchConfig) -> Result<Self, ConfigError> {
        let key = config
            .credentials
            .llm_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingCredentials(vec![LLM_API_KEY_VAR]))?;

        let openai = OpenAIConfig::new(key)
            .with_api_base(config.llm_api_base.clone())
            .with_timeout(config.llm_request_timeout.as_secs().max(1));
        let provider = OpenAIProvider::with_config(openai).map_err(|e| ConfigError::Invalid {
            field: "llm_api_key",
            detail: e.to_string(),
        })?;

        Ok(Self::new(Arc::new(provider), config))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ResearchExecutor for LlmResearchExecutor {
    async fn execute(
        &self,
        spec: &ResearchTaskSpec,
        tools: Arc<ToolRegistry>,
        observer: Arc<dyn ExecutorEventHandler>,
    ) -> research_core::Result<String> {
        let system_prompt = spec
            .system_prompt()
            .map_err(|e| Error::InitializationFailed(e.to_string()))?;
        let task_prompt = spec
            .task_prompt()
            .map_err(|e| Error::InitializationFailed(e.to_string()))?;

        let executor = AgentExecutorBuilder::new()
            .provider(self.provider.clone())
            .tool_registry(tools)
            .config(ExecutorConfig {
                max_iterations: spec.bounds.max_iterations,
                max_token_limit: spec.bounds.max_token_limit,
                model: self.model.clone(),
                system_prompt: Some(system_prompt),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            })
            .event_handler(observer)
            .build()?;

        let agent = ToolAgent::from_parts(executor, spec.role.clone());
        info!(
            agent = agent.name(),
            provider = self.provider.name(),
            model = %self.model,
            max_iterations = spec.bounds.max_iterations,
            max_token_limit = spec.bounds.max_token_limit,
            "Starting research agent"
        );
        agent.process(task_prompt).await
    }
}

/// Tool activity counters for one run
#[derive(Default)]
struct RunEventLog {
    tool_calls: AtomicUsize,
    tool_failures: AtomicUsize,
}

#[async_trait]
impl ExecutorEventHandler for RunEventLog {
    async fn on_tool_start(&self, id: &str, name: &str, input: &Value) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
        info!(tool_call_id = id, tool_name = name, %input, "Tool call started");
    }

    async fn on_tool_done(
        &self,
        id: &str,
        name: &str,
        result: Result<&Value, &str>,
        duration_ms: u64,
    ) {
        match result {
            Ok(_) => info!(tool_call_id = id, tool_name = name, duration_ms, "Tool call finished"),
            Err(err) => {
                self.tool_failures.fetch_add(1, Ordering::Relaxed);
                warn!(tool_call_id = id, tool_name = name, duration_ms, error = err, "Tool call failed");
            }
        }
    }

    async fn on_error(&self, error: &str) {
        warn!(error, "Research agent stopped with an error");
    }
}

/// Successful run result
///
/// `text` is exactly what the agent returned.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    pub run_id: Uuid,
    pub ticker: String,
    pub text: String,
    /// Advisory section check
    pub coverage: SectionCoverage,
    pub tool_calls: usize,
    pub tool_failures: usize,
    pub elapsed: Duration,
}

/// A run spawned onto the runtime
///
/// Drain [`ResearchRun::next_event`] until it returns `None`, then collect
/// the result with [`ResearchRun::outcome`].
pub struct ResearchRun {
    events: mpsc::UnboundedReceiver<ProgressEvent>,
    handle: JoinHandle<RunResult>,
}

impl ResearchRun {
    /// Spawn `start` with a sink that forwards into this run's event stream
    pub(crate) fn spawn<F, Fut>(start: F) -> Self
    where
        F: FnOnce(Arc<dyn ProgressSink>) -> Fut,
        Fut: Future<Output = RunResult> + Send + 'static,
    {
        let (tx, events) = mpsc::unbounded_channel();
        let sink: Arc<dyn ProgressSink> = Arc::new(move |event: ProgressEvent| {
            if tx.send(event).is_err() {
                debug!("Progress receiver dropped");
            }
        });
        let handle = tokio::spawn(start(sink));
        Self { events, handle }
    }

    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    pub async fn outcome(self) -> RunResult {
        self.handle
            .await
            .unwrap_or_else(|e| Err(RunError::execution(format!("Research task aborted: {e}"))))
    }
}

/// Sequences tool binding, task construction and execution for a ticker
#[derive(Clone)]
pub struct ResearchOrchestrator {
    config: Arc<ResearchConfig>,
    executor: Arc<dyn ResearchExecutor>,
    search_factory: SearchFactory,
}

impl ResearchOrchestrator {
    /// Orchestrator backed by the Serper search provider
    pub fn new(config: Arc<ResearchConfig>, executor: Arc<dyn ResearchExecutor>) -> Self {
        Self::with_search_factory(config, executor, Arc::new(serper_provider))
    }

    pub fn with_search_factory(
        config: Arc<ResearchConfig>,
        executor: Arc<dyn ResearchExecutor>,
        search_factory: SearchFactory,
    ) -> Self {
        Self {
            config,
            executor,
            search_factory,
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Run to completion without cancellation
    pub async fn run(&self, ticker: &str, sink: &dyn ProgressSink) -> RunResult {
        self.run_with_cancel(ticker, sink, CancellationToken::new())
            .await
    }

    /// Run to completion, honoring `cancel` while executing
    ///
    /// The last event delivered to `sink` is either 100% or a failure.
    pub async fn run_with_cancel(
        &self,
        ticker: &str,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> RunResult {
        let run_id = Uuid::new_v4();
        let ticker = ticker.trim().to_uppercase();
        let span = info_span!("research_run", %run_id, ticker = %ticker);
        let tracker = ProgressTracker::new(sink);
        let mut state = RunState::Idle;

        let result = self
            .drive(run_id, &ticker, &tracker, &mut state, &cancel)
            .instrument(span.clone())
            .await;

        if let Err(err) = &result {
            span.in_scope(|| {
                error!(kind = %err.kind, error = %err.message, from = %state, "Research run failed");
                state.advance(RunState::Failed);
            });
            tracker.fail(err);
        }
        result
    }

    /// Spawn a run and stream its progress events
    pub fn run_streaming(&self, ticker: impl Into<String>, cancel: CancellationToken) -> ResearchRun {
        let orchestrator = self.clone();
        let ticker = ticker.into();
        ResearchRun::spawn(move |sink| async move {
            orchestrator
                .run_with_cancel(&ticker, sink.as_ref(), cancel)
                .await
        })
    }

    async fn drive(
        &self,
        run_id: Uuid,
        ticker: &str,
        tracker: &ProgressTracker<'_>,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> RunResult {
        let started = Instant::now();

        state.advance(RunState::ToolInit);
        let tools = self.bind_tools()?;
        tracker.milestone(30, "Initializing research agent...");

        tracker.status("Creating research task...");
        let spec = ResearchTaskSpec::build(ticker, self.config.bounds)
            .map_err(|e| RunError::execution(e.to_string()))?;
        state.advance(RunState::TaskBuilt);

        tracker.milestone(60, format!("Researching {ticker}..."));
        state.advance(RunState::Executing);

        let observer = Arc::new(RunEventLog::default());
        let text = self.execute(&spec, tools, observer.clone(), cancel).await?;
        if text.trim().is_empty() {
            return Err(RunError::execution("Research agent returned an empty report"));
        }

        let coverage = SectionCoverage::inspect(&text);
        if !coverage.is_complete() {
            let missing: Vec<&str> = coverage.missing.iter().map(|s| s.title()).collect();
            warn!(?missing, has_summary = coverage.has_summary, "Report is missing sections");
        }

        let report = ResearchReport {
            run_id,
            ticker: spec.ticker,
            text,
            coverage,
            tool_calls: observer.tool_calls.load(Ordering::Relaxed),
            tool_failures: observer.tool_failures.load(Ordering::Relaxed),
            elapsed: started.elapsed(),
        };

        state.advance(RunState::Completed);
        tracker.complete();
        info!(
            report_chars = report.text.len(),
            tool_calls = report.tool_calls,
            tool_failures = report.tool_failures,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Research run completed"
        );
        Ok(report)
    }

    fn bind_tools(&self) -> Result<Arc<ToolRegistry>, RunError> {
        let provider = (self.search_factory)(&self.config)
            .map_err(|e| RunError::tool_init(format!("Unable to initialize web search: {e}")))?;
        let tool = WebSearchTool::new(provider, self.config.search.results_per_query);
        debug!(tool = tool.name(), "Search tool bound");
        Ok(Arc::new(ToolRegistry::with_tools([Arc::new(tool) as Arc<dyn Tool>])))
    }

    async fn execute(
        &self,
        spec: &ResearchTaskSpec,
        tools: Arc<ToolRegistry>,
        observer: Arc<RunEventLog>,
        cancel: &CancellationToken,
    ) -> Result<String, RunError> {
        let execution = AssertUnwindSafe(self.executor.execute(spec, tools, observer))
            .catch_unwind()
            .map(|outcome| match outcome {
                Ok(result) => result.map_err(RunError::from),
                Err(panic) => Err(RunError::execution(format!(
                    "Research agent panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            });
        let bounded = async {
            match self.config.run_timeout {
                Some(limit) => tokio::time::timeout(limit, execution).await.unwrap_or_else(|_| {
                    Err(RunError::new(
                        FailureKind::TimedOut,
                        format!("Research run exceeded its {}s deadline", limit.as_secs()),
                    ))
                }),
                None => execution.await,
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RunError::new(
                FailureKind::Cancelled,
                "Research run cancelled by the caller",
            )),
            result = bounded => result,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn serper_provider(config: &ResearchConfig) -> Result<Arc<dyn SearchProvider>, SearchError> {
    let key = config
        .credentials
        .search_api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| SearchError::Auth(format!("{SEARCH_API_KEY_VAR} is not set")))?;
    Ok(Arc::new(SerperSearch::new(key, &config.search)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchHit;
    use crate::search::provider::MockSearchProvider;
    use mockall::mock;
    use research_llm::{CompletionRequest, CompletionResponse, Message, StopReason, TokenUsage};
    use std::sync::Mutex;

    fn config_with_keys() -> ResearchConfig {
        ResearchConfig::builder()
            .search_api_key("serper-test")
            .llm_api_key("sk-test")
            .build()
            .unwrap()
    }

    fn mock_search() -> SearchFactory {
        Arc::new(|_config: &ResearchConfig| {
            let mut provider = MockSearchProvider::new();
            provider.expect_name().return_const("mock".to_string());
            provider.expect_search().returning(|query, _, _| {
                Ok(vec![SearchHit {
                    rank: 1,
                    title: format!("{query} headline"),
                    snippet: "snippet".to_string(),
                    source: "https://example.com".to_string(),
                    date: None,
                }])
            });
            Ok(Arc::new(provider) as Arc<dyn SearchProvider>)
        })
    }

    fn recorder() -> (impl ProgressSink, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = events.clone();
        let sink = move |e: ProgressEvent| sink_events.lock().unwrap().push(e);
        (sink, events)
    }

    #[test]
    fn test_state_transitions() {
        use RunState::*;
        assert!(Idle.can_transition_to(ToolInit));
        assert!(ToolInit.can_transition_to(Failed));
        assert!(ToolInit.can_transition_to(TaskBuilt));
        assert!(Executing.can_transition_to(Completed));
        assert!(!Idle.can_transition_to(Executing));
        assert!(!TaskBuilt.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Idle));
        assert!(Completed.is_terminal() && Failed.is_terminal());
        assert!(!Executing.is_terminal());
    }

    #[tokio::test]
    async fn test_successful_run_keeps_text_verbatim() {
        let mut executor = MockResearchExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .withf(|spec, tools, _| spec.ticker == "TSLA" && tools.get("web_search").is_some())
            .returning(|_, _, _| Ok("  # Report\n\nbody  ".to_string()));

        let orchestrator = ResearchOrchestrator::with_search_factory(
            Arc::new(config_with_keys()),
            Arc::new(executor),
            mock_search(),
        );
        let (sink, events) = recorder();
        let report = orchestrator.run("tsla", &sink).await.unwrap();

        assert_eq!(report.ticker, "TSLA");
        assert_eq!(report.text, "  # Report\n\nbody  ");
        assert_eq!(report.tool_calls, 0);
        assert!(report.coverage.is_structured());
        assert_eq!(report.coverage.missing.len(), 8);

        let percents: Vec<u8> = events.lock().unwrap().iter().filter_map(ProgressEvent::percent).collect();
        assert_eq!(percents, vec![30, 60, 100]);
    }

    #[tokio::test]
    async fn test_missing_search_key_fails_at_tool_init() {
        let mut executor = MockResearchExecutor::new();
        executor.expect_execute().never();

        let config = ResearchConfig::builder().llm_api_key("sk-test").build().unwrap();
        let orchestrator = ResearchOrchestrator::new(Arc::new(config), Arc::new(executor));
        let (sink, events) = recorder();
        let err = orchestrator.run("MSFT", &sink).await.unwrap_err();

        assert_eq!(err.kind, FailureKind::ToolInit);
        assert!(err.message.contains("SERPER_API_KEY"));
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProgressEvent::Failed { kind: FailureKind::ToolInit, .. }));
    }

    #[tokio::test]
    async fn test_empty_report_is_an_execution_error() {
        let mut executor = MockResearchExecutor::new();
        executor.expect_execute().returning(|_, _, _| Ok("   ".to_string()));

        let orchestrator = ResearchOrchestrator::with_search_factory(
            Arc::new(config_with_keys()),
            Arc::new(executor),
            mock_search(),
        );
        let err = orchestrator.run("AAPL", &crate::progress::NoProgress).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Execution);
    }

    #[tokio::test]
    async fn test_executor_error_maps_to_execution() {
        let mut executor = MockResearchExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _, _| Err(Error::ProcessingFailed("model unavailable".to_string())));

        let orchestrator = ResearchOrchestrator::with_search_factory(
            Arc::new(config_with_keys()),
            Arc::new(executor),
            mock_search(),
        );
        let (sink, events) = recorder();
        let err = orchestrator.run("AAPL", &sink).await.unwrap_err();

        assert_eq!(err.kind, FailureKind::Execution);
        assert!(err.message.contains("model unavailable"));
        let events = events.lock().unwrap();
        assert!(events.last().is_some_and(ProgressEvent::is_terminal));
        assert!(matches!(events.last(), Some(ProgressEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_streaming_run_delivers_events_then_outcome() {
        let mut executor = MockResearchExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _, _| Ok("## Company Overview\ntext".to_string()));

        let orchestrator = ResearchOrchestrator::with_search_factory(
            Arc::new(config_with_keys()),
            Arc::new(executor),
            mock_search(),
        );
        let mut run = orchestrator.run_streaming("NVDA", CancellationToken::new());
        let mut events = Vec::new();
        while let Some(event) = run.next_event().await {
            events.push(event);
        }
        let report = run.outcome().await.unwrap();

        assert_eq!(report.ticker, "NVDA");
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::Milestone {
                percent: 100,
                label: String::new()
            })
        );
    }

    mock! {
        Llm {}

        #[async_trait]
        impl LLMProvider for Llm {
            async fn complete(&self, request: CompletionRequest) -> research_llm::Result<CompletionResponse>;
            fn name(&self) -> &str;
        }
    }

    #[tokio::test]
    async fn test_llm_executor_applies_task_and_bounds() {
        let mut llm = MockLlm::new();
        llm.expect_name().return_const("mock-llm".to_string());
        llm.expect_complete()
            .times(1)
            .withf(|req| {
                req.model == "gpt-4o-mini"
                    && req.max_tokens <= 4096
                    && req
                        .system
                        .as_deref()
                        .is_some_and(|s| s.starts_with("You are a Financial Research Specialist."))
                    && req
                        .tools
                        .as_ref()
                        .is_some_and(|tools| tools.iter().any(|t| t.name == "web_search"))
            })
            .returning(|_| {
                Ok(CompletionResponse {
                    message: Message::assistant("## Company Overview\nApple makes phones."),
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage {
                        input_tokens: 900,
                        output_tokens: 120,
                    },
                })
            });

        let config = config_with_keys();
        let executor = LlmResearchExecutor::new(Arc::new(llm), &config);
        let spec = ResearchTaskSpec::build("AAPL", config.bounds).unwrap();
        let registry = (mock_search())(&config)
            .map(|p| ToolRegistry::with_tools([Arc::new(WebSearchTool::new(p, 10)) as Arc<dyn Tool>]))
            .unwrap();

        let text = executor
            .execute(&spec, Arc::new(registry), Arc::new(RunEventLog::default()))
            .await
            .unwrap();
        assert_eq!(text, "## Company Overview\nApple makes phones.");
    }

    #[test]
    fn test_from_config_requires_llm_key() {
        let config = ResearchConfig::builder().search_api_key("serper-test").build().unwrap();
        assert!(matches!(
            LlmResearchExecutor::from_config(&config),
            Err(ConfigError::MissingCredentials(vars)) if vars == vec!["OPENAI_API_KEY"]
        ));

        let executor = LlmResearchExecutor::from_config(&config_with_keys()).unwrap();
        assert_eq!(executor.model(), "gpt-4o-mini");
    }
}
