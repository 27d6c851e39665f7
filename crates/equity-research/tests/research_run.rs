//! End-to-end research runs against a scripted model and stub search backend

use async_trait::async_trait;
use equity_research::{
    ExecutionBounds, FailureKind, LlmResearchExecutor, ProgressEvent, ProgressSink, ReportSection,
    ResearchConfig, ResearchExecutor, ResearchOrchestrator, ResearchTaskSpec, SearchError,
    SearchFactory, SearchHit, SearchKind, SearchProvider,
};
use research_llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMError, LLMProvider, Message,
    MessageContent, Role, StopReason, TokenUsage,
};
use research_runtime::ExecutorEventHandler;
use research_tools::ToolRegistry;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TSLA_REPORT: &str = "\
# Tesla, Inc. (TSLA)

## Company Overview
Electric vehicles and energy storage.

## Recent News and Developments
Quarterly deliveries beat estimates.

## Competitors and Market Position
BYD and legacy automakers.

## Major Products and Services
Model 3, Model Y, Megapack.

## Strategic Initiatives
Autonomy and robotaxi programme.

## Financial Performance
Revenue growth slowed while margins compressed.

## Market Trends
EV price competition.

## Strengths and Potential Risks
Brand strength; execution and valuation risk.

## Summary of Key Investment Considerations
High growth with high volatility.
";

/// Model that replays canned replies and records what it was sent
struct ScriptedLlm {
    replies: Mutex<VecDeque<research_llm::Result<CompletionResponse>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<research_llm::Result<CompletionResponse>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> research_llm::Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::RequestFailed("no scripted reply left".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn answer(text: &str) -> research_llm::Result<CompletionResponse> {
    Ok(CompletionResponse {
        message: Message::assistant(text),
        stop_reason: StopReason::EndTurn,
        usage: TokenUsage {
            input_tokens: 2_000,
            output_tokens: 900,
        },
    })
}

fn search_call(query: &str) -> research_llm::Result<CompletionResponse> {
    Ok(CompletionResponse {
        message: Message {
            role: Role::Assistant,
            content: Some(MessageContent::Blocks(vec![ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: "web_search".to_string(),
                input: json!({ "query": query, "kind": "news" }),
            }])),
        },
        stop_reason: StopReason::ToolUse,
        usage: TokenUsage {
            input_tokens: 800,
            output_tokens: 40,
        },
    })
}

/// Search backend returning one fixed hit, or failing every call
struct StubSearch {
    fail: bool,
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str, _kind: SearchKind, _limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        if self.fail {
            return Err(SearchError::Quota("monthly credits used".to_string()));
        }
        Ok(vec![SearchHit {
            rank: 1,
            title: format!("{query}: deliveries beat estimates"),
            snippet: "Tesla delivered more vehicles than expected.".to_string(),
            source: "https://news.example.com/tsla".to_string(),
            date: Some("2 days ago".to_string()),
        }])
    }

    fn name(&self) -> &str {
        "stub"
    }
}

fn stub_search(fail: bool) -> SearchFactory {
    Arc::new(move |_config: &ResearchConfig| Ok(Arc::new(StubSearch { fail }) as Arc<dyn SearchProvider>))
}

fn config() -> ResearchConfig {
    ResearchConfig::builder()
        .search_api_key("serper-test")
        .llm_api_key("sk-test")
        .build()
        .unwrap()
}

fn recorder() -> (impl ProgressSink, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let sink = move |e: ProgressEvent| sink_events.lock().unwrap().push(e);
    (sink, events)
}

fn orchestrator(config: ResearchConfig, llm: Arc<ScriptedLlm>, search: SearchFactory) -> ResearchOrchestrator {
    let executor = LlmResearchExecutor::new(llm, &config);
    ResearchOrchestrator::with_search_factory(Arc::new(config), Arc::new(executor), search)
}

/// Executor that never finishes on its own
struct Stalled;

#[async_trait]
impl ResearchExecutor for Stalled {
    async fn execute(
        &self,
        _spec: &ResearchTaskSpec,
        _tools: Arc<ToolRegistry>,
        _observer: Arc<dyn ExecutorEventHandler>,
    ) -> research_core::Result<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late".to_string())
    }
}

/// Executor whose agent panics mid-run
struct Panicking;

#[async_trait]
impl ResearchExecutor for Panicking {
    async fn execute(
        &self,
        _spec: &ResearchTaskSpec,
        _tools: Arc<ToolRegistry>,
        _observer: Arc<dyn ExecutorEventHandler>,
    ) -> research_core::Result<String> {
        tokio::task::yield_now().await;
        panic!("tool output index out of range");
    }
}

#[tokio::test]
async fn test_successful_run_reports_exact_milestones() {
    let llm = ScriptedLlm::new(vec![search_call("TSLA latest news"), answer(TSLA_REPORT)]);
    let orchestrator = orchestrator(config(), llm.clone(), stub_search(false));
    let (sink, events) = recorder();

    let report = orchestrator.run("TSLA", &sink).await.unwrap();

    assert_eq!(report.text, TSLA_REPORT);
    assert_eq!(report.ticker, "TSLA");
    assert_eq!(report.tool_calls, 1);
    assert_eq!(report.tool_failures, 0);
    assert_eq!(llm.request_count(), 2);

    let coverage = &report.coverage;
    assert_eq!(coverage.present, ReportSection::ALL.to_vec());
    assert!(coverage.is_complete());

    let milestones: Vec<(u8, String)> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Milestone { percent, label } => Some((*percent, label.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        milestones,
        vec![
            (30, "Initializing research agent...".to_string()),
            (60, "Researching TSLA...".to_string()),
            (100, String::new()),
        ]
    );
}

#[tokio::test]
async fn test_missing_search_key_fails_before_executing() {
    let llm = ScriptedLlm::new(vec![answer(TSLA_REPORT)]);
    let config = ResearchConfig::builder().llm_api_key("sk-test").build().unwrap();
    let executor = LlmResearchExecutor::new(llm.clone(), &config);
    let orchestrator = ResearchOrchestrator::new(Arc::new(config), Arc::new(executor));
    let (sink, events) = recorder();

    let err = orchestrator.run("MSFT", &sink).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::ToolInit);
    assert_eq!(llm.request_count(), 0);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ProgressEvent::Failed { kind: FailureKind::ToolInit, .. }));
}

#[tokio::test]
async fn test_failure_after_tool_calls_is_an_execution_error() {
    let llm = ScriptedLlm::new(vec![
        search_call("TSLA earnings"),
        Err(LLMError::RequestFailed("upstream returned 502".to_string())),
    ]);
    let orchestrator = orchestrator(config(), llm.clone(), stub_search(true));
    let (sink, events) = recorder();

    let err = orchestrator.run("TSLA", &sink).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Execution);
    assert!(!err.message.is_empty());
    assert!(err.message.contains("upstream returned 502"));
    assert_eq!(llm.request_count(), 2);

    let events = events.lock().unwrap();
    assert!(matches!(events.last(), Some(ProgressEvent::Failed { kind: FailureKind::Execution, .. })));
    assert!(events.iter().all(|e| e.percent() != Some(100)));
}

#[tokio::test]
async fn test_iteration_bound_forces_final_answer() {
    let llm = ScriptedLlm::new(vec![search_call("TSLA"), search_call("TSLA again"), answer(TSLA_REPORT)]);
    let config = ResearchConfig::builder()
        .search_api_key("serper-test")
        .llm_api_key("sk-test")
        .max_iterations(3)
        .build()
        .unwrap();
    let orchestrator = orchestrator(config, llm.clone(), stub_search(false));

    let report = orchestrator.run("TSLA", &equity_research::NoProgress).await.unwrap();

    assert_eq!(report.tool_calls, 2);
    let requests = llm.requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    assert!(requests[2].tools.as_ref().is_none_or(Vec::is_empty));
}

#[tokio::test]
async fn test_token_budget_exhaustion_fails_the_run() {
    let llm = ScriptedLlm::new(vec![search_call("TSLA"), answer(TSLA_REPORT)]);
    let config = ResearchConfig::builder()
        .search_api_key("serper-test")
        .llm_api_key("sk-test")
        .max_token_limit(800)
        .build()
        .unwrap();
    let orchestrator = orchestrator(config, llm.clone(), stub_search(false));

    let err = orchestrator.run("TSLA", &equity_research::NoProgress).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Execution);
    assert!(err.message.contains("Token budget exhausted"));
    assert_eq!(llm.request_count(), 1);
}

#[tokio::test]
async fn test_cancellation_during_execution() {
    let orchestrator = ResearchOrchestrator::with_search_factory(
        Arc::new(config()),
        Arc::new(Stalled),
        stub_search(false),
    );
    let cancel = CancellationToken::new();
    let mut run = orchestrator.run_streaming("AAPL", cancel.clone());

    let mut events = Vec::new();
    while let Some(event) = run.next_event().await {
        if event.percent() == Some(60) {
            cancel.cancel();
        }
        events.push(event);
    }
    let err = run.outcome().await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Cancelled);
    assert!(matches!(events.last(), Some(ProgressEvent::Failed { kind: FailureKind::Cancelled, .. })));
}

#[tokio::test]
async fn test_deadline_expiry_times_out() {
    let config = ResearchConfig::builder()
        .search_api_key("serper-test")
        .llm_api_key("sk-test")
        .run_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let orchestrator =
        ResearchOrchestrator::with_search_factory(Arc::new(config), Arc::new(Stalled), stub_search(false));
    let (sink, events) = recorder();

    let err = orchestrator.run("AAPL", &sink).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::TimedOut);
    assert!(events.lock().unwrap().last().is_some_and(ProgressEvent::is_terminal));
}

#[tokio::test]
async fn test_agent_panic_ends_with_failure_event() {
    let orchestrator =
        ResearchOrchestrator::with_search_factory(Arc::new(config()), Arc::new(Panicking), stub_search(false));
    let mut run = orchestrator.run_streaming("AAPL", CancellationToken::new());

    let mut events = Vec::new();
    while let Some(event) = run.next_event().await {
        events.push(event);
    }
    let err = run.outcome().await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Execution);
    assert!(err.message.contains("tool output index out of range"));
    assert!(matches!(events.last(), Some(ProgressEvent::Failed { kind: FailureKind::Execution, .. })));
    assert!(events.iter().all(|e| e.percent() != Some(100)));

    let (sink, recorded) = recorder();
    let err = orchestrator.run("AAPL", &sink).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Execution);
    assert!(recorded.lock().unwrap().last().is_some_and(ProgressEvent::is_terminal));
}

#[test]
fn test_task_carries_configured_bounds() {
    let bounds = ExecutionBounds {
        max_iterations: 5,
        max_token_limit: 30_000,
    };
    let spec = ResearchTaskSpec::build("amd", bounds).unwrap();
    assert_eq!(spec.ticker, "AMD");
    assert_eq!(spec.bounds, bounds);
}
