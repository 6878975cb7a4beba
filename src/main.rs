//! Hive CLI：读取研究主题，运行一次编排并输出报告
//!
//! 用法：`hive "<research topic>"`；LLM 后端由配置与环境变量选择
//! （DEEPSEEK_API_KEY / OPENAI_API_KEY，均无则使用 Mock）。

use std::sync::Arc;

use tokio::sync::mpsc;

use hive::config::{load_config, AppConfig};
use hive::core::RunOutcome;
use hive::llm::{openai::create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient};
use hive::memory::MemoryStore;
use hive::orchestrator::{Orchestrator, OrchestratorEvent, RunOptions};
use hive::tools::{ExtractWebpageTool, ToolRegistry, WebSearchTool};

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock）
fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        let model = cfg
            .llm
            .deepseek
            .model
            .clone()
            .or_else(|| Some(cfg.llm.model.clone()))
            .unwrap_or_else(|| "deepseek-chat".to_string());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(Some(&model)))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let base = cfg.llm.base_url.as_deref();
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            base,
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();

    let topic: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if topic.trim().is_empty() {
        anyhow::bail!("usage: hive \"<research topic>\"");
    }

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let llm = create_llm_from_config(&cfg);

    let mut registry = ToolRegistry::new();
    registry.register(WebSearchTool::new(
        &cfg.tools.search,
        cfg.orchestrator.max_search_results,
    ));
    registry.register(ExtractWebpageTool::new(&cfg.tools.search));

    let store = Arc::new(MemoryStore::new());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let orchestrator = Orchestrator::new(
        llm,
        store,
        Arc::new(registry),
        RunOptions::from_config(&cfg.orchestrator),
    )
    .with_tool_timeout(cfg.tools.tool_timeout_secs)
    .with_event_tx(event_tx);

    // 进度事件打到 stderr，最终报告打到 stdout
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                OrchestratorEvent::Status { text } => eprintln!("* {}", text),
                OrchestratorEvent::Decision { iteration, action, .. } => {
                    eprintln!("[{}] {}", iteration, action)
                }
                OrchestratorEvent::QualityRejected { label, feedback } => {
                    eprintln!("! quality rejected: {} ({})", label, feedback)
                }
                OrchestratorEvent::Error { text } => eprintln!("! {}", text),
                _ => {}
            }
        }
    });

    let result = orchestrator.run(&topic).await;
    drop(orchestrator);
    let _ = printer.await;

    match result.outcome {
        RunOutcome::Success | RunOutcome::LimitReached => {
            if let Some(message) = &result.delivery_message {
                eprintln!("* {}", message);
            }
            if result.outcome == RunOutcome::LimitReached {
                eprintln!(
                    "* Reached the iteration limit ({} iterations); delivering partial results.",
                    result.iterations
                );
            }
            if let Some(report) = &result.report {
                println!("{}", report.content);
            }
            Ok(())
        }
        RunOutcome::Stopped => {
            eprintln!("* Run was cancelled.");
            Ok(())
        }
        RunOutcome::Error => anyhow::bail!("research run failed"),
    }
}
