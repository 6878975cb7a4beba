//! 子智能体执行器
//!
//! 运行一次子智能体调用直至完成，并决定产物是否入库：
//! 相关记忆注入 -> prompt 渲染 -> 工具绑定 -> 模型调用（ReAct 工具循环）->
//! search 引文捕获 -> 质量评审 -> 入库或丢弃。
//! 内部失败一律就地吸收：记日志 / 写 Reflection，绝不向分发器之外抛出。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::agents::{component_type_for, AgentDefinition};
use crate::llm::{LlmClient, Message};
use crate::memory::{ComponentType, ItemExtra, MemoryStore, SearchResultItem};
use crate::orchestrator::decision::{Reflection, ReflectionKind, ToolAbortion};
use crate::orchestrator::events::{send_event, EventSender, OrchestratorEvent};
use crate::orchestrator::parse::{parse_agent_reply, AgentReply};
use crate::orchestrator::reviewer::{QualityMode, QualityReviewer, QualityVerdict};
use crate::orchestrator::template::{render_template, system_instructions};
use crate::orchestrator::ToolGate;
use crate::tools::{MemoryReadTool, ToolExecutor, ToolHandle, ToolResolver, MEMORY_TOOL_ID};

/// 单次子智能体调用内最大 ReAct 步数，防止工具循环失控
const MAX_AGENT_STEPS: usize = 8;

/// 一次运行内子智能体执行所需的共享依赖（Arc 克隆后交给并行任务）
pub(crate) struct SubAgentRuntime {
    pub llm: Arc<dyn LlmClient>,
    pub store: Arc<MemoryStore>,
    pub resolver: ToolResolver,
    pub tool_executor: ToolExecutor,
    pub reviewer: QualityReviewer,
    pub quality_mode: QualityMode,
    pub gate: Option<Arc<dyn ToolGate>>,
    pub events: Option<EventSender>,
    pub reflections: Arc<Mutex<Vec<Reflection>>>,
    pub abortions: Arc<Mutex<Vec<ToolAbortion>>>,
}

/// 从参数对象中剥离 _relevantMemory 控制键，返回（干净参数, 记忆 id 列表）
fn split_relevant_memory(params: Value) -> (Value, Vec<String>) {
    match params {
        Value::Object(mut map) => {
            let ids = map
                .remove("_relevantMemory")
                .and_then(|v| v.as_array().cloned())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            (Value::Object(map), ids)
        }
        other => (other, Vec::new()),
    }
}

/// 交付物类型保留 markdown，过程性内容去 markdown
fn is_deliverable(component_type: Option<ComponentType>) -> bool {
    matches!(
        component_type,
        Some(
            ComponentType::Section
                | ComponentType::Title
                | ComponentType::ExecSummary
                | ComponentType::Conclusion
        )
    )
}

/// 从 search_internet 工具结果中捕获结构化引文（独立于最终文本）
fn capture_search_results(observation: &str, captured: &mut Vec<SearchResultItem>) {
    #[derive(serde::Deserialize)]
    struct Results {
        #[serde(default)]
        results: Vec<SearchResultItem>,
    }
    if let Ok(parsed) = serde_json::from_str::<Results>(observation) {
        captured.extend(parsed.results);
    }
}

impl SubAgentRuntime {
    fn push_reflection(&self, kind: ReflectionKind, message: String) {
        self.reflections
            .lock()
            .unwrap()
            .push(Reflection { kind, message });
    }

    /// 运行一个子智能体调用；所有失败路径都吸收为日志或 Reflection
    pub async fn run_agent(
        &self,
        partition: &str,
        agent: &AgentDefinition,
        params: Value,
        iteration: usize,
        label: &str,
    ) {
        let (clean_params, memory_ids) = split_relevant_memory(params);

        // 相关记忆注入：把早前产物拼进本次指令，避免重发整段对话
        let mut relevant_context = Vec::new();
        for id in &memory_ids {
            if let Some(item) = self.store.retrieve(partition, id).await {
                relevant_context.push(format!("{}:\n{}", item.title, item.body));
            }
        }
        let mut instructions = agent.instructions.clone();
        if !relevant_context.is_empty() {
            tracing::debug!(count = relevant_context.len(), "injecting relevant memory into agent context");
            instructions.push_str(&format!(
                "\n\n## Relevant Context from Memory:\n{}",
                relevant_context.join("\n\n---\n\n")
            ));
        }

        let component_type = component_type_for(&agent.name, &clean_params);
        let deliverable = is_deliverable(component_type);
        let system = system_instructions(&instructions, !deliverable);

        let Some(step) = agent.steps.first() else {
            tracing::error!(agent = %agent.name, "agent definition has no steps");
            return;
        };
        let prompt = render_template(&step.prompt, &clean_params);

        // 声明的工具 + 始终绑定的分区级记忆工具
        let mut tools: HashMap<String, ToolHandle> = self
            .resolver
            .resolve(&step.tools)
            .into_iter()
            .map(|h| (h.name().to_string(), h))
            .collect();
        tools.insert(
            MEMORY_TOOL_ID.to_string(),
            ToolHandle::Single(Arc::new(MemoryReadTool::new(self.store.clone(), partition))),
        );

        send_event(
            &self.events,
            OrchestratorEvent::AgentStarted {
                label: label.to_string(),
                agent: agent.name.clone(),
            },
        );
        tracing::info!(agent = %agent.name, label = %label, "executing agent");

        let mut messages = vec![Message::system(system), Message::user(prompt.clone())];
        let mut captured: Vec<SearchResultItem> = Vec::new();
        let mut output = String::new();

        for _ in 0..MAX_AGENT_STEPS {
            let reply = match self.llm.complete(&messages).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(agent = %agent.name, error = %e, "agent execution failed");
                    return;
                }
            };

            match parse_agent_reply(&reply) {
                AgentReply::Response(text) => {
                    output = text;
                    break;
                }
                AgentReply::ToolCall { tool, args } => {
                    if let Some(gate) = &self.gate {
                        if let Some(reason) = gate.review(&tool, &args).await {
                            tracing::warn!(tool = %tool, reason = %reason, "tool call denied by gate");
                            self.abortions.lock().unwrap().push(ToolAbortion {
                                tool: tool.clone(),
                                args: args.clone(),
                                reason: reason.clone(),
                            });
                            messages.push(Message::assistant(reply));
                            messages.push(Message::user(format!(
                                "Observation from {}: Tool execution denied: {}. Do not call this tool again.",
                                tool, reason
                            )));
                            continue;
                        }
                    }

                    let Some(handle) = tools.get(&tool) else {
                        messages.push(Message::assistant(reply));
                        messages.push(Message::user(format!(
                            "Observation: tool {} is not available to this agent",
                            tool
                        )));
                        continue;
                    };

                    let observation = match self.tool_executor.execute(handle, args).await {
                        Ok(r) => r,
                        Err(e) => format!("Error: {}", e),
                    };

                    if agent.name == "search" && tool == "search_internet" {
                        capture_search_results(&observation, &mut captured);
                    }

                    // 将工具调用与结果写回对话，供下一步使用
                    messages.push(Message::assistant(format!(
                        "Tool call: {} | Result: {}",
                        tool, observation
                    )));
                    messages.push(Message::user(format!(
                        "Observation from {}: {}",
                        tool, observation
                    )));
                }
            }
        }

        // 空输出视为调用失败：记日志，不入库，循环继续
        if output.trim().is_empty() {
            tracing::warn!(agent = %agent.name, label = %label, "agent produced no output");
            return;
        }

        let should_review = match self.quality_mode {
            QualityMode::All => true,
            QualityMode::Deliverable => deliverable,
            QualityMode::None => false,
        };

        if should_review {
            tracing::debug!(agent = %agent.name, mode = ?self.quality_mode, "evaluating output quality");
            match self.reviewer.evaluate(label, &prompt, &output).await {
                Ok(evaluation) => {
                    if evaluation.quality == QualityVerdict::Fail {
                        tracing::warn!(label = %label, feedback = %evaluation.feedback, "quality check failed");
                        self.push_reflection(
                            ReflectionKind::Failure,
                            format!(
                                "Action \"{}\" failed quality check: {}. Please retry with improvements.",
                                label, evaluation.feedback
                            ),
                        );
                        send_event(
                            &self.events,
                            OrchestratorEvent::QualityRejected {
                                label: label.to_string(),
                                feedback: evaluation.feedback,
                            },
                        );
                        // 不入库：主循环看不到新记忆项，由下一轮决策决定如何补救
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "quality evaluation failed, accepting output");
                }
            }
        }

        let params_summary =
            serde_json::to_string(&clean_params).unwrap_or_else(|_| "{}".to_string());
        let title = format!("#{}. {}: {}", iteration, agent.name, params_summary);
        let extra = ItemExtra {
            agent_name: Some(agent.name.clone()),
            component_type,
            section_number: clean_params
                .get("sectionNumber")
                .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))),
            search_results: if captured.is_empty() {
                None
            } else {
                Some(captured)
            },
        };
        let id = self.store.store(partition, title, output, extra).await;
        tracing::debug!(id = %id, agent = %agent.name, "stored agent output in memory");

        send_event(
            &self.events,
            OrchestratorEvent::AgentCompleted {
                label: label.to_string(),
                agent: agent.name.clone(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::agents::research_agents;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::{Tool, ToolRegistry};

    fn agent_def(name: &str) -> AgentDefinition {
        research_agents()
            .into_iter()
            .find(|a| a.name == name)
            .unwrap()
    }

    fn runtime(
        llm: Arc<dyn crate::llm::LlmClient>,
        quality_mode: QualityMode,
        store: Arc<MemoryStore>,
        registry: ToolRegistry,
    ) -> SubAgentRuntime {
        SubAgentRuntime {
            llm: llm.clone(),
            store,
            resolver: ToolResolver::new(Arc::new(registry)),
            tool_executor: ToolExecutor::default(),
            reviewer: QualityReviewer::new(llm),
            quality_mode,
            gate: None,
            events: None,
            reflections: Arc::new(Mutex::new(Vec::new())),
            abortions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 返回固定结果列表的本地搜索工具（测试用）
    struct FixedSearchTool;

    #[async_trait]
    impl Tool for FixedSearchTool {
        fn name(&self) -> &str {
            "search_internet"
        }

        fn description(&self) -> &str {
            "Fixed search results"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Ok(r#"{"results": [{"title": "Rust Book", "url": "https://doc.rust-lang.org/book/", "content": "The book"}]}"#.to_string())
        }
    }

    /// 拒绝一切调用的闸门（测试用）
    struct DenyAllGate;

    #[async_trait]
    impl ToolGate for DenyAllGate {
        async fn review(&self, _tool: &str, _args: &Value) -> Option<String> {
            Some("User denied".to_string())
        }
    }

    #[tokio::test]
    async fn test_quality_fail_blocks_store_and_records_reflection() {
        let store = Arc::new(MemoryStore::new());
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            "# 1. Intro\n\nWeak content.",
            r#"{"quality": "fail", "feedback": "Too shallow"}"#,
            "# 1. Intro\n\nStill weak.",
            r#"{"quality": "fail", "feedback": "Still too shallow"}"#,
        ]));
        let rt = runtime(llm, QualityMode::All, store.clone(), ToolRegistry::new());
        let agent = agent_def("writer");
        let params = serde_json::json!({"sectionNumber": 1, "sectionTitle": "Intro", "sectionObjective": "o", "keyLearnings": "k"});

        rt.run_agent("p", &agent, params.clone(), 1, "Write section").await;
        rt.run_agent("p", &agent, params, 2, "Write section").await;

        // 两次尝试都被拒：无任何入库，每次尝试各记一条 failure Reflection
        assert!(store.list_titles("p").await.is_empty());
        let reflections = rt.reflections.lock().unwrap();
        assert_eq!(reflections.len(), 2);
        assert!(reflections
            .iter()
            .all(|r| r.kind == ReflectionKind::Failure));
    }

    #[tokio::test]
    async fn test_quality_pass_stores_with_metadata() {
        let store = Arc::new(MemoryStore::new());
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            "# 2. Deep Dive\n\nSolid content.",
            r#"{"quality": "pass", "feedback": "Good"}"#,
        ]));
        let rt = runtime(llm, QualityMode::Deliverable, store.clone(), ToolRegistry::new());
        let agent = agent_def("writer");
        let params = serde_json::json!({"sectionNumber": 2, "sectionTitle": "Deep Dive", "sectionObjective": "o", "keyLearnings": "k"});

        rt.run_agent("p", &agent, params, 3, "Write section").await;

        let items = store.get_all("p").await;
        assert_eq!(items.len(), 1);
        let (_, item) = &items[0];
        assert!(item.title.starts_with("#3. writer:"));
        assert_eq!(item.extra.agent_name.as_deref(), Some("writer"));
        assert_eq!(item.extra.component_type, Some(ComponentType::Section));
        assert_eq!(item.extra.section_number, Some(2));
    }

    #[tokio::test]
    async fn test_search_agent_captures_citations_from_tool_results() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = ToolRegistry::new();
        registry.register(FixedSearchTool);
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            r#"{"tool": "search_internet", "args": {"query": "rust"}}"#,
            "Rust Book: The book (https://doc.rust-lang.org/book/)",
        ]));
        let rt = runtime(llm, QualityMode::None, store.clone(), registry);
        let agent = agent_def("search");

        rt.run_agent("p", &agent, serde_json::json!({"searchQuery": "rust"}), 1, "Search").await;

        let items = store.get_all("p").await;
        assert_eq!(items.len(), 1);
        let captured = items[0].1.extra.search_results.as_ref().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].url, "https://doc.rust-lang.org/book/");
    }

    #[tokio::test]
    async fn test_relevant_memory_injected_and_stripped() {
        let store = Arc::new(MemoryStore::new());
        let plan_id = store
            .store("p", "Plan", "Three sections planned", ItemExtra::default())
            .await;
        let llm = Arc::new(ScriptedLlmClient::new(vec!["Learnings extracted."]));
        let rt = runtime(llm, QualityMode::None, store.clone(), ToolRegistry::new());
        let agent = agent_def("analysis");
        let params = serde_json::json!({
            "sectionObjective": "o",
            "rawInformation": "raw",
            "_relevantMemory": [plan_id]
        });

        rt.run_agent("p", &agent, params, 1, "Analyze").await;

        let items = store.get_all("p").await;
        // 原 plan 条目 + 新 learnings 条目
        assert_eq!(items.len(), 2);
        let stored = &items[1].1;
        // 控制键已从参数摘要中剥离
        assert!(!stored.title.contains("_relevantMemory"));
    }

    #[tokio::test]
    async fn test_gate_denial_records_abortion() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = ToolRegistry::new();
        registry.register(FixedSearchTool);
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            r#"{"tool": "search_internet", "args": {"query": "rust"}}"#,
            "No results available.",
        ]));
        let mut rt = runtime(llm, QualityMode::None, store.clone(), registry);
        rt.gate = Some(Arc::new(DenyAllGate));
        let agent = agent_def("search");

        rt.run_agent("p", &agent, serde_json::json!({"searchQuery": "rust"}), 1, "Search").await;

        let abortions = rt.abortions.lock().unwrap();
        assert_eq!(abortions.len(), 1);
        assert_eq!(abortions[0].tool, "search_internet");
        assert_eq!(abortions[0].reason, "User denied");
        // 被拒后智能体的最终文本仍然入库
        drop(abortions);
        assert_eq!(store.get_all("p").await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_output_is_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let llm = Arc::new(ScriptedLlmClient::new(vec!["   "]));
        let rt = runtime(llm, QualityMode::None, store.clone(), ToolRegistry::new());
        let agent = agent_def("writer");

        rt.run_agent("p", &agent, serde_json::json!({}), 1, "Write").await;

        assert!(store.list_titles("p").await.is_empty());
    }

    #[test]
    fn test_split_relevant_memory() {
        let params = serde_json::json!({
            "searchQuery": "rust async",
            "_relevantMemory": ["id1", "id2"]
        });
        let (clean, ids) = split_relevant_memory(params);
        assert_eq!(ids, vec!["id1", "id2"]);
        assert!(clean.get("_relevantMemory").is_none());
        assert_eq!(clean["searchQuery"], "rust async");
    }

    #[test]
    fn test_split_relevant_memory_absent() {
        let (clean, ids) = split_relevant_memory(serde_json::json!({"q": 1}));
        assert!(ids.is_empty());
        assert_eq!(clean["q"], 1);
    }

    #[test]
    fn test_is_deliverable() {
        assert!(is_deliverable(Some(ComponentType::Section)));
        assert!(is_deliverable(Some(ComponentType::Title)));
        assert!(is_deliverable(Some(ComponentType::ExecSummary)));
        assert!(is_deliverable(Some(ComponentType::Conclusion)));
        assert!(!is_deliverable(Some(ComponentType::Plan)));
        assert!(!is_deliverable(Some(ComponentType::SearchResults)));
        assert!(!is_deliverable(None));
    }

    #[test]
    fn test_capture_search_results() {
        let mut captured = Vec::new();
        capture_search_results(
            r#"{"results": [{"title": "T", "url": "https://a", "content": "c"}]}"#,
            &mut captured,
        );
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].url, "https://a");

        // 非 JSON 工具输出不产生引文
        capture_search_results("plain text", &mut captured);
        assert_eq!(captured.len(), 1);
    }
}
