//! 决策循环（主编排器）
//!
//! 每轮迭代：取消检查 -> 上下文装配（记忆索引 + 迭代历史 + 反思 + 已缓存计划）->
//! 决策调用 -> done 则装配报告，否则解析智能体并交给并行分发 -> 计划缓存 -> 下一轮。
//! 迭代严格串行，上限默认 30；到达上限按部分成功收尾并明确告知用户。
//! 取消只在迭代边界检查：已派发的 fan-out 不会被中断（已知且保留的间隙）。
//! 分区在任何退出路径（成功 / 错误 / 取消 / 上限）都会被清除。

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::agents::{decision_agent, research_agents, AgentCatalog, AgentDefinition};
use crate::config::OrchestratorSection;
use crate::core::{AgentError, RunOutcome};
use crate::llm::{LlmClient, Message};
use crate::memory::{ComponentType, ItemExtra, MemoryStore};
use crate::orchestrator::decision::{
    build_reflection_context, decision_schema_json, DecisionStatus, Reflection, ReflectionKind,
};
use crate::orchestrator::delivery::{assemble_report, ResearchReport};
use crate::orchestrator::dispatch::dispatch;
use crate::orchestrator::events::{send_event, EventSender, OrchestratorEvent};
use crate::orchestrator::executor::SubAgentRuntime;
use crate::orchestrator::parse::parse_decision;
use crate::orchestrator::reviewer::{QualityMode, QualityReviewer};
use crate::orchestrator::template::{render_pairs, system_instructions};
use crate::orchestrator::ToolGate;
use crate::tools::{ToolExecutor, ToolRegistry, ToolResolver};

/// 致命错误时追加给用户的固定文案
const CANNOT_CONTINUE_MESSAGE: &str = "I could not continue with the research request.";

const STATUS_UPDATE_INSTRUCTIONS: &str = r#"You are a status update generator, your task is to generate a status update for the user based on the following prompt.

The larger task is to create a comprehensive research report, so the status update should reflect the progress made so far.

The status update should be concise, informative, and provide a clear overview of the current state of the research.

Examples of status updates:
- "Let me analyze your request about quantum mechanics and create a research plan."
- "I am done with the planning phase, I will now start gathering information for the following sections: Quantum Entanglement, Quantum Computing, and Quantum Cryptography."
- "I have gathered information for the Quantum Entanglement section, I will now analyze it and extract key learnings."

Notice none of those examples exceed 2 sentences and include "Status Update:" or any dumb text like that."#;

/// 一次运行的参数
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// 决策循环迭代上限
    pub max_iterations: usize,
    /// fan-out 并发上限
    pub max_parallel_execution: usize,
    /// 质量评审模式
    pub quality_review: QualityMode,
    /// 报告目标章节数
    pub num_sections: usize,
    /// 每章节搜索查询数
    pub num_queries_per_section: usize,
    /// 每次查询最大搜索结果数
    pub max_search_results: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            max_parallel_execution: 3,
            quality_review: QualityMode::Deliverable,
            num_sections: 3,
            num_queries_per_section: 2,
            max_search_results: 8,
        }
    }
}

impl RunOptions {
    /// 从配置段构造；非法的 quality_review 字符串退回 deliverable
    pub fn from_config(section: &OrchestratorSection) -> Self {
        let quality_review = section.quality_review.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid quality_review in config, using deliverable");
            QualityMode::Deliverable
        });
        Self {
            max_iterations: section.max_iterations,
            max_parallel_execution: section.max_parallel_execution,
            quality_review,
            num_sections: section.num_sections,
            num_queries_per_section: section.num_queries_per_section,
            max_search_results: section.max_search_results,
        }
    }
}

/// 一次运行的汇总结果
#[derive(Clone, Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub report: Option<ResearchReport>,
    /// 决策模型随 done 给出的交付说明
    pub delivery_message: Option<String>,
    pub iterations: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

struct Completion {
    outcome: RunOutcome,
    report: Option<ResearchReport>,
    delivery_message: Option<String>,
}

/// 编排器：持有 LLM、记忆存储、智能体目录与工具解析器，驱动决策循环
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    quality_llm: Arc<dyn LlmClient>,
    store: Arc<MemoryStore>,
    catalog: AgentCatalog,
    resolver: ToolResolver,
    tool_executor: ToolExecutor,
    options: RunOptions,
    cancel_token: CancellationToken,
    events: Option<EventSender>,
    gate: Option<Arc<dyn ToolGate>>,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        store: Arc<MemoryStore>,
        registry: Arc<ToolRegistry>,
        options: RunOptions,
    ) -> Self {
        Self {
            quality_llm: llm.clone(),
            llm,
            store,
            catalog: AgentCatalog::new(research_agents()),
            resolver: ToolResolver::new(registry),
            tool_executor: ToolExecutor::default(),
            options,
            cancel_token: CancellationToken::new(),
            events: None,
            gate: None,
        }
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: EventSender) -> Self {
        self.events = Some(tx);
        self
    }

    /// 设置取消令牌（外部可在任意时刻触发，下一个迭代边界生效）
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// 设置工具闸门
    pub fn with_tool_gate(mut self, gate: Arc<dyn ToolGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// 质量评审使用独立的 LLM（避免自我认同）
    pub fn with_quality_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.quality_llm = llm;
        self
    }

    /// 覆盖单次工具调用超时
    pub fn with_tool_timeout(mut self, secs: u64) -> Self {
        self.tool_executor = ToolExecutor::new(secs);
        self
    }

    /// 覆盖智能体目录（默认内置研究智能体）
    pub fn with_catalog(mut self, definitions: Vec<AgentDefinition>) -> Self {
        self.catalog = AgentCatalog::new(definitions);
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// 执行一次完整的编排运行
    pub async fn run(&self, user_request: &str) -> RunReport {
        let started_at = Utc::now();
        let partition = uuid::Uuid::new_v4().to_string();
        tracing::info!(partition = %partition, "starting research run");

        let mut iterations = 0usize;
        let result = self.run_loop(&partition, user_request, &mut iterations).await;

        // finally 等价：任何退出路径都清分区，保证分区不跨运行泄漏
        self.store.clear(&partition).await;

        let completed_at = Utc::now();
        match result {
            Ok(completion) => RunReport {
                outcome: completion.outcome,
                report: completion.report,
                delivery_message: completion.delivery_message,
                iterations,
                started_at,
                completed_at,
            },
            Err(e) => {
                tracing::error!(error = %e, "research run failed");
                send_event(
                    &self.events,
                    OrchestratorEvent::Error {
                        text: CANNOT_CONTINUE_MESSAGE.to_string(),
                    },
                );
                RunReport {
                    outcome: RunOutcome::Error,
                    report: None,
                    delivery_message: None,
                    iterations,
                    started_at,
                    completed_at,
                }
            }
        }
    }

    async fn run_loop(
        &self,
        partition: &str,
        user_request: &str,
        iteration: &mut usize,
    ) -> Result<Completion, AgentError> {
        let decision_def = decision_agent();
        let reflections = Arc::new(Mutex::new(Vec::new()));
        let abortions = Arc::new(Mutex::new(Vec::new()));
        let runtime = Arc::new(SubAgentRuntime {
            llm: self.llm.clone(),
            store: self.store.clone(),
            resolver: self.resolver.clone(),
            tool_executor: self.tool_executor.clone(),
            reviewer: QualityReviewer::new(self.quality_llm.clone()),
            quality_mode: self.options.quality_review,
            gate: self.gate.clone(),
            events: self.events.clone(),
            reflections: reflections.clone(),
            abortions: abortions.clone(),
        });

        // 原始请求入库，供子智能体通过 _relevantMemory 按需取回
        let request_id = self
            .store
            .store(
                partition,
                "User Request (Full Details)",
                user_request,
                ItemExtra::default(),
            )
            .await;
        tracing::debug!(id = %request_id, "stored original request in memory");

        self.report_status("Let me start analyzing and working on your research request.")
            .await;

        let mut research_plan = String::new();
        let mut history: Vec<String> = Vec::new();

        while *iteration < self.options.max_iterations {
            if self.cancel_token.is_cancelled() {
                tracing::info!("run cancelled between iterations");
                return Ok(Completion {
                    outcome: RunOutcome::Stopped,
                    report: None,
                    delivery_message: None,
                });
            }

            *iteration += 1;
            tracing::info!(iteration = *iteration, "decision iteration");

            // 上下文装配
            let memory_list = self.store.list_titles(partition).await;
            let memory_text = if memory_list.is_empty() {
                "No work completed yet".to_string()
            } else {
                memory_list
                    .iter()
                    .map(|it| format!("- id: {}, title: \"{}\"", it.id, it.title))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            let history_text = if history.is_empty() {
                "No previous iterations yet (this is the first decision)".to_string()
            } else {
                history.join("\n")
            };
            let reflection_context = {
                let abortions = abortions.lock().unwrap();
                let reflections = reflections.lock().unwrap();
                build_reflection_context(&abortions, &reflections)
            };

            let system = system_instructions(
                &render_pairs(
                    &decision_def.instructions,
                    &[
                        ("agentsList", self.catalog.describe().as_str()),
                        ("numSections", self.options.num_sections.to_string().as_str()),
                        (
                            "numQueriesPerSection",
                            self.options.num_queries_per_section.to_string().as_str(),
                        ),
                        (
                            "maxSearchResults",
                            self.options.max_search_results.to_string().as_str(),
                        ),
                        ("decisionSchema", decision_schema_json().as_str()),
                    ],
                ),
                true,
            );
            let prompt = render_pairs(
                &decision_def.steps[0].prompt,
                &[
                    ("userRequest", user_request),
                    ("researchPlan", research_plan.as_str()),
                    ("iterationHistory", history_text.as_str()),
                    ("memoryList", memory_text.as_str()),
                    ("previousReflections", reflection_context.as_str()),
                ],
            );

            // 决策调用失败或回复不可解析是致命的，向上传播由 run 统一收尾
            let reply = self
                .llm
                .complete(&[Message::system(system), Message::user(prompt)])
                .await
                .map_err(AgentError::LlmError)?;
            let decision = parse_decision(&reply)?;
            tracing::info!(status = ?decision.status, action = %decision.action_label(), "decision");
            send_event(
                &self.events,
                OrchestratorEvent::Decision {
                    iteration: *iteration,
                    action: decision.action_label(),
                    reasoning: decision.reasoning.clone(),
                },
            );

            // 终止检查
            if decision.status == DecisionStatus::Done {
                tracing::info!(reasoning = %decision.reasoning, "decision loop complete");
                if let Some(message) = &decision.delivery_message {
                    send_event(
                        &self.events,
                        OrchestratorEvent::Status {
                            text: message.clone(),
                        },
                    );
                } else {
                    self.report_status("I have completed all tasks for your research request.")
                        .await;
                }
                let items = self.store.get_all(partition).await;
                let report = assemble_report(&items);
                send_event(
                    &self.events,
                    OrchestratorEvent::Report {
                        title: report.title.clone(),
                        content: report.content.clone(),
                    },
                );
                return Ok(Completion {
                    outcome: RunOutcome::Success,
                    report: Some(report),
                    delivery_message: decision.delivery_message.clone(),
                });
            }

            self.report_status(&format!(
                "Working on {}. Rationale: {}",
                decision.action_label(),
                decision.reasoning
            ))
            .await;

            // 派发
            let agent_name = decision.agent_name.clone().unwrap_or_default();
            match self.catalog.get(&agent_name) {
                None => {
                    tracing::error!(agent = %agent_name, "unknown agent requested");
                    reflections.lock().unwrap().push(Reflection {
                        kind: ReflectionKind::Failure,
                        message: format!(
                            "Unknown agent \"{}\" requested. Available agents: {}",
                            agent_name,
                            self.catalog.names().join(", ")
                        ),
                    });
                }
                Some(agent) => {
                    let params_list = decision.params_list();
                    let task_count = params_list.len();
                    let label = decision.action_label();
                    dispatch(
                        runtime.clone(),
                        partition,
                        agent,
                        params_list,
                        &label,
                        *iteration,
                        self.options.max_parallel_execution,
                    )
                    .await;
                    let task_label = if task_count > 1 {
                        format!("{} ({} tasks)", label, task_count)
                    } else {
                        label
                    };
                    self.report_status(&format!("Completed: {}", task_label)).await;
                }
            }

            history.push(format!(
                "#{}: {} (agent: {})",
                *iteration,
                decision.action_label(),
                agent_name
            ));

            // planning 首次运行后缓存研究计划，纳入后续所有决策上下文
            if agent_name == "planning" && research_plan.is_empty() {
                let items = self.store.get_all(partition).await;
                if let Some((_, plan)) = items
                    .iter()
                    .find(|(_, i)| i.extra.component_type == Some(ComponentType::Plan))
                {
                    research_plan = format!(
                        "\n\nRESEARCH PLAN (follow this structure):\n{}",
                        plan.body
                    );
                    tracing::debug!("research plan cached for subsequent decisions");
                }
            }
        }

        // 迭代上限：部分成功，明确告知用户，不算错误
        tracing::warn!(max = self.options.max_iterations, "maximum iterations reached");
        self.report_status("I have reached the maximum number of iterations. Delivering the work completed so far.")
            .await;
        send_event(
            &self.events,
            OrchestratorEvent::LimitReached {
                iterations: *iteration,
            },
        );
        let items = self.store.get_all(partition).await;
        let report = assemble_report(&items);
        send_event(
            &self.events,
            OrchestratorEvent::Report {
                title: report.title.clone(),
                content: report.content.clone(),
            },
        );
        Ok(Completion {
            outcome: RunOutcome::LimitReached,
            report: Some(report),
            delivery_message: None,
        })
    }

    /// 生成并上报一条状态：仅在接了事件通道时调用 LLM；生成失败退回原始文案。
    /// 上报是 fire-and-forget，绝不阻塞收尾。
    async fn report_status(&self, prompt: &str) {
        if self.events.is_none() || self.cancel_token.is_cancelled() {
            return;
        }
        let messages = [
            Message::system(STATUS_UPDATE_INSTRUCTIONS),
            Message::user(prompt.to_string()),
        ];
        let text = match self.llm.complete(&messages).await {
            Ok(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => prompt.to_string(),
        };
        send_event(&self.events, OrchestratorEvent::Status { text });
    }
}
