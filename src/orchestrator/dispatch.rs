//! 并行分发
//!
//! 将一个 Decision 展开的 N 组参数在并发上限内跑完：Semaphore 控制在途数量，
//! JoinSet 等待全部结束。任务内部失败已在执行器中吸收，这里不传播。
//! max_parallel=1 时退化为严格串行。

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::agents::AgentDefinition;
use crate::orchestrator::executor::SubAgentRuntime;

/// 分发一组参数集；全部任务（成功或失败）结束后返回
pub(crate) async fn dispatch(
    runtime: Arc<SubAgentRuntime>,
    partition: &str,
    agent: Arc<AgentDefinition>,
    params_list: Vec<Value>,
    base_label: &str,
    iteration: usize,
    max_parallel: usize,
) {
    let fan_out = params_list.len() > 1;
    if fan_out {
        tracing::info!(tasks = params_list.len(), "parallel execution");
    }

    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let mut join_set = JoinSet::new();

    for (idx, params) in params_list.into_iter().enumerate() {
        // fan-out 时每个任务的标签带序号，便于状态上报区分
        let label = if fan_out {
            format!("{} #{}", base_label, idx + 1)
        } else {
            base_label.to_string()
        };
        let runtime = runtime.clone();
        let agent = agent.clone();
        let partition = partition.to_string();
        let semaphore = semaphore.clone();

        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            runtime
                .run_agent(&partition, &agent, params, iteration + idx, &label)
                .await;
        });
    }

    while join_set.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures_util::stream;

    use super::*;
    use crate::agents::research_agents;
    use crate::llm::{LlmClient, Message};
    use crate::memory::MemoryStore;
    use crate::orchestrator::reviewer::{QualityMode, QualityReviewer};
    use crate::tools::{ToolExecutor, ToolRegistry, ToolResolver};

    /// 统计在途并发峰值的客户端：complete 期间计数加一，结束减一
    struct ConcurrencyProbe {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ConcurrencyProbe {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok("# Section\n\nGenerated content.".to_string())
        }

        async fn complete_stream(
            &self,
            _messages: &[Message],
        ) -> Result<
            Pin<Box<dyn futures_util::Stream<Item = Result<String, String>> + Send>>,
            String,
        > {
            let content = self.complete(&[]).await?;
            Ok(Box::pin(stream::iter(vec![Ok(content)])))
        }
    }

    fn runtime(llm: Arc<dyn LlmClient>) -> Arc<SubAgentRuntime> {
        Arc::new(SubAgentRuntime {
            llm: llm.clone(),
            store: Arc::new(MemoryStore::new()),
            resolver: ToolResolver::new(Arc::new(ToolRegistry::new())),
            tool_executor: ToolExecutor::default(),
            reviewer: QualityReviewer::new(llm),
            quality_mode: QualityMode::None,
            gate: None,
            events: None,
            reflections: Arc::new(Mutex::new(Vec::new())),
            abortions: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn writer_agent() -> Arc<crate::agents::AgentDefinition> {
        Arc::new(
            research_agents()
                .into_iter()
                .find(|a| a.name == "writer")
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_fan_out_respects_concurrency_cap() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let rt = runtime(probe.clone());
        let params: Vec<Value> = (1..=7)
            .map(|n| serde_json::json!({"sectionNumber": n, "sectionTitle": "T", "sectionObjective": "o", "keyLearnings": "k"}))
            .collect();

        dispatch(rt.clone(), "p", writer_agent(), params, "Write sections", 1, 3).await;

        // 全部 7 个任务完成，且任何时刻在途不超过 3
        assert_eq!(rt.store.list_titles("p").await.len(), 7);
        assert!(probe.peak.load(Ordering::SeqCst) <= 3);
        assert!(probe.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_max_parallel_one_is_sequential() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let rt = runtime(probe.clone());
        let params: Vec<Value> = (1..=4)
            .map(|n| serde_json::json!({"sectionNumber": n, "sectionTitle": "T", "sectionObjective": "o", "keyLearnings": "k"}))
            .collect();

        dispatch(rt.clone(), "p", writer_agent(), params, "Write sections", 1, 1).await;

        assert_eq!(rt.store.list_titles("p").await.len(), 4);
        assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fan_out_labels_carry_ordinal() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let rt = runtime(probe);
        let params: Vec<Value> = (1..=2)
            .map(|n| serde_json::json!({"sectionNumber": n, "sectionTitle": "T", "sectionObjective": "o", "keyLearnings": "k"}))
            .collect();

        dispatch(rt.clone(), "p", writer_agent(), params, "Write", 5, 2).await;

        // 标题中的迭代序号按任务序递增（#5、#6）
        let titles: Vec<String> = rt
            .store
            .list_titles("p")
            .await
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert!(titles.iter().any(|t| t.starts_with("#5. writer:")));
        assert!(titles.iter().any(|t| t.starts_with("#6. writer:")));
    }
}
