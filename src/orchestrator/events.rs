//! 编排器事件
//!
//! 可选 event_tx：向 CLI / Web 等前端推送进度；发送失败一律忽略（fire-and-forget），
//! 绝不阻塞循环或收尾。

use tokio::sync::mpsc::UnboundedSender;

/// 运行期间对外可见的事件
#[derive(Clone, Debug)]
pub enum OrchestratorEvent {
    /// 人类可读的进度状态
    Status { text: String },
    /// 决策模型做出一次决策
    Decision {
        iteration: usize,
        action: String,
        reasoning: String,
    },
    /// 子智能体开始执行
    AgentStarted { label: String, agent: String },
    /// 子智能体执行完成且产物已入库
    AgentCompleted { label: String, agent: String },
    /// 产物被质量评审拒绝（未入库）
    QualityRejected { label: String, feedback: String },
    /// 最终报告装配完成
    Report { title: String, content: String },
    /// 迭代上限耗尽
    LimitReached { iterations: usize },
    /// 致命错误，运行无法继续
    Error { text: String },
}

pub type EventSender = UnboundedSender<OrchestratorEvent>;

pub(crate) fn send_event(tx: &Option<EventSender>, event: OrchestratorEvent) {
    if let Some(t) = tx {
        let _ = t.send(event);
    }
}
