//! Hive - Rust 深度研究多智能体编排器
//!
//! 模块划分：
//! - **agents**: 子智能体目录（planning / search / analysis / writer / title / synthesis）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与运行结果
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 按分区隔离的运行期记忆存储
//! - **orchestrator**: 决策循环、子智能体执行、并行分发、质量评审、报告装配
//! - **tools**: 工具注册表、解析器、执行器与内置 Web 工具

pub mod agents;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod orchestrator;
pub mod tools;
