//! 工具箱：注册表、解析器、执行器与内置工具

pub mod executor;
pub mod memory_read;
pub mod registry;
pub mod resolver;
pub mod web;

pub use executor::ToolExecutor;
pub use memory_read::MemoryReadTool;
pub use registry::{MultiTool, Tool, ToolHandle, ToolRegistry};
pub use resolver::{ToolResolver, MEMORY_TOOL_ID};
pub use web::{ExtractWebpageTool, WebSearchTool};
