//! 运行期记忆：按分区隔离的临时存储，一次运行一个分区

pub mod store;

pub use store::{ComponentType, ItemExtra, MemoryStore, SearchResultItem, StoreItem, TitleEntry};
