//! 分区化记忆存储
//!
//! store / retrieve / list_titles / get_all / clear；分区之间绝对隔离，存储本身不做任何跨分区查找。
//! id 为 8 位随机 token，分区内唯一，冲突时重新生成而非报错；写入后条目不再修改。
//! 编排器在构造时持有显式的 `Arc<MemoryStore>` 实例，不使用进程级单例。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// 搜索结果引文，由 search 子智能体在工具结果流中捕获
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// 记忆项在最终报告中的语义角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Plan,
    SearchResults,
    Learnings,
    Section,
    Title,
    ExecSummary,
    Conclusion,
}

/// 记忆项元数据：生产者、语义角色、章节序号、捕获的引文
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ItemExtra {
    pub agent_name: Option<String>,
    pub component_type: Option<ComponentType>,
    pub section_number: Option<i64>,
    pub search_results: Option<Vec<SearchResultItem>>,
}

/// 记忆项：标题 + 正文 + 元数据
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreItem {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub extra: ItemExtra,
}

/// 标题索引条目，供决策上下文使用
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TitleEntry {
    pub id: String,
    pub title: String,
}

#[derive(Default)]
struct Partition {
    items: HashMap<String, StoreItem>,
    /// 写入顺序；list_titles / get_all 按此返回，保证测试可确定性
    order: Vec<String>,
}

/// 分区化记忆存储：每次运行一个分区，运行结束整体清除
#[derive(Default)]
pub struct MemoryStore {
    partitions: RwLock<HashMap<String, Partition>>,
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一条记忆并返回生成的 id
    pub async fn store(
        &self,
        partition: &str,
        title: impl Into<String>,
        body: impl Into<String>,
        extra: ItemExtra,
    ) -> String {
        let title = title.into();
        let body = body.into();
        let mut partitions = self.partitions.write().await;
        let part = partitions.entry(partition.to_string()).or_default();
        let id = loop {
            let candidate = short_id();
            if !part.items.contains_key(&candidate) {
                break candidate;
            }
        };
        tracing::debug!(partition = %partition, id = %id, title = %title, "memory store");
        part.items.insert(id.clone(), StoreItem { title, body, extra });
        part.order.push(id.clone());
        id
    }

    /// 按 id 取回；未知 id 返回 None，不报错
    pub async fn retrieve(&self, partition: &str, id: &str) -> Option<StoreItem> {
        let partitions = self.partitions.read().await;
        partitions.get(partition).and_then(|p| p.items.get(id).cloned())
    }

    /// 分区内全部条目的标题索引（写入顺序）
    pub async fn list_titles(&self, partition: &str) -> Vec<TitleEntry> {
        let partitions = self.partitions.read().await;
        let Some(part) = partitions.get(partition) else {
            return Vec::new();
        };
        part.order
            .iter()
            .filter_map(|id| {
                part.items.get(id).map(|item| TitleEntry {
                    id: id.clone(),
                    title: item.title.clone(),
                })
            })
            .collect()
    }

    /// 分区内全部条目（id → item，写入顺序）
    pub async fn get_all(&self, partition: &str) -> Vec<(String, StoreItem)> {
        let partitions = self.partitions.read().await;
        let Some(part) = partitions.get(partition) else {
            return Vec::new();
        };
        part.order
            .iter()
            .filter_map(|id| part.items.get(id).map(|item| (id.clone(), item.clone())))
            .collect()
    }

    /// 整体清除分区；幂等，分区不存在时无操作
    pub async fn clear(&self, partition: &str) {
        let mut partitions = self.partitions.write().await;
        partitions.remove(partition);
    }

    /// 当前存在的分区数（调试与泄漏检查用）
    pub async fn partition_count(&self) -> usize {
        self.partitions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let store = MemoryStore::new();
        let id = store.store("p1", "Title", "Body", ItemExtra::default()).await;
        let item = store.retrieve("p1", &id).await.unwrap();
        assert_eq!(item.title, "Title");
        assert_eq!(item.body, "Body");
    }

    #[tokio::test]
    async fn test_unknown_id_is_none() {
        let store = MemoryStore::new();
        assert!(store.retrieve("p1", "nope").await.is_none());
    }

    #[tokio::test]
    async fn test_partition_isolation() {
        let store = MemoryStore::new();
        let id = store.store("a", "In A", "body", ItemExtra::default()).await;
        assert!(store.retrieve("b", &id).await.is_none());
        assert!(store.list_titles("b").await.is_empty());
        assert_eq!(store.list_titles("a").await.len(), 1);
    }

    #[tokio::test]
    async fn test_ids_unique_under_concurrency() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.store("p", format!("t{}", i), "b", ItemExtra::default()).await
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        let unique: std::collections::HashSet<_> = ids.iter().cloned().collect();
        assert_eq!(unique.len(), 50);
        assert_eq!(store.list_titles("p").await.len(), 50);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = MemoryStore::new();
        store.store("p", "t", "b", ItemExtra::default()).await;
        store.clear("p").await;
        assert!(store.list_titles("p").await.is_empty());
        store.clear("p").await;
        store.clear("never-existed").await;
    }

    #[tokio::test]
    async fn test_list_titles_preserves_insertion_order() {
        let store = MemoryStore::new();
        store.store("p", "first", "b", ItemExtra::default()).await;
        store.store("p", "second", "b", ItemExtra::default()).await;
        store.store("p", "third", "b", ItemExtra::default()).await;
        let titles: Vec<String> = store
            .list_titles("p")
            .await
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }
}
