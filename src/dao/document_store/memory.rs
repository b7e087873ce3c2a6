use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DocumentStore, Filter, Query, SortOrder, document_id};
use crate::dao::storage::{StorageError, StorageResult};

/// Process-local store used for tests and `STORAGE_BACKEND=memory`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<&'static str, MemoryCollection>>>,
}

#[derive(Default)]
struct MemoryCollection {
    docs: IndexMap<String, Value>,
    unique: Vec<&'static [&'static str]>,
}

impl MemoryCollection {
    /// Report the first unique group `doc` would collide with, ignoring `doc` itself.
    fn violated_group(&self, doc: &Value) -> Option<&'static [&'static str]> {
        let own_id = document_id(doc);
        self.unique.iter().copied().find(|fields| {
            let Some(key) = unique_key(doc, fields) else {
                return false;
            };
            self.docs.values().any(|other| {
                document_id(other) != own_id && unique_key(other, fields).as_ref() == Some(&key)
            })
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unique_key(doc: &Value, fields: &[&str]) -> Option<Vec<Value>> {
    fields
        .iter()
        .map(|field| match doc.get(*field) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        })
        .collect()
}

fn missing_id() -> StorageError {
    StorageError::unavailable(
        "document has no string `id`".into(),
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing id"),
    )
}

impl DocumentStore for MemoryStore {
    fn insert(&self, collection: &'static str, doc: Value) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let id = document_id(&doc).ok_or_else(missing_id)?.to_owned();
            let mut guard = inner.write().await;
            let coll = guard.entry(collection).or_default();
            if coll.docs.contains_key(&id) {
                return Err(StorageError::conflict(collection, format!("id {id}")));
            }
            if let Some(fields) = coll.violated_group(&doc) {
                return Err(StorageError::conflict(collection, fields.join(",")));
            }
            coll.docs.insert(id, doc);
            Ok(())
        })
    }

    fn replace(
        &self,
        collection: &'static str,
        doc: Value,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let id = document_id(&doc).ok_or_else(missing_id)?.to_owned();
            let mut guard = inner.write().await;
            let coll = guard.entry(collection).or_default();
            if !coll.docs.contains_key(&id) {
                return Ok(false);
            }
            if let Some(fields) = coll.violated_group(&doc) {
                return Err(StorageError::conflict(collection, fields.join(",")));
            }
            coll.docs.insert(id, doc);
            Ok(true)
        })
    }

    fn find_by_id(
        &self,
        collection: &'static str,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(guard
                .get(collection)
                .and_then(|coll| coll.docs.get(&id.to_string()).cloned()))
        })
    }

    fn find(
        &self,
        collection: &'static str,
        query: Query,
    ) -> BoxFuture<'static, StorageResult<Vec<Value>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            let Some(coll) = guard.get(collection) else {
                return Ok(Vec::new());
            };
            let mut matched: Vec<Value> = coll
                .docs
                .values()
                .filter(|doc| matches(&query.filter, doc))
                .cloned()
                .collect();
            drop(guard);

            if !query.sort.is_empty() {
                matched.sort_by(|a, b| {
                    query
                        .sort
                        .iter()
                        .map(|(field, order)| {
                            let ord = compare_field(a.get(field), b.get(field));
                            match order {
                                SortOrder::Asc => ord,
                                SortOrder::Desc => ord.reverse(),
                            }
                        })
                        .find(|ord| *ord != Ordering::Equal)
                        .unwrap_or(Ordering::Equal)
                });
            }

            let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
            let limit = query
                .limit
                .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
                .unwrap_or(usize::MAX);
            Ok(matched.into_iter().skip(skip).take(limit).collect())
        })
    }

    fn count(&self, collection: &'static str, filter: Filter) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(guard.get(collection).map_or(0, |coll| {
                coll.docs.values().filter(|doc| matches(&filter, doc)).count() as u64
            }))
        })
    }

    fn delete(&self, collection: &'static str, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            Ok(guard
                .get_mut(collection)
                .is_some_and(|coll| coll.docs.shift_remove(&id.to_string()).is_some()))
        })
    }

    fn delete_many(
        &self,
        collection: &'static str,
        filter: Filter,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let Some(coll) = guard.get_mut(collection) else {
                return Ok(0);
            };
            let before = coll.docs.len();
            coll.docs.retain(|_, doc| !matches(&filter, doc));
            Ok((before - coll.docs.len()) as u64)
        })
    }

    fn ensure_unique(
        &self,
        collection: &'static str,
        fields: &'static [&'static str],
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            let coll = guard.entry(collection).or_default();
            if !coll.unique.contains(&fields) {
                coll.unique.push(fields);
            }
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Evaluate `filter` against a JSON document.
pub(crate) fn matches(filter: &Filter, doc: &Value) -> bool {
    match filter {
        Filter::All => true,
        Filter::Eq(field, expected) => field_equals(doc.get(field), expected),
        Filter::Ne(field, expected) => !field_equals(doc.get(field), expected),
        Filter::In(field, options) => options
            .iter()
            .any(|expected| field_equals(doc.get(field), expected)),
        Filter::Gt(field, bound) => compare_present(doc.get(field), bound) == Some(Ordering::Greater),
        Filter::Gte(field, bound) => matches!(
            compare_present(doc.get(field), bound),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Filter::Lt(field, bound) => compare_present(doc.get(field), bound) == Some(Ordering::Less),
        Filter::Lte(field, bound) => matches!(
            compare_present(doc.get(field), bound),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Filter::Contains { fields, needle } => {
            let needle = needle.to_lowercase();
            fields.iter().any(|field| match doc.get(field) {
                Some(Value::String(text)) => text.to_lowercase().contains(&needle),
                Some(Value::Array(items)) => items.iter().any(|item| {
                    item.as_str()
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                }),
                _ => false,
            })
        }
        Filter::And(filters) => filters.iter().all(|f| matches(f, doc)),
        Filter::Or(filters) => filters.iter().any(|f| matches(f, doc)),
    }
}

fn field_equals(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Array(items)), expected) if !expected.is_array() => {
            items.iter().any(|item| scalar_equals(item, expected))
        }
        (Some(actual), expected) => scalar_equals(actual, expected),
    }
}

fn scalar_equals(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_present(actual: Option<&Value>, bound: &Value) -> Option<Ordering> {
    match actual? {
        Value::Null => None,
        value => compare_values(value, bound),
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting: missing and null values sort first.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn unique_groups_reject_duplicates_but_allow_self_replace() {
        let store = MemoryStore::new();
        store.ensure_unique("users", &["email"]).await.unwrap();

        let id = Uuid::new_v4();
        store
            .insert("users", json!({"id": id.to_string(), "email": "a@x.io"}))
            .await
            .unwrap();
        let dup = store
            .insert("users", json!({"id": Uuid::new_v4().to_string(), "email": "a@x.io"}))
            .await;
        assert!(matches!(dup, Err(StorageError::Conflict { .. })));

        let replaced = store
            .replace("users", json!({"id": id.to_string(), "email": "a@x.io", "n": 1}))
            .await
            .unwrap();
        assert!(replaced);
    }

    #[tokio::test]
    async fn find_applies_filter_sort_and_paging() {
        let store = MemoryStore::new();
        for (n, tag) in [(3, "b"), (1, "a"), (2, "b"), (5, "b")] {
            store
                .insert(
                    "items",
                    json!({"id": Uuid::new_v4().to_string(), "n": n, "tags": [tag]}),
                )
                .await
                .unwrap();
        }

        let query = Query::new(Filter::eq("tags", "b").and(Filter::gt("n", 2)))
            .sort_desc("n")
            .limit(1);
        let found = store.find("items", query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["n"], 5);

        let total = store.count("items", Filter::eq("tags", "b")).await.unwrap();
        assert_eq!(total, 3);
    }

    #[test]
    fn contains_is_case_insensitive() {
        let doc = json!({"title": "Space Odyssey", "content": "none"});
        assert!(matches(&Filter::contains(&["title", "content"], "odys"), &doc));
        assert!(!matches(&Filter::contains(&["content"], "odys"), &doc));
    }
}
