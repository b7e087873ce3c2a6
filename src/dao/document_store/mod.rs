//! Backend-agnostic document persistence used by every domain service.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{marker::PhantomData, sync::Arc};

use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::storage::{StorageError, StorageResult};

/// Sort direction applied to a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Predicate evaluated against stored documents.
///
/// Field names address top-level document keys. `Eq` against an array field
/// matches when any element equals the value, mirroring MongoDB semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    /// Case-insensitive substring match over any of the listed string fields.
    Contains { fields: Vec<String>, needle: String },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_owned(), value.into())
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Filter::Ne(field.to_owned(), value.into())
    }

    /// Equality against a UUID reference field.
    pub fn id(field: &str, id: Uuid) -> Self {
        Filter::Eq(field.to_owned(), Value::String(id.to_string()))
    }

    pub fn any_of<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(field.to_owned(), values.into_iter().map(Into::into).collect())
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Filter::Gt(field.to_owned(), value.into())
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Filter::Gte(field.to_owned(), value.into())
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Filter::Lt(field.to_owned(), value.into())
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Filter::Lte(field.to_owned(), value.into())
    }

    pub fn contains(fields: &[&str], needle: &str) -> Self {
        Filter::Contains {
            fields: fields.iter().map(|f| (*f).to_owned()).collect(),
            needle: needle.to_owned(),
        }
    }

    /// Combine with another predicate, flattening nested conjunctions.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, other) => other,
            (this, Filter::All) => this,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), other) => {
                left.push(other);
                Filter::And(left)
            }
            (this, other) => Filter::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut branches) => {
                branches.push(other);
                Filter::Or(branches)
            }
            this => Filter::Or(vec![this, other]),
        }
    }
}

/// Filter plus ordering and paging applied by [`DocumentStore::find`].
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub sort: Vec<(String, SortOrder)>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            sort: Vec::new(),
            skip: 0,
            limit: None,
        }
    }

    pub fn all() -> Self {
        Self::new(Filter::All)
    }

    pub fn sort_asc(mut self, field: &str) -> Self {
        self.sort.push((field.to_owned(), SortOrder::Asc));
        self
    }

    pub fn sort_desc(mut self, field: &str) -> Self {
        self.sort.push((field.to_owned(), SortOrder::Desc));
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Abstraction over the persistence layer, storing JSON documents keyed by `id`.
pub trait DocumentStore: Send + Sync {
    /// Insert a new document; fails with [`StorageError::Conflict`] on duplicate keys.
    fn insert(&self, collection: &'static str, doc: Value) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace the document sharing the same `id`, returning whether it existed.
    fn replace(&self, collection: &'static str, doc: Value)
    -> BoxFuture<'static, StorageResult<bool>>;
    fn find_by_id(
        &self,
        collection: &'static str,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Value>>>;
    fn find(&self, collection: &'static str, query: Query)
    -> BoxFuture<'static, StorageResult<Vec<Value>>>;
    fn count(&self, collection: &'static str, filter: Filter)
    -> BoxFuture<'static, StorageResult<u64>>;
    fn delete(&self, collection: &'static str, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn delete_many(
        &self,
        collection: &'static str,
        filter: Filter,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    /// Declare a group of fields whose combined values must be unique.
    fn ensure_unique(
        &self,
        collection: &'static str,
        fields: &'static [&'static str],
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Typed record persisted in its own collection.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: &'static str;
    /// Field groups that must be unique across the collection.
    const UNIQUE_KEYS: &'static [&'static [&'static str]] = &[];

    fn id(&self) -> Uuid;
}

/// Create the unique indexes declared by `T`.
pub async fn ensure_entity_indexes<T: Entity>(store: &dyn DocumentStore) -> StorageResult<()> {
    for fields in T::UNIQUE_KEYS {
        store.ensure_unique(T::COLLECTION, fields).await?;
    }
    Ok(())
}

/// Typed view over one collection of a [`DocumentStore`].
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub async fn insert(&self, entity: &T) -> StorageResult<()> {
        let doc = encode(entity)?;
        self.store.insert(T::COLLECTION, doc).await
    }

    /// Persist an updated entity, returning whether it was still present.
    pub async fn replace(&self, entity: &T) -> StorageResult<bool> {
        let doc = encode(entity)?;
        self.store.replace(T::COLLECTION, doc).await
    }

    pub async fn get(&self, id: Uuid) -> StorageResult<Option<T>> {
        self.store
            .find_by_id(T::COLLECTION, id)
            .await?
            .map(decode::<T>)
            .transpose()
    }

    pub async fn find(&self, query: Query) -> StorageResult<Vec<T>> {
        self.store
            .find(T::COLLECTION, query)
            .await?
            .into_iter()
            .map(decode::<T>)
            .collect()
    }

    pub async fn find_all(&self, filter: Filter) -> StorageResult<Vec<T>> {
        self.find(Query::new(filter)).await
    }

    pub async fn find_one(&self, filter: Filter) -> StorageResult<Option<T>> {
        Ok(self
            .find(Query::new(filter).limit(1))
            .await?
            .into_iter()
            .next())
    }

    pub async fn count(&self, filter: Filter) -> StorageResult<u64> {
        self.store.count(T::COLLECTION, filter).await
    }

    pub async fn delete(&self, id: Uuid) -> StorageResult<bool> {
        self.store.delete(T::COLLECTION, id).await
    }

    pub async fn delete_many(&self, filter: Filter) -> StorageResult<u64> {
        self.store.delete_many(T::COLLECTION, filter).await
    }
}

fn encode<T: Entity>(entity: &T) -> StorageResult<Value> {
    serde_json::to_value(entity).map_err(|source| StorageError::Malformed {
        collection: T::COLLECTION.to_owned(),
        source,
    })
}

fn decode<T: Entity>(doc: Value) -> StorageResult<T> {
    serde_json::from_value(doc).map_err(|source| StorageError::Malformed {
        collection: T::COLLECTION.to_owned(),
        source,
    })
}

/// Read the `id` key of a raw document.
pub(crate) fn document_id(doc: &Value) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}
