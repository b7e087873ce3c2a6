use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Bson, Document, doc},
    options::IndexOptions,
};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    convert::{filter_document, from_document, sort_document, to_bson},
    error::{MongoDaoError, MongoResult},
};
use crate::dao::{
    document_store::{DocumentStore, Filter, Query, document_id},
    storage::{StorageError, StorageResult},
};

/// [`DocumentStore`] backed by one MongoDB database; documents are keyed by `_id` = `id`.
#[derive(Clone)]
pub struct MongoDocumentStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn id_filter(id: &str) -> Document {
    doc! { "_id": id }
}

fn to_document(id: &str, value: &Value) -> Document {
    let mut document = match to_bson(value) {
        Bson::Document(document) => document,
        _ => Document::new(),
    };
    document.insert("_id", id);
    document
}

fn missing_id(collection: &'static str) -> StorageError {
    StorageError::unavailable(
        format!("document for `{collection}` has no string `id`"),
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing id"),
    )
}

impl MongoDocumentStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        Ok(Self { inner })
    }

    async fn collection(&self, name: &str) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<Document>(name)
    }

    async fn insert_document(&self, name: &'static str, value: Value) -> StorageResult<()> {
        let id = document_id(&value).ok_or_else(|| missing_id(name))?.to_owned();
        self.collection(name)
            .await
            .insert_one(to_document(&id, &value))
            .await
            .map_err(|source| MongoDaoError::write(name, source))?;
        Ok(())
    }

    async fn replace_document(&self, name: &'static str, value: Value) -> StorageResult<bool> {
        let id = document_id(&value).ok_or_else(|| missing_id(name))?.to_owned();
        let result = self
            .collection(name)
            .await
            .replace_one(id_filter(&id), to_document(&id, &value))
            .await
            .map_err(|source| MongoDaoError::write(name, source))?;
        Ok(result.matched_count > 0)
    }

    async fn find_document(&self, name: &'static str, id: Uuid) -> MongoResult<Option<Value>> {
        let found = self
            .collection(name)
            .await
            .find_one(id_filter(&id.to_string()))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: name,
                source,
            })?;
        Ok(found.map(from_document))
    }

    async fn find_documents(&self, name: &'static str, query: Query) -> MongoResult<Vec<Value>> {
        let collection = self.collection(name).await;
        let mut action = collection
            .find(filter_document(&query.filter))
            .skip(query.skip);
        if let Some(sort) = sort_document(&query.sort) {
            action = action.sort(sort);
        }
        if let Some(limit) = query.limit {
            action = action.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let documents: Vec<Document> = action
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: name,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: name,
                source,
            })?;

        Ok(documents.into_iter().map(from_document).collect())
    }

    async fn count_documents(&self, name: &'static str, filter: Filter) -> MongoResult<u64> {
        self.collection(name)
            .await
            .count_documents(filter_document(&filter))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: name,
                source,
            })
    }

    async fn delete_documents(&self, name: &'static str, filter: Document) -> MongoResult<u64> {
        let result = self
            .collection(name)
            .await
            .delete_many(filter)
            .await
            .map_err(|source| MongoDaoError::write(name, source))?;
        Ok(result.deleted_count)
    }

    async fn create_unique_index(
        &self,
        name: &'static str,
        fields: &'static [&'static str],
    ) -> MongoResult<()> {
        let mut keys = Document::new();
        for field in fields {
            keys.insert(*field, 1);
        }
        let index_name = format!("{}_unique_idx", fields.join("_"));
        let model = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .name(Some(index_name.clone()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        self.collection(name)
            .await
            .create_index(model)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: name,
                index: index_name,
                source,
            })?;
        Ok(())
    }
}

impl DocumentStore for MongoDocumentStore {
    fn insert(&self, collection: &'static str, doc: Value) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_document(collection, doc).await })
    }

    fn replace(
        &self,
        collection: &'static str,
        doc: Value,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.replace_document(collection, doc).await })
    }

    fn find_by_id(
        &self,
        collection: &'static str,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let store = self.clone();
        Box::pin(async move { store.find_document(collection, id).await.map_err(Into::into) })
    }

    fn find(
        &self,
        collection: &'static str,
        query: Query,
    ) -> BoxFuture<'static, StorageResult<Vec<Value>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_documents(collection, query)
                .await
                .map_err(Into::into)
        })
    }

    fn count(&self, collection: &'static str, filter: Filter) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .count_documents(collection, filter)
                .await
                .map_err(Into::into)
        })
    }

    fn delete(&self, collection: &'static str, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let deleted = store
                .delete_documents(collection, id_filter(&id.to_string()))
                .await?;
            Ok(deleted > 0)
        })
    }

    fn delete_many(
        &self,
        collection: &'static str,
        filter: Filter,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_documents(collection, filter_document(&filter))
                .await
                .map_err(Into::into)
        })
    }

    fn ensure_unique(
        &self,
        collection: &'static str,
        fields: &'static [&'static str],
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .create_unique_index(collection, fields)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if store.inner.ping().await.is_ok() {
                return Ok(());
            }
            store.inner.reconnect().await.map_err(Into::into)
        })
    }
}
