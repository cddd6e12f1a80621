use bson::{Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{Collection, Database, options::ReturnDocument};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("BSON deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),
}

pub type DaoResult<T> = Result<T, DaoError>;

/// Raw `?page=&limit=` query. Values stay strings so that garbage input falls
/// back to defaults instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PaginationParams {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: Some(page.to_string()),
            limit: Some(limit.to_string()),
        }
    }

    /// Returns `(page, per_page)`, both at least 1. Missing, non-numeric or
    /// zero values fall back to `1` and `default_limit`; `per_page` is capped
    /// at `max_limit`.
    pub fn resolve(&self, default_limit: u64, max_limit: u64) -> (u64, u64) {
        let page = parse_positive(self.page.as_deref()).unwrap_or(1);
        let per_page = parse_positive(self.limit.as_deref())
            .unwrap_or(default_limit)
            .min(max_limit.max(1));
        (page, per_page)
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|v| *v >= 1)
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        Self {
            items,
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page.max(1)),
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// The server rejects skips above `i64::MAX`.
fn driver_skip(skip: u64) -> u64 {
    skip.min(i64::MAX as u64)
}

/// Thin typed wrapper over a MongoDB collection.
pub struct BaseDao<T: Send + Sync> {
    collection: Collection<T>,
}

impl<T> BaseDao<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    pub fn new(db: &Database, name: &str) -> Self {
        Self {
            collection: db.collection::<T>(name),
        }
    }

    pub async fn insert_one(&self, item: &T) -> DaoResult<()> {
        self.collection.insert_one(item).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<Option<T>> {
        self.find_one(doc! { "_id": id }).await
    }

    pub async fn find_one(&self, filter: Document) -> DaoResult<Option<T>> {
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
        skip: u64,
        limit: Option<i64>,
    ) -> DaoResult<Vec<T>> {
        let mut find = self.collection.find(filter).skip(driver_skip(skip));
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let cursor = find.await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn count(&self, filter: Document) -> DaoResult<u64> {
        Ok(self.collection.count_documents(filter).await?)
    }

    /// Applies `update` and returns the document as it is afterwards, or
    /// `None` if nothing matched.
    pub async fn update_by_id_returning(
        &self,
        id: ObjectId,
        update: Document,
    ) -> DaoResult<Option<T>> {
        Ok(self
            .collection
            .find_one_and_update(doc! { "_id": id }, update)
            .return_document(ReturnDocument::After)
            .await?)
    }

    pub async fn delete_by_id(&self, id: ObjectId) -> DaoResult<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn delete_many(&self, filter: Document) -> DaoResult<u64> {
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }
}
