use std::time::Duration;

use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::Message;

/// Creates the message indexes. The TTL index lets MongoDB delete messages
/// on its own once `created_at` is older than `message_ttl`.
pub async fn ensure_indexes(
    db: &Database,
    message_ttl: Duration,
) -> Result<(), mongodb::error::Error> {
    create_indexes(db, Message::COLLECTION, message_indexes(message_ttl)).await?;

    info!("All indexes ensured");
    Ok(())
}

fn message_indexes(message_ttl: Duration) -> Vec<IndexModel> {
    vec![
        index_ttl(bson::doc! { "created_at": 1 }, message_ttl),
        index(bson::doc! { "created_at": -1, "_id": -1 }),
        index(bson::doc! { "author.user_id": 1 }),
    ]
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_ttl(keys: bson::Document, expire_after: Duration) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().expire_after(expire_after).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    let coll = db.collection::<bson::Document>(collection);
    match coll.create_indexes(indexes.clone()).await {
        Ok(_) => {
            info!(collection, "Indexes created");
            Ok(())
        }
        Err(e) => {
            // IndexOptionsConflict (85) shows up when the TTL changed between
            // deployments, IndexKeySpecsConflict (86) when a same-named index
            // has different options. Drop and rebuild in both cases.
            if let mongodb::error::ErrorKind::Command(ref cmd_err) = *e.kind {
                if cmd_err.code == 85 || cmd_err.code == 86 {
                    tracing::warn!(
                        collection,
                        code = cmd_err.code,
                        "Index conflict detected, dropping conflicting indexes and retrying"
                    );
                    coll.drop_indexes().await?;
                    coll.create_indexes(indexes).await?;
                    info!(collection, "Indexes recreated after conflict resolution");
                    return Ok(());
                }
            }
            Err(e)
        }
    }
}
