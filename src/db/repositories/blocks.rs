use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_u32},
};
use crate::models::{BlockId, BlockUpdate, NewBlock, PageRef, PersistedBlock, YBounds};
use crate::store::{DocumentStore, StoreError};

fn row_to_block(row: &Row) -> Result<PersistedBlock> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let min_y: Option<f64> = row.get("min_y")?;
    let max_y: Option<f64> = row.get("max_y")?;
    let indent_level: Option<i64> = row.get("indent_level")?;

    Ok(PersistedBlock {
        id: BlockId(row.get("id")?),
        text: row.get("content")?,
        canonical_key: row.get("canonical_key")?,
        bounds: match (min_y, max_y) {
            (Some(min_y), Some(max_y)) => Some(YBounds::new(min_y, max_y)),
            _ => None,
        },
        indent_level: indent_level
            .map(|level| to_u32(level, "indent_level"))
            .transpose()?,
        creation_order: row.get("seq")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

#[async_trait]
impl DocumentStore for Database {
    async fn list_blocks(&self, page: &PageRef) -> Result<Vec<PersistedBlock>, StoreError> {
        let page = page.clone();
        let blocks = self
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT seq, id, content, canonical_key, min_y, max_y, indent_level, created_at, updated_at
                     FROM blocks
                     WHERE book_id = ?1 AND page_number = ?2
                     ORDER BY seq ASC",
                )?;

                let mut rows = stmt.query(params![page.book_id, page.page])?;
                let mut blocks = Vec::new();
                while let Some(row) = rows.next()? {
                    blocks.push(row_to_block(row)?);
                }

                Ok(blocks)
            })
            .await?;
        Ok(blocks)
    }

    async fn create_block(&self, page: &PageRef, block: NewBlock) -> Result<BlockId, StoreError> {
        let page = page.clone();
        let id = Uuid::new_v4().to_string();
        let record_id = id.clone();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO blocks (id, book_id, page_number, content, canonical_key, min_y, max_y, indent_level, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record_id,
                    page.book_id,
                    page.page,
                    block.text,
                    block.canonical_key,
                    block.bounds.min_y,
                    block.bounds.max_y,
                    block.indent_level,
                    now,
                    now,
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(BlockId(id))
    }

    async fn update_block(&self, id: &BlockId, update: BlockUpdate) -> Result<(), StoreError> {
        let block_id = id.0.clone();
        let changed = self
            .execute(move |conn| {
                Ok(conn.execute(
                    "UPDATE blocks
                     SET content = ?1,
                         canonical_key = ?2,
                         updated_at = ?3
                     WHERE id = ?4",
                    params![
                        update.text,
                        update.canonical_key,
                        Utc::now().to_rfc3339(),
                        block_id
                    ],
                )?)
            })
            .await?;

        if changed == 0 {
            return Err(StoreError::BlockNotFound(id.clone()));
        }
        Ok(())
    }

    /// Deleting a block that is already gone succeeds.
    async fn delete_block(&self, id: &BlockId) -> Result<(), StoreError> {
        let block_id = id.0.clone();
        self.execute(move |conn| {
            conn.execute("DELETE FROM blocks WHERE id = ?1", params![block_id])?;
            Ok(())
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn database() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("blocks.sqlite3")).unwrap();
        (dir, db)
    }

    fn draft(text: &str, min_y: f64, max_y: f64) -> NewBlock {
        NewBlock {
            text: text.into(),
            canonical_key: crate::reconcile::canonicalize(text),
            bounds: YBounds::new(min_y, max_y),
            indent_level: 1,
        }
    }

    #[tokio::test]
    async fn blocks_are_listed_per_page_in_creation_order() {
        let (_dir, db) = database().await;
        let page = PageRef::new("3017", 4);
        let other = PageRef::new("3017", 5);

        let first = db.create_block(&page, draft("First", 10.0, 20.0)).await.unwrap();
        db.create_block(&other, draft("Elsewhere", 0.0, 5.0)).await.unwrap();
        let second = db.create_block(&page, draft("Second", 30.0, 40.0)).await.unwrap();

        let blocks = db.list_blocks(&page).await.unwrap();
        assert_eq!(
            blocks.iter().map(|b| b.id.clone()).collect::<Vec<_>>(),
            vec![first, second]
        );
        assert!(blocks[0].creation_order < blocks[1].creation_order);
        assert_eq!(blocks[0].bounds, Some(YBounds::new(10.0, 20.0)));
        assert_eq!(blocks[0].canonical_key.as_deref(), Some("first"));
        assert_eq!(blocks[0].indent_level, Some(1));
    }

    #[tokio::test]
    async fn update_rewrites_text_but_not_bounds() {
        let (_dir, db) = database().await;
        let page = PageRef::new("1", 1);
        let id = db.create_block(&page, draft("draft", 10.0, 20.0)).await.unwrap();

        db.update_block(
            &id,
            BlockUpdate {
                text: "Final".into(),
                canonical_key: "final".into(),
            },
        )
        .await
        .unwrap();

        let block = db.list_blocks(&page).await.unwrap().remove(0);
        assert_eq!(block.text, "Final");
        assert_eq!(block.canonical_key.as_deref(), Some("final"));
        assert_eq!(block.bounds, Some(YBounds::new(10.0, 20.0)));
    }

    #[tokio::test]
    async fn bounds_cannot_be_rewritten() {
        let (_dir, db) = database().await;
        let page = PageRef::new("1", 1);
        let id = db.create_block(&page, draft("fixed", 10.0, 20.0)).await.unwrap();

        let raw_id = id.0.clone();
        let result = db
            .execute(move |conn| {
                conn.execute("UPDATE blocks SET min_y = 0 WHERE id = ?1", params![raw_id])?;
                Ok(())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(
            db.list_blocks(&page).await.unwrap()[0].bounds,
            Some(YBounds::new(10.0, 20.0))
        );
    }

    #[tokio::test]
    async fn missing_blocks() {
        let (_dir, db) = database().await;
        let ghost = BlockId::from("ghost");
        let err = db
            .update_block(
                &ghost,
                BlockUpdate {
                    text: "x".into(),
                    canonical_key: "x".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BlockNotFound(id) if id == ghost));
        db.delete_block(&ghost).await.unwrap();
    }
}
