use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Row};

use crate::db::connection::Database;
use crate::models::{BlockId, PageRef, StoredPoint, StoredStroke, StrokeId};
use crate::store::{StoreError, StrokeStore};

fn row_to_stroke(row: &Row) -> Result<StoredStroke> {
    let points: String = row.get("points")?;
    let block_id: Option<String> = row.get("block_id")?;

    Ok(StoredStroke {
        id: StrokeId(row.get("stroke_id")?),
        points: serde_json::from_str::<Vec<StoredPoint>>(&points)
            .context("failed to decode stroke points")?,
        block_id: block_id.map(BlockId),
    })
}

#[async_trait]
impl StrokeStore for Database {
    async fn load_strokes(&self, page: &PageRef) -> Result<Vec<StoredStroke>, StoreError> {
        let page = page.clone();
        let strokes = self
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT stroke_id, points, block_id
                     FROM strokes
                     WHERE book_id = ?1 AND page_number = ?2
                     ORDER BY stroke_id ASC",
                )?;

                let mut rows = stmt.query(params![page.book_id, page.page])?;
                let mut strokes = Vec::new();
                while let Some(row) = rows.next()? {
                    strokes.push(row_to_stroke(row)?);
                }

                Ok(strokes)
            })
            .await?;
        Ok(strokes)
    }

    async fn save_strokes(
        &self,
        page: &PageRef,
        strokes: Vec<StoredStroke>,
    ) -> Result<(), StoreError> {
        let page = page.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM strokes WHERE book_id = ?1 AND page_number = ?2",
                params![page.book_id, page.page],
            )?;

            for stroke in &strokes {
                let points = serde_json::to_string(&stroke.points)
                    .context("failed to encode stroke points")?;
                tx.execute(
                    "INSERT INTO strokes (book_id, page_number, stroke_id, points, block_id)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        page.book_id,
                        page.page,
                        stroke.id.0,
                        points,
                        stroke.block_id.as_ref().map(|id| id.0.as_str()),
                    ],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Point, Stroke};

    #[tokio::test]
    async fn save_replaces_page_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("strokes.sqlite3")).unwrap();
        let page = PageRef::new("42", 2);
        let other = PageRef::new("42", 3);

        let mut linked = Stroke::new(page.clone(), vec![Point::new(1.0, 2.0, 100), Point::new(3.0, 4.5, 130)]);
        linked.block_id = Some(BlockId::from("b1"));
        let loose = Stroke::new(page.clone(), vec![Point::new(0.0, 0.0, 200)]);

        db.save_strokes(&other, vec![loose.to_stored()]).await.unwrap();
        db.save_strokes(&page, vec![linked.to_stored(), loose.to_stored()])
            .await
            .unwrap();
        db.save_strokes(&page, vec![linked.to_stored()]).await.unwrap();

        let stored = db.load_strokes(&page).await.unwrap();
        assert_eq!(stored, vec![linked.to_stored()]);
        assert_eq!(stored[0].clone().into_stroke(page.clone()), linked);
        assert_eq!(db.load_strokes(&other).await.unwrap().len(), 1);
    }
}
