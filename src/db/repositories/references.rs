use anyhow::{bail, Result};
use rusqlite::{params, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{parse_datetime, parse_image_source, to_i64, to_u32},
    },
    models::{ImageBuffer, ReferenceRecord},
};

use super::ReferenceRepository;

const SELECT_COLUMNS: &str = "id, label, category, image_data, image_content_type, \
     image_width, image_height, image_source, created_at";

fn row_to_reference(row: &Row) -> Result<ReferenceRecord> {
    let created_at: String = row.get("created_at")?;
    let source: String = row.get("image_source")?;
    let width: Option<i64> = row.get("image_width")?;
    let height: Option<i64> = row.get("image_height")?;

    let dimensions = match (width, height) {
        (Some(w), Some(h)) => Some((to_u32(w, "image_width")?, to_u32(h, "image_height")?)),
        _ => None,
    };

    let content_type: String = row.get("image_content_type")?;
    Ok(ReferenceRecord {
        id: row.get("id")?,
        label: row.get("label")?,
        category: row.get("category")?,
        reference_image: ImageBuffer::new(
            row.get("image_data")?,
            content_type,
            dimensions,
            parse_image_source(&source)?,
        ),
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn insert_reference(&self, record: ReferenceRecord) -> Result<()> {
        self.execute(move |conn| {
            let image = &record.reference_image;
            let width = image.width().map(|w| to_i64(u64::from(w))).transpose()?;
            let height = image.height().map(|h| to_i64(u64::from(h))).transpose()?;

            let inserted = conn.execute(
                "INSERT INTO reference_signatures (
                    id, label, category, image_data, image_content_type,
                    image_width, image_height, image_source, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.label,
                    record.category,
                    image.data(),
                    image.content_type(),
                    width,
                    height,
                    image.source().as_str(),
                    record.created_at.to_rfc3339(),
                ],
            )?;
            if inserted != 1 {
                bail!("reference {} was not stored", record.id);
            }
            Ok(())
        })
        .await
    }

    pub async fn list_references(&self) -> Result<Vec<ReferenceRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM reference_signatures ORDER BY rowid ASC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut references = Vec::new();
            while let Some(row) = rows.next()? {
                references.push(row_to_reference(row)?);
            }
            Ok(references)
        })
        .await
    }

    pub async fn delete_reference(&self, id: String) -> Result<bool> {
        self.execute(move |conn| {
            let removed = conn.execute(
                "DELETE FROM reference_signatures WHERE id = ?1",
                params![id],
            )?;
            Ok(removed > 0)
        })
        .await
    }
}

impl ReferenceRepository for Database {
    async fn list(&self) -> Result<Vec<ReferenceRecord>> {
        self.list_references().await
    }

    async fn append(&self, record: ReferenceRecord) -> Result<()> {
        self.insert_reference(record).await
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        self.delete_reference(id.to_string()).await
    }
}
