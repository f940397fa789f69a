use crate::db::models::{
    ImageFilter, ImageRecord, NewImage, ResponseFormat, format_timestamp, parse_timestamp,
};
use crate::db::schema::SQLITE_INIT;
use crate::error::GalleryError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, QueryBuilder, Row, Sqlite};
use std::path::Path;

pub type SqlitePool = Pool<Sqlite>;

const SELECT_COLUMNS: &str = "SELECT id, session_id, prompt, model, size, quality, \
     response_format, image_path, timestamp FROM images";

#[derive(Clone)]
pub struct ImageStorage {
    pool: SqlitePool,
}

impl ImageStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database file and initialize the schema.
    pub async fn open(path: &Path) -> Result<Self, GalleryError> {
        let connect_opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), GalleryError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert one row. Returns the assigned id.
    pub async fn insert(&self, image: &NewImage) -> Result<i64, GalleryError> {
        let res = Self::insert_query(image).execute(&self.pool).await?;
        Ok(res.last_insert_rowid())
    }

    /// Batch insert using a single transaction. Returns ids in the same order.
    pub async fn insert_many(&self, images: &[NewImage]) -> Result<Vec<i64>, GalleryError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(images.len());

        for image in images {
            let res = Self::insert_query(image).execute(&mut *tx).await?;
            ids.push(res.last_insert_rowid());
        }

        tx.commit().await?;
        Ok(ids)
    }

    fn insert_query(
        image: &NewImage,
    ) -> sqlx::query::Query<'_, Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
        sqlx::query(
            r#"
            INSERT INTO images (
                session_id, prompt, model, size, quality,
                response_format, image_path, timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(image.session_id.as_str())
        .bind(image.prompt.as_str())
        .bind(image.model.as_str())
        .bind(image.size.as_str())
        .bind(image.quality.as_deref())
        .bind(image.response_format.as_str())
        .bind(image.image_path.as_str())
        .bind(format_timestamp(&image.timestamp))
    }

    pub async fn get(&self, id: i64) -> Result<Option<ImageRecord>, GalleryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_model).transpose()
    }

    /// One page of filtered rows, most recent first, plus the filtered total.
    pub async fn list(
        &self,
        filter: &ImageFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ImageRecord>, i64), GalleryError> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM images WHERE 1=1");
        push_filter(&mut count_qb, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        qb.push(" WHERE 1=1");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = qb.build().fetch_all(&self.pool).await?;
        let records = rows
            .into_iter()
            .map(Self::row_to_model)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((records, total))
    }

    /// Every row of a session, most recent first.
    pub async fn list_session(&self, session_id: &str) -> Result<Vec<ImageRecord>, GalleryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE session_id = ? ORDER BY timestamp DESC, id DESC"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_model).collect()
    }

    /// Delete a row inside a transaction, returning what was removed.
    /// `None` when no row has this id.
    pub async fn delete(&self, id: i64) -> Result<Option<ImageRecord>, GalleryError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let record = Self::row_to_model(row)?;

        sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(record))
    }

    pub async fn distinct_sessions(&self) -> Result<Vec<String>, GalleryError> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT session_id FROM images ORDER BY session_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn distinct_models(&self) -> Result<Vec<String>, GalleryError> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT model FROM images ORDER BY model")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    fn row_to_model(row: SqliteRow) -> Result<ImageRecord, GalleryError> {
        let id: i64 = row.try_get("id")?;
        let session_id: String = row.try_get("session_id")?;
        let prompt: String = row.try_get("prompt")?;
        let model: String = row.try_get("model")?;
        let size: String = row.try_get("size")?;
        let quality: Option<String> = row.try_get("quality")?;
        let format_str: String = row.try_get("response_format")?;
        let image_path: String = row.try_get("image_path")?;
        let timestamp_str: String = row.try_get("timestamp")?;

        let response_format: ResponseFormat = format_str
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?;
        let timestamp = parse_timestamp(&timestamp_str).ok_or_else(|| {
            sqlx::Error::Decode(format!("invalid timestamp `{timestamp_str}`").into())
        })?;

        Ok(ImageRecord {
            id,
            session_id,
            prompt,
            model,
            size,
            quality,
            response_format,
            image_path,
            timestamp,
        })
    }
}

/// Append the filter predicates; `prompt` is a `LIKE` substring match with
/// wildcards in the needle escaped.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ImageFilter) {
    if let Some(session_id) = &filter.session_id {
        qb.push(" AND session_id = ").push_bind(session_id.clone());
    }
    if let Some(prompt) = &filter.prompt {
        qb.push(" AND prompt LIKE ")
            .push_bind(format!("%{}%", escape_like(prompt)))
            .push(" ESCAPE '\\'");
    }
    if let Some(model) = &filter.model {
        qb.push(" AND model = ").push_bind(model.clone());
    }
}

fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
