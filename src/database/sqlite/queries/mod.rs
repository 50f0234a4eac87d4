
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

pub struct DocumentQueries;

impl DocumentQueries {
    /// Atomically replace the document named `input.name` and all of its
    /// sections. The FTS index is kept in sync by triggers inside the same
    /// transaction. Returns the assigned section ids in section order.
    pub async fn upsert(pool: &SqlitePool, input: &DocumentInput) -> Result<Vec<i64>> {
        let now = Utc::now().naive_utc();

        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin ingest transaction")?;

        sqlx::query("DELETE FROM sections WHERE doc_name = ?")
            .bind(&input.name)
            .execute(&mut *tx)
            .await
            .context("Failed to purge previous sections")?;

        sqlx::query("DELETE FROM documentations WHERE name = ?")
            .bind(&input.name)
            .execute(&mut *tx)
            .await
            .context("Failed to purge previous documentation")?;

        sqlx::query(
            r#"
            INSERT INTO documentations (name, display_name, version, base_url, created_date, updated_date)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.name)
        .bind(&input.display_name)
        .bind(&input.version)
        .bind(&input.base_url)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to insert documentation")?;

        let mut section_ids = Vec::with_capacity(input.sections.len());
        for section in &input.sections {
            let keywords = serde_json::to_string(&normalize_facet(&section.keywords))
                .context("Failed to encode keywords")?;
            let use_cases = serde_json::to_string(&normalize_facet(&section.use_cases))
                .context("Failed to encode use_cases")?;
            let tags = serde_json::to_string(&normalize_facet(&section.tags))
                .context("Failed to encode tags")?;

            let id = sqlx::query(
                r#"
                INSERT INTO sections (doc_name, title, path, url, priority, keywords, use_cases, tags, content)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&input.name)
            .bind(&section.title)
            .bind(&section.path)
            .bind(&section.url)
            .bind(section.clamped_priority())
            .bind(keywords)
            .bind(use_cases)
            .bind(tags)
            .bind(&section.content)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert section '{}'", section.path))?
            .last_insert_rowid();

            section_ids.push(id);
        }

        tx.commit().await.context("Failed to commit ingest")?;

        Ok(section_ids)
    }

    pub async fn get_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Documentation>> {
        let result = sqlx::query_as::<_, Documentation>(
            r#"
            SELECT name,
                   display_name,
                   version,
                   base_url,
                   created_date,
                   updated_date
            FROM documentations WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get documentation by name")?;

        Ok(result)
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<DocumentationSummary>> {
        let docs = sqlx::query_as::<_, DocumentationSummary>(
            r#"
            SELECT d.name,
                   d.display_name,
                   d.version,
                   COUNT(s.id) AS sections
            FROM documentations d
            LEFT JOIN sections s ON s.doc_name = d.name
            GROUP BY d.name, d.display_name, d.version
            ORDER BY d.name
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to list documentations")?;

        Ok(docs)
    }

    /// Delete a documentation and its sections. FTS rows are removed by the
    /// delete trigger. Returns whether the documentation existed.
    pub async fn delete(pool: &SqlitePool, name: &str) -> Result<bool> {
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin delete transaction")?;

        sqlx::query("DELETE FROM sections WHERE doc_name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .context("Failed to delete sections")?;

        let result = sqlx::query("DELETE FROM documentations WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .context("Failed to delete documentation")?;

        tx.commit().await.context("Failed to commit delete")?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct SectionQueries;

impl SectionQueries {
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Section>> {
        let row = sqlx::query_as::<_, SectionRow>(
            r#"
            SELECT id,
                   doc_name,
                   title,
                   path,
                   url,
                   priority,
                   keywords,
                   use_cases,
                   tags,
                   content
            FROM sections WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get section by id")?;

        Ok(row.map(Section::from))
    }

    /// All sections in stable `(doc_name, id)` order.
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Section>> {
        let rows = sqlx::query_as::<_, SectionRow>(
            r#"
            SELECT id,
                   doc_name,
                   title,
                   path,
                   url,
                   priority,
                   keywords,
                   use_cases,
                   tags,
                   content
            FROM sections ORDER BY doc_name, id
            "#,
        )
        .fetch_all(pool)
        .await
        .context("Failed to list sections")?;

        Ok(rows.into_iter().map(Section::from).collect())
    }

    pub async fn list_for_doc(pool: &SqlitePool, doc_name: &str) -> Result<Vec<Section>> {
        let rows = sqlx::query_as::<_, SectionRow>(
            r#"
            SELECT id,
                   doc_name,
                   title,
                   path,
                   url,
                   priority,
                   keywords,
                   use_cases,
                   tags,
                   content
            FROM sections WHERE doc_name = ? ORDER BY id
            "#,
        )
        .bind(doc_name)
        .fetch_all(pool)
        .await
        .context("Failed to list sections for documentation")?;

        Ok(rows.into_iter().map(Section::from).collect())
    }

    pub async fn ids_for_doc(pool: &SqlitePool, doc_name: &str) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM sections WHERE doc_name = ? ORDER BY id",
        )
        .bind(doc_name)
        .fetch_all(pool)
        .await
        .context("Failed to list section ids for documentation")?;

        Ok(ids)
    }

    /// Whether every id in `ids` still refers to a live section.
    pub async fn all_exist(pool: &SqlitePool, ids: &[i64]) -> Result<bool> {
        if ids.is_empty() {
            return Ok(true);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let query_str =
            format!("SELECT COUNT(*) FROM sections WHERE id IN ({placeholders})");

        let mut query = sqlx::query_scalar::<_, i64>(&query_str);
        for id in ids {
            query = query.bind(id);
        }

        let count = query
            .fetch_one(pool)
            .await
            .context("Failed to count live sections")?;

        Ok(count as usize == ids.len())
    }

    /// BM25-ranked full-text candidates for an FTS5 MATCH expression,
    /// best rank first. `rank` is SQLite's raw `bm25()` output (negative,
    /// more negative is better).
    pub async fn fts_search(
        pool: &SqlitePool,
        match_expr: &str,
        doc_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(Section, f64)>> {
        let rows = if let Some(doc_name) = doc_name {
            sqlx::query_as::<_, FtsSectionRow>(
                r#"
                SELECT s.id,
                       s.doc_name,
                       s.title,
                       s.path,
                       s.url,
                       s.priority,
                       s.keywords,
                       s.use_cases,
                       s.tags,
                       s.content,
                       bm25(sections_fts) AS rank
                FROM sections_fts
                JOIN sections s ON sections_fts.rowid = s.id
                WHERE sections_fts MATCH ? AND s.doc_name = ?
                ORDER BY rank
                LIMIT ?
                "#,
            )
            .bind(match_expr)
            .bind(doc_name)
            .bind(limit as i64)
            .fetch_all(pool)
            .await
        } else {
            sqlx::query_as::<_, FtsSectionRow>(
                r#"
                SELECT s.id,
                       s.doc_name,
                       s.title,
                       s.path,
                       s.url,
                       s.priority,
                       s.keywords,
                       s.use_cases,
                       s.tags,
                       s.content,
                       bm25(sections_fts) AS rank
                FROM sections_fts
                JOIN sections s ON sections_fts.rowid = s.id
                WHERE sections_fts MATCH ?
                ORDER BY rank
                LIMIT ?
                "#,
            )
            .bind(match_expr)
            .bind(limit as i64)
            .fetch_all(pool)
            .await
        }
        .context("Failed to run full-text search")?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let rank = row.rank;
                (Section::from(row), rank)
            })
            .collect())
    }
}
