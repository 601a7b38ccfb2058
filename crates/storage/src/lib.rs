use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use govsi_crawler_core::{
    CanonicalUrl, CrawlError, ImageDescriptor, LinkEdge, PageRaw, SiteData, Store,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../migrations/001_init.sql"))
            .execute(&self.pool)
            .await?;
        info!("migrations complete");
        Ok(())
    }

    pub async fn check_connectivity(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn page_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pages")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn link_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM links")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_site(&self, site: &SiteData) -> Result<(), CrawlError> {
        sqlx::query(
            "INSERT INTO sites (host, robots_text, sitemap_text)
             VALUES ($1, $2, $3)
             ON CONFLICT (host) DO NOTHING",
        )
        .bind(&site.host)
        .bind(&site.robots_text)
        .bind(&site.sitemap_text)
        .execute(&self.pool)
        .await
        .map_err(|e| CrawlError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn insert_page_with_links_and_images(
        &self,
        page: &PageRaw,
        links: &[LinkEdge],
        images: &[ImageDescriptor],
    ) -> Result<(), CrawlError> {
        let (content_hash, data_type_code, duplicate_url) = match page {
            PageRaw::Html { content_hash, .. } => (Some(content_hash.clone()), None, None),
            PageRaw::Binary { data_type_code, .. } => (None, Some(data_type_code.clone()), None),
            PageRaw::Duplicate { duplicate_url, .. } => {
                (None, None, Some(duplicate_url.as_str().to_string()))
            }
            PageRaw::Error { .. } => (None, None, None),
        };

        let row: (i64,) = sqlx::query_as(
            "INSERT INTO pages (url, host, status, accessed_time, classification, content_hash, data_type_code, duplicate_url)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (url, accessed_time) DO UPDATE SET status = EXCLUDED.status
             RETURNING id",
        )
        .bind(page.url().as_str())
        .bind(page.host())
        .bind(page.status() as i32)
        .bind(accessed_time_of(page))
        .bind(page.classification())
        .bind(&content_hash)
        .bind(&data_type_code)
        .bind(&duplicate_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CrawlError::Storage(e.to_string()))?;

        let page_id = row.0;

        if !links.is_empty() {
            let mut froms = Vec::with_capacity(links.len());
            let mut tos = Vec::with_capacity(links.len());
            for edge in links {
                froms.push(edge.from.as_str().to_string());
                tos.push(edge.to.as_str().to_string());
            }
            sqlx::query(
                "INSERT INTO links (page_id, from_url, to_url)
                 SELECT $1, * FROM UNNEST($2::text[], $3::text[])",
            )
            .bind(page_id)
            .bind(&froms)
            .bind(&tos)
            .execute(&self.pool)
            .await
            .map_err(|e| CrawlError::Storage(e.to_string()))?;
        }

        if !images.is_empty() {
            let mut filenames = Vec::with_capacity(images.len());
            let mut content_types = Vec::with_capacity(images.len());
            let mut accessed_times = Vec::with_capacity(images.len());
            for img in images {
                filenames.push(img.filename.clone());
                content_types.push(img.content_type.clone());
                accessed_times.push(img.accessed_time);
            }
            sqlx::query(
                "INSERT INTO images (page_id, filename, content_type, accessed_time)
                 SELECT $1, * FROM UNNEST($2::text[], $3::text[], $4::timestamptz[])",
            )
            .bind(page_id)
            .bind(&filenames)
            .bind(&content_types)
            .bind(&accessed_times)
            .execute(&self.pool)
            .await
            .map_err(|e| CrawlError::Storage(e.to_string()))?;
        }

        Ok(())
    }

    async fn check_duplicate_by_hash_or_url(
        &self,
        hash: &str,
        url: &CanonicalUrl,
    ) -> Result<Option<CanonicalUrl>, CrawlError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT url FROM pages WHERE (content_hash = $1 OR url = $2) AND url != $2 LIMIT 1",
        )
        .bind(hash)
        .bind(url.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CrawlError::Storage(e.to_string()))?;

        Ok(row.map(|(u,)| CanonicalUrl::canonicalize(&u)))
    }
}

fn accessed_time_of(page: &PageRaw) -> chrono::DateTime<chrono::Utc> {
    match page {
        PageRaw::Html { accessed_time, .. }
        | PageRaw::Binary { accessed_time, .. }
        | PageRaw::Duplicate { accessed_time, .. }
        | PageRaw::Error { accessed_time, .. } => *accessed_time,
    }
}
