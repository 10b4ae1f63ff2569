//! SQLite index of scraped products.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context as _;
use rusqlite::{Connection, params};

use crate::model::ProductRecord;

pub struct ProductIndex {
    conn: Mutex<Connection>,
}

impl ProductIndex {
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("open product index: {}", db_path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("set busy timeout")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory().context("open in-memory product index")?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                title TEXT,
                price REAL,
                description TEXT,
                seller TEXT,
                likes INTEGER,
                views INTEGER,
                brand TEXT,
                size TEXT,
                condition TEXT,
                location TEXT,
                original_image_urls TEXT,
                gcs_paths TEXT,
                scraped_at DATETIME,
                raw_data TEXT
            );
        "#,
        )
        .context("create products table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts `record`; an id that is already indexed is an error.
    pub fn insert(&self, record: &ProductRecord) -> anyhow::Result<()> {
        let image_urls = serde_json::to_string(&record.image_urls).context("encode image urls")?;
        let image_paths =
            serde_json::to_string(record.image_paths()).context("encode image paths")?;
        let raw = serde_json::to_string(record).context("encode raw record")?;

        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("product index lock poisoned"))?;
        conn.execute(
            r#"
            INSERT INTO products (
                id, title, price, description, seller, likes, views, brand, size,
                condition, location, original_image_urls, gcs_paths, scraped_at, raw_data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                record.id,
                record.title,
                record.price,
                record.description,
                record.seller_info.seller_name,
                record.likes as i64,
                record.views as i64,
                record.brand,
                record.size,
                record.condition,
                record.location,
                image_urls,
                image_paths,
                record.scraped_at.to_rfc3339(),
                raw,
            ],
        )
        .with_context(|| format!("insert product {}", record.id))?;
        Ok(())
    }

    pub fn count(&self) -> anyhow::Result<u64> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("product index lock poisoned"))?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
            .context("count products")?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_count() -> anyhow::Result<()> {
        let index = ProductIndex::open_in_memory()?;
        let mut record = ProductRecord::new("https://example.test/items/1");
        record.set_image_paths(vec!["images/x_image_1.jpg".to_owned()]);
        index.insert(&record)?;
        index.insert(&ProductRecord::new("https://example.test/items/2"))?;
        assert_eq!(index.count()?, 2);
        Ok(())
    }

    #[test]
    fn duplicate_id_is_rejected() -> anyhow::Result<()> {
        let index = ProductIndex::open_in_memory()?;
        let record = ProductRecord::new("https://example.test/items/1");
        index.insert(&record)?;
        assert!(index.insert(&record).is_err());
        assert_eq!(index.count()?, 1);
        Ok(())
    }

    #[test]
    fn inserts_into_an_existing_products_table() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vinted_data.db");
        Connection::open(&path)?.execute_batch(
            r#"
            CREATE TABLE products (
                id TEXT PRIMARY KEY,
                title TEXT,
                price REAL,
                description TEXT,
                seller TEXT,
                likes INTEGER,
                views INTEGER,
                brand TEXT,
                size TEXT,
                condition TEXT,
                location TEXT,
                original_image_urls TEXT,
                gcs_paths TEXT,
                scraped_at DATETIME,
                raw_data TEXT
            );
        "#,
        )?;

        let index = ProductIndex::open(&path)?;
        index.insert(&ProductRecord::new("https://example.test/items/1"))?;
        assert_eq!(index.count()?, 1);
        Ok(())
    }

    #[test]
    fn reopening_keeps_rows() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vinted_data.db");
        ProductIndex::open(&path)?.insert(&ProductRecord::new("https://example.test/items/1"))?;
        assert_eq!(ProductIndex::open(&path)?.count()?, 1);
        Ok(())
    }
}
