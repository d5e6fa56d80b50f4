//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `PodStore` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Ratings can be read while other pods are being written
//! - **Connection pooling**: Shared by all concurrent pod tasks
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! Timestamps are stored as Unix milliseconds.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, PodStore};
use super::error::{StorageError, StorageResult};
use super::schema::{NewPod, PodRecord, PodRow, PodSummary, RatingRecord};
use crate::{LiveState, ResponseTime};

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file and its directory if they don't exist
    /// 2. Run migrations to create the `pods` and `rating_comments` tables
    /// 3. Configure SQLite for concurrent readers (WAL mode, etc.)
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use podmon::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./pods.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        if let Some(dir) = db_path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30)); // Retry on lock contention

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// Insert a pod row (administrative path)
    #[instrument(skip(self, pod), fields(domain = %pod.domain))]
    pub async fn insert_pod(&self, pod: &NewPod) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pods (domain, pingdomurl, score, datecreated, hidden)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&pod.domain)
        .bind(&pod.pingdom_url)
        .bind(pod.score)
        .bind(pod.date_created.as_ref().map(Self::timestamp_to_millis))
        .bind(pod.hidden)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a rating (end-user path)
    pub async fn insert_rating(&self, rating: &RatingRecord) -> StorageResult<()> {
        sqlx::query("INSERT INTO rating_comments (domain, admin, rating) VALUES (?, ?, ?)")
            .bind(&rating.domain)
            .bind(if rating.is_admin { 1i64 } else { 0i64 })
            .bind(rating.rating)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Helper to convert timestamp to Unix milliseconds for SQLite
    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    /// Helper to convert Unix milliseconds from SQLite to DateTime
    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn record_from_row(row: &SqliteRow, updated: i64) -> StorageResult<PodRecord> {
        let live_state = row
            .get::<Option<String>, _>("status")
            .map(|status| status.parse::<LiveState>())
            .transpose()
            .map_err(StorageError::InvalidValue)?;

        let response_time = row
            .get::<Option<String>, _>("responsetimelast7")
            .map(|text| text.parse::<ResponseTime>())
            .transpose()
            .map_err(|e| StorageError::InvalidValue(format!("response time: {e}")))?;

        let last_stats: Option<i64> = row.get("datelaststats");

        Ok(PodRecord {
            domain: row.get("domain"),
            git_date: row.get("hgitdate"),
            git_revision: row.get("hgitref"),
            encoding: row.get("hencoding"),
            runtime: row.get("hruntime"),
            server: row.get("hserver"),
            short_version: row.get("shortversion"),
            long_version: row.get("longversion"),
            master_version: row.get("masterversion"),
            secure: row.get("secure"),
            registrations_open: row.get("signup"),
            pod_name: row.get("name"),
            total_users: row.get("total_users"),
            active_users_halfyear: row.get("active_users_halfyear"),
            active_users_monthly: row.get("active_users_monthly"),
            local_posts: row.get("local_posts"),
            ipv4: row.get("ip"),
            ipv6: row.get("ipv6"),
            country: row.get("country"),
            city: row.get("city"),
            region: row.get("state"),
            latitude: row.get("lat"),
            longitude: row.get("long"),
            whois: row.get("whois"),
            uptime_percent: row.get("uptimelast7"),
            months_monitored: row.get("monthsmonitored"),
            response_time,
            live_state,
            score: row.get("score"),
            admin_rating: row.get("adminrating"),
            user_rating: row.get("userrating"),
            date_last_stats: Self::millis_to_timestamp(last_stats.unwrap_or(updated)),
            date_updated: Self::millis_to_timestamp(updated),
        })
    }
}

#[async_trait]
impl PodStore for SqliteBackend {
    #[instrument(skip(self))]
    async fn list_pods(&self, domain_filter: Option<&str>) -> StorageResult<Vec<PodSummary>> {
        let query = match domain_filter {
            Some(domain) => sqlx::query(
                "SELECT domain, pingdomurl, score, datecreated, adminrating FROM pods WHERE domain = ?",
            )
            .bind(domain.to_string()),
            None => sqlx::query(
                "SELECT domain, pingdomurl, score, datecreated, adminrating FROM pods ORDER BY domain",
            ),
        };

        let rows = query.fetch_all(&self.pool).await?;

        let pods: Vec<PodSummary> = rows
            .into_iter()
            .map(|row| PodSummary {
                domain: row.get("domain"),
                pingdom_url: row.get("pingdomurl"),
                score: row.get("score"),
                date_created: row
                    .get::<Option<i64>, _>("datecreated")
                    .map(Self::millis_to_timestamp),
                admin_rating: row.get("adminrating"),
            })
            .collect();

        if pods.is_empty() {
            debug!("pod list is empty");
        }

        Ok(pods)
    }

    #[instrument(skip(self))]
    async fn list_ratings(&self, domain: &str) -> StorageResult<Vec<RatingRecord>> {
        let rows = sqlx::query("SELECT domain, admin, rating FROM rating_comments WHERE domain = ?")
            .bind(domain)
            .fetch_all(&self.pool)
            .await?;

        let ratings = rows
            .into_iter()
            .filter_map(|row| {
                // rows with other admin markers are not counted
                let is_admin = match row.get::<i64, _>("admin") {
                    1 => true,
                    0 => false,
                    other => {
                        warn!("ignoring rating with admin marker {other}");
                        return None;
                    }
                };
                Some(RatingRecord {
                    domain: row.get("domain"),
                    is_admin,
                    rating: row.get("rating"),
                })
            })
            .collect();

        Ok(ratings)
    }

    #[instrument(skip(self, record), fields(domain = %record.domain))]
    async fn update_pod(&self, record: &PodRecord) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE pods SET
                hgitdate = ?, hgitref = ?, hencoding = ?, hruntime = ?, hserver = ?,
                shortversion = ?, longversion = ?, masterversion = ?, secure = ?,
                signup = ?, name = ?, total_users = ?, active_users_halfyear = ?,
                active_users_monthly = ?, local_posts = ?,
                ip = ?, ipv6 = ?, country = ?, city = ?, state = ?, lat = ?, "long" = ?, whois = ?,
                uptimelast7 = ?, monthsmonitored = ?, responsetimelast7 = ?, status = ?,
                score = ?, adminrating = ?, userrating = ?,
                datelaststats = ?, dateupdated = ?
            WHERE domain = ?
            "#,
        )
        .bind(&record.git_date)
        .bind(&record.git_revision)
        .bind(&record.encoding)
        .bind(&record.runtime)
        .bind(&record.server)
        .bind(&record.short_version)
        .bind(&record.long_version)
        .bind(&record.master_version)
        .bind(record.secure)
        .bind(record.registrations_open)
        .bind(&record.pod_name)
        .bind(record.total_users)
        .bind(record.active_users_halfyear)
        .bind(record.active_users_monthly)
        .bind(record.local_posts)
        .bind(&record.ipv4)
        .bind(&record.ipv6)
        .bind(&record.country)
        .bind(&record.city)
        .bind(&record.region)
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(&record.whois)
        .bind(record.uptime_percent)
        .bind(record.months_monitored)
        .bind(record.response_time.map(|time| time.to_string()))
        .bind(record.live_state.map(|state| state.as_str()))
        .bind(record.score)
        .bind(record.admin_rating)
        .bind(record.user_rating)
        .bind(Self::timestamp_to_millis(&record.date_last_stats))
        .bind(Self::timestamp_to_millis(&record.date_updated))
        .bind(&record.domain)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::PodNotFound(record.domain.clone()));
        }

        debug!("pod row updated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_pod(&self, domain: &str) -> StorageResult<Option<PodRow>> {
        let row = sqlx::query("SELECT * FROM pods WHERE domain = ?")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let record = match row.get::<Option<i64>, _>("dateupdated") {
            Some(updated) => Some(Self::record_from_row(&row, updated)?),
            None => None,
        };

        Ok(Some(PodRow {
            pingdom_url: row.get("pingdomurl"),
            date_created: row
                .get::<Option<i64>, _>("datecreated")
                .map(Self::millis_to_timestamp),
            hidden: row.get("hidden"),
            score: row.get("score"),
            record,
        }))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        // Simple ping query to verify connection
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
