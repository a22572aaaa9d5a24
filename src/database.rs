use crate::category::{Category, Difficulty};
use crate::error::{TipError, TipResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use log::{debug, info};
use sqlite::{Connection, State, Statement};
use std::sync::Arc;
use tokio::sync::Mutex;

/// SQLite primary result code for constraint violations.
const SQLITE_CONSTRAINT_UNIQUE: isize = 2067;

/// Trim + lowercase. The dedup key for tips and the form they are stored in.
pub fn normalize_tip(text: &str) -> String {
    text.trim().to_lowercase()
}

/// A tip ready to be written. `text` is normalized on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTip {
    pub text: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub topics: Vec<String>,
    pub verification_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTip {
    pub id: i64,
    pub text: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub topics: Vec<String>,
    pub date: DateTime<Utc>,
    pub verification_score: f64,
    /// Always empty; nothing in the bot writes feedback yet.
    pub feedback: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    /// Normalized text of the tip this reflection talks about.
    pub tip: String,
    pub reflection: String,
    pub category: Category,
    pub date: DateTime<Utc>,
}

/// Aggregated count and most recent post date for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCount {
    pub category: Category,
    pub count: u64,
    pub last_sent: Option<DateTime<Utc>>,
}

/// Persistence the tip agent depends on.
#[async_trait]
pub trait TipStore: Send + Sync {
    async fn tip_exists(&self, text: &str, category: Category) -> TipResult<bool>;

    /// Fails with [`TipError::DuplicateContent`] when the normalized text is
    /// already stored for the category.
    async fn insert_tip(&self, tip: &NewTip) -> TipResult<StoredTip>;

    /// Newest first. `None` spans every category.
    async fn recent_tips(&self, category: Option<Category>, limit: usize) -> TipResult<Vec<StoredTip>>;

    async fn insert_reflection(&self, reflection: &Reflection) -> TipResult<()>;

    async fn recent_reflections(&self, limit: usize) -> TipResult<Vec<Reflection>>;

    async fn category_stats(&self) -> TipResult<Vec<CategoryCount>>;
}

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn new(database_path: &str) -> anyhow::Result<Self> {
        let connection = sqlite::open(database_path)?;
        let db = Database {
            connection: Arc::new(Mutex::new(connection)),
        };

        db.init_tables().await?;
        info!("Database initialized at: {}", database_path);
        Ok(db)
    }

    async fn init_tables(&self) -> TipResult<()> {
        let conn = self.connection.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tips (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                category TEXT NOT NULL,
                difficulty TEXT NOT NULL DEFAULT 'medium',
                topics TEXT NOT NULL DEFAULT '[]',
                date TEXT NOT NULL,
                verification_score REAL NOT NULL DEFAULT 0,
                feedback TEXT NOT NULL DEFAULT '[]',
                UNIQUE(category, text)
            )",
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tips_category
             ON tips(category)",
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tips_date
             ON tips(date)",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS reflections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tip TEXT NOT NULL,
                reflection TEXT NOT NULL,
                category TEXT NOT NULL,
                date TEXT NOT NULL
            )",
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_reflections_date
             ON reflections(date)",
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_reflections_category
             ON reflections(category)",
        )?;

        Ok(())
    }
}

// Fixed-width timestamps so lexical order in SQL equals chronological order.
fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_date(raw: &str) -> TipResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| TipError::Persistence(format!("bad date {:?}: {}", raw, e)))
}

fn parse_category(raw: &str) -> TipResult<Category> {
    Category::from_str(raw).ok_or_else(|| TipError::Persistence(format!("unknown category {:?}", raw)))
}

fn is_unique_violation(err: &sqlite::Error) -> bool {
    // Primary code 19 also covers NOT NULL and CHECK failures.
    err.code == Some(SQLITE_CONSTRAINT_UNIQUE)
        || err
            .message
            .as_deref()
            .map_or(false, |m| m.contains("UNIQUE constraint failed"))
}

fn read_tip(statement: &Statement<'_>) -> TipResult<StoredTip> {
    let category = parse_category(&statement.read::<String, _>("category")?)?;
    let difficulty = Difficulty::from_str(&statement.read::<String, _>("difficulty")?).unwrap_or_default();
    Ok(StoredTip {
        id: statement.read::<i64, _>("id")?,
        text: statement.read::<String, _>("text")?,
        category,
        difficulty,
        topics: serde_json::from_str(&statement.read::<String, _>("topics")?)?,
        date: parse_date(&statement.read::<String, _>("date")?)?,
        verification_score: statement.read::<f64, _>("verification_score")?,
        feedback: serde_json::from_str(&statement.read::<String, _>("feedback")?)?,
    })
}

#[async_trait]
impl TipStore for Database {
    async fn tip_exists(&self, text: &str, category: Category) -> TipResult<bool> {
        let normalized = normalize_tip(text);
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("SELECT 1 FROM tips WHERE text = ? AND category = ? LIMIT 1")?;
        statement.bind((1, normalized.as_str()))?;
        statement.bind((2, category.as_str()))?;

        Ok(matches!(statement.next()?, State::Row))
    }

    async fn insert_tip(&self, tip: &NewTip) -> TipResult<StoredTip> {
        let stored = StoredTip {
            id: 0,
            text: normalize_tip(&tip.text),
            category: tip.category,
            difficulty: tip.difficulty,
            topics: tip.topics.clone(),
            date: Utc::now().trunc_subsecs(6),
            verification_score: tip.verification_score,
            feedback: Vec::new(),
        };
        let topics = serde_json::to_string(&stored.topics)?;
        let date = format_date(&stored.date);

        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "INSERT INTO tips (text, category, difficulty, topics, date, verification_score, feedback)
             VALUES (?, ?, ?, ?, ?, ?, '[]')",
        )?;
        statement.bind((1, stored.text.as_str()))?;
        statement.bind((2, stored.category.as_str()))?;
        statement.bind((3, stored.difficulty.as_str()))?;
        statement.bind((4, topics.as_str()))?;
        statement.bind((5, date.as_str()))?;
        statement.bind((6, stored.verification_score))?;

        if let Err(e) = statement.next() {
            return Err(if is_unique_violation(&e) {
                TipError::DuplicateContent { category: stored.category }
            } else {
                e.into()
            });
        }
        drop(statement);

        let mut id_statement = conn.prepare("SELECT last_insert_rowid()")?;
        id_statement.next()?;
        let id = id_statement.read::<i64, _>(0)?;

        debug!("Stored {} tip #{}", stored.category, id);
        Ok(StoredTip { id, ..stored })
    }

    async fn recent_tips(&self, category: Option<Category>, limit: usize) -> TipResult<Vec<StoredTip>> {
        let conn = self.connection.lock().await;
        let mut statement = match category {
            Some(category) => {
                let mut statement = conn.prepare(
                    "SELECT * FROM tips WHERE category = ?
                     ORDER BY date DESC, id DESC LIMIT ?",
                )?;
                statement.bind((1, category.as_str()))?;
                statement.bind((2, limit as i64))?;
                statement
            }
            None => {
                let mut statement = conn.prepare("SELECT * FROM tips ORDER BY date DESC, id DESC LIMIT ?")?;
                statement.bind((1, limit as i64))?;
                statement
            }
        };

        let mut tips = Vec::new();
        while let State::Row = statement.next()? {
            tips.push(read_tip(&statement)?);
        }
        Ok(tips)
    }

    async fn insert_reflection(&self, reflection: &Reflection) -> TipResult<()> {
        let date = format_date(&reflection.date);
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "INSERT INTO reflections (tip, reflection, category, date) VALUES (?, ?, ?, ?)",
        )?;
        statement.bind((1, reflection.tip.as_str()))?;
        statement.bind((2, reflection.reflection.as_str()))?;
        statement.bind((3, reflection.category.as_str()))?;
        statement.bind((4, date.as_str()))?;
        statement.next()?;
        Ok(())
    }

    async fn recent_reflections(&self, limit: usize) -> TipResult<Vec<Reflection>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT tip, reflection, category, date FROM reflections
             ORDER BY date DESC, id DESC LIMIT ?",
        )?;
        statement.bind((1, limit as i64))?;

        let mut reflections = Vec::new();
        while let State::Row = statement.next()? {
            reflections.push(Reflection {
                tip: statement.read::<String, _>("tip")?,
                reflection: statement.read::<String, _>("reflection")?,
                category: parse_category(&statement.read::<String, _>("category")?)?,
                date: parse_date(&statement.read::<String, _>("date")?)?,
            });
        }
        Ok(reflections)
    }

    async fn category_stats(&self) -> TipResult<Vec<CategoryCount>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT category, COUNT(*) AS count, MAX(date) AS last_sent
             FROM tips GROUP BY category",
        )?;

        let mut stats = Vec::new();
        while let State::Row = statement.next()? {
            let raw_category = statement.read::<String, _>("category")?;
            // Rows written by other tools may carry categories we don't know.
            let Some(category) = Category::from_str(&raw_category) else {
                debug!("Skipping stats for unknown category {:?}", raw_category);
                continue;
            };
            let last_sent = parse_date(&statement.read::<String, _>("last_sent")?)?;
            stats.push(CategoryCount {
                category,
                count: statement.read::<i64, _>("count")?.max(0) as u64,
                last_sent: Some(last_sent),
            });
        }
        Ok(stats)
    }
}
