use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Result};
use std::collections::BTreeMap;

use crate::core::error::AppResult;
use crate::storage::migrations;

/// Пользователь бота. Создаётся при первом обращении и никогда не удаляется.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Telegram ID пользователя
    pub telegram_id: i64,
    /// Имя пользователя (username) в Telegram, если доступно
    pub username: Option<String>,
    /// Код языка из профиля Telegram (например, "ru", "en")
    pub language_code: Option<String>,
    /// Дата регистрации (UTC, формат SQLite `datetime`)
    pub registered_at: String,
}

/// Текущее состояние теста пользователя. Одна строка на пользователя,
/// перезаписывается на месте.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSession {
    pub user_id: i64,
    /// Идентификатор темы (`password_security`, `phishing`, ...), если тест начат
    pub current_theme: Option<String>,
    pub current_question: u32,
    pub correct_count: u32,
    pub updated_at: String,
}

/// Частичное обновление сессии теста.
///
/// Если задана `theme`, сессия начинается заново: счётчики берутся из
/// обновления или сбрасываются в 0. Иначе `current_question` может только
/// расти, меньшие значения игнорируются.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizSessionUpdate {
    pub theme: Option<String>,
    pub current_question: Option<u32>,
    pub correct_count: Option<u32>,
}

impl QuizSessionUpdate {
    /// Начало новой темы: индекс и счёт обнуляются.
    pub fn start(theme: impl Into<String>) -> Self {
        Self {
            theme: Some(theme.into()),
            current_question: Some(0),
            correct_count: Some(0),
        }
    }

    /// Продвижение внутри текущей темы.
    pub fn advance(current_question: u32, correct_count: u32) -> Self {
        Self {
            theme: None,
            current_question: Some(current_question),
            correct_count: Some(correct_count),
        }
    }
}

/// Статистика фишинговых тренировок.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhishingStats {
    pub total: u32,
    pub clicked: u32,
}

impl PhishingStats {
    /// Доля распознанных атак: `1 - clicked / total`, `None` если тренировок не было.
    pub fn recognition_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(1.0 - f64::from(self.clicked) / f64::from(self.total))
        }
    }
}

/// Сводка прогресса пользователя.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    /// Лучший результат по каждой пройденной теме
    pub best_scores: BTreeMap<String, f64>,
    /// Среднее по лучшим результатам, округлённое до 0.1 (0 если тем нет)
    pub average_score: f64,
    pub phishing: PhishingStats,
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections, enables foreign
/// keys on every connection and applies the embedded schema migrations.
///
/// # Example
///
/// ```no_run
/// use cybertutor::storage::db;
///
/// let pool = db::create_pool("bot.db")?;
/// # Ok::<(), cybertutor::core::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    migrations::run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn read_user(conn: &DbConnection, telegram_id: i64) -> Result<User> {
    conn.query_row(
        "SELECT telegram_id, username, language_code, registered_at FROM users WHERE telegram_id = ?1",
        params![telegram_id],
        |row| {
            Ok(User {
                telegram_id: row.get(0)?,
                username: row.get(1)?,
                language_code: row.get(2)?,
                registered_at: row.get(3)?,
            })
        },
    )
}

/// Возвращает пользователя, создавая его при первом обращении.
///
/// Если username или язык изменились в Telegram, запись обновляется.
/// Пустые значения не затирают сохранённые.
pub fn get_or_create_user(
    conn: &DbConnection,
    telegram_id: i64,
    username: Option<&str>,
    language_code: Option<&str>,
) -> Result<User> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO users (telegram_id, username, language_code) VALUES (?1, ?2, ?3)
         ON CONFLICT(telegram_id) DO UPDATE SET
             username = COALESCE(excluded.username, users.username),
             language_code = COALESCE(excluded.language_code, users.language_code)",
        params![telegram_id, username, language_code],
    )?;
    tx.commit()?;
    read_user(conn, telegram_id)
}

/// Получает пользователя по Telegram ID без создания.
pub fn get_user(conn: &DbConnection, telegram_id: i64) -> Result<Option<User>> {
    read_user(conn, telegram_id).optional()
}

fn read_quiz_session(conn: &rusqlite::Connection, user_id: i64) -> Result<Option<QuizSession>> {
    conn.query_row(
        "SELECT user_id, current_theme, current_question, correct_count, updated_at
         FROM quiz_sessions WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(QuizSession {
                user_id: row.get(0)?,
                current_theme: row.get(1)?,
                current_question: row.get(2)?,
                correct_count: row.get(3)?,
                updated_at: row.get(4)?,
            })
        },
    )
    .optional()
}

/// Возвращает сессию теста пользователя, создавая пустую при отсутствии.
pub fn get_or_create_quiz_session(conn: &DbConnection, user_id: i64) -> Result<QuizSession> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT OR IGNORE INTO quiz_sessions (user_id, current_question, correct_count) VALUES (?1, 0, 0)",
        params![user_id],
    )?;
    let session = read_quiz_session(&tx, user_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    tx.commit()?;
    Ok(session)
}

/// Применяет частичное обновление к сессии теста и возвращает новое состояние.
pub fn update_quiz_session(conn: &DbConnection, user_id: i64, update: &QuizSessionUpdate) -> Result<QuizSession> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT OR IGNORE INTO quiz_sessions (user_id, current_question, correct_count) VALUES (?1, 0, 0)",
        params![user_id],
    )?;
    let existing = read_quiz_session(&tx, user_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;

    let (theme, question, correct) = match &update.theme {
        Some(theme) => (
            Some(theme.clone()),
            update.current_question.unwrap_or(0),
            update.correct_count.unwrap_or(0),
        ),
        None => (
            existing.current_theme.clone(),
            update
                .current_question
                .map_or(existing.current_question, |q| q.max(existing.current_question)),
            update.correct_count.unwrap_or(existing.correct_count),
        ),
    };

    tx.execute(
        "UPDATE quiz_sessions
         SET current_theme = ?1, current_question = ?2, correct_count = ?3, updated_at = datetime('now')
         WHERE user_id = ?4",
        params![theme, question, correct, user_id],
    )?;
    let session = read_quiz_session(&tx, user_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    tx.commit()?;
    Ok(session)
}

/// Добавляет результат теста. Оценка приводится к диапазону [0, 100].
///
/// Возвращает фактически сохранённое значение.
pub fn append_test_result(conn: &DbConnection, user_id: i64, theme: &str, score: f64) -> Result<f64> {
    let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) };
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO test_results (user_id, theme, score) VALUES (?1, ?2, ?3)",
        params![user_id, theme, score],
    )?;
    tx.commit()?;
    Ok(score)
}

/// Записывает исход фишинговой тренировки. Записи неизменяемы.
pub fn append_phishing_log(conn: &DbConnection, user_id: i64, scenario: &str, clicked: bool) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO phishing_logs (user_id, scenario, clicked) VALUES (?1, ?2, ?3)",
        params![user_id, scenario, clicked],
    )?;
    tx.commit()?;
    Ok(())
}

/// Собирает прогресс пользователя: лучшие результаты по темам, среднее по
/// ним и статистику фишинга.
pub fn get_progress(conn: &DbConnection, user_id: i64) -> Result<Progress> {
    let tx = conn.unchecked_transaction()?;

    let best_scores = {
        let mut stmt =
            tx.prepare("SELECT theme, MAX(score) FROM test_results WHERE user_id = ?1 GROUP BY theme ORDER BY theme")?;
        let rows = stmt.query_map(params![user_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?;
        rows.collect::<Result<BTreeMap<String, f64>>>()?
    };

    let (total, clicked): (u32, u32) = tx.query_row(
        "SELECT COUNT(*), COALESCE(SUM(clicked), 0) FROM phishing_logs WHERE user_id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    tx.commit()?;

    let average_score = if best_scores.is_empty() {
        0.0
    } else {
        let sum: f64 = best_scores.values().sum();
        (sum / best_scores.len() as f64 * 10.0).round() / 10.0
    };

    Ok(Progress {
        best_scores,
        average_score,
        phishing: PhishingStats { total, clicked },
    })
}
