//! Session and progress store on a real SQLite file
//!
//! Run with: cargo test --test store_test

mod common;

use common::temp_pool;
use cybertutor::storage::db::{self, QuizSessionUpdate};
use cybertutor::storage::{create_pool, get_connection};
use pretty_assertions::assert_eq;

#[test]
fn test_progress_uses_best_score_per_theme() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    db::get_or_create_user(&conn, 1, Some("alice"), Some("ru")).unwrap();

    db::append_test_result(&conn, 1, "password_security", 33.3).unwrap();
    db::append_test_result(&conn, 1, "password_security", 80.0).unwrap();
    db::append_test_result(&conn, 1, "phishing", 40.0).unwrap();

    let progress = db::get_progress(&conn, 1).unwrap();
    assert_eq!(progress.best_scores.get("password_security"), Some(&80.0));
    assert_eq!(progress.best_scores.get("phishing"), Some(&40.0));
    assert_eq!(progress.average_score, 60.0);
}

#[test]
fn test_progress_is_per_user() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    db::get_or_create_user(&conn, 1, None, None).unwrap();
    db::get_or_create_user(&conn, 2, None, None).unwrap();

    db::append_test_result(&conn, 1, "phishing", 100.0).unwrap();
    db::append_phishing_log(&conn, 1, "bank_alert", true).unwrap();

    let other = db::get_progress(&conn, 2).unwrap();
    assert!(other.best_scores.is_empty());
    assert_eq!(other.average_score, 0.0);
    assert_eq!(other.phishing.total, 0);
    assert_eq!(other.phishing.recognition_rate(), None);
}

#[test]
fn test_phishing_stats_count_clicks() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    db::get_or_create_user(&conn, 5, None, None).unwrap();

    db::append_phishing_log(&conn, 5, "bank_alert", false).unwrap();
    db::append_phishing_log(&conn, 5, "parcel_delivery", true).unwrap();
    db::append_phishing_log(&conn, 5, "prize_giveaway", false).unwrap();
    db::append_phishing_log(&conn, 5, "bank_alert", false).unwrap();

    let stats = db::get_progress(&conn, 5).unwrap().phishing;
    assert_eq!((stats.total, stats.clicked), (4, 1));
    assert_eq!(stats.recognition_rate(), Some(0.75));
}

#[test]
fn test_phishing_log_rows_are_immutable() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    db::get_or_create_user(&conn, 5, None, None).unwrap();
    db::append_phishing_log(&conn, 5, "bank_alert", true).unwrap();

    let result = conn.execute("UPDATE phishing_logs SET clicked = 0 WHERE user_id = 5", []);
    assert!(result.is_err());
    assert_eq!(db::get_progress(&conn, 5).unwrap().phishing.clicked, 1);
}

#[test]
fn test_quiz_results_are_immutable() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    db::get_or_create_user(&conn, 6, None, None).unwrap();
    db::append_test_result(&conn, 6, "phishing", 40.0).unwrap();

    let result = conn.execute("UPDATE test_results SET score = 100 WHERE user_id = 6", []);
    assert!(result.is_err());
    assert_eq!(db::get_progress(&conn, 6).unwrap().best_scores.get("phishing"), Some(&40.0));
}

#[test]
fn test_results_require_registered_user() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();

    assert!(db::append_test_result(&conn, 404, "phishing", 50.0).is_err());
    assert!(db::append_phishing_log(&conn, 404, "bank_alert", false).is_err());
}

#[test]
fn test_scores_are_clamped() {
    let (_dir, pool) = temp_pool();
    let conn = get_connection(&pool).unwrap();
    db::get_or_create_user(&conn, 3, None, None).unwrap();

    assert_eq!(db::append_test_result(&conn, 3, "phishing", 140.0).unwrap(), 100.0);
    assert_eq!(db::append_test_result(&conn, 3, "network_security", -5.0).unwrap(), 0.0);
}

#[test]
fn test_quiz_session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bot.db");
    let path = path.to_str().unwrap();

    {
        let pool = create_pool(path).unwrap();
        let conn = get_connection(&pool).unwrap();
        db::get_or_create_user(&conn, 9, Some("bob"), None).unwrap();
        db::update_quiz_session(&conn, 9, &QuizSessionUpdate::start("phishing")).unwrap();
        db::update_quiz_session(&conn, 9, &QuizSessionUpdate::advance(2, 1)).unwrap();
    }

    let pool = create_pool(path).unwrap();
    let conn = get_connection(&pool).unwrap();
    let session = db::get_or_create_quiz_session(&conn, 9).unwrap();
    assert_eq!(session.current_theme.as_deref(), Some("phishing"));
    assert_eq!(session.current_question, 2);
    assert_eq!(session.correct_count, 1);
}
