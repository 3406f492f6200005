//! Wholesale replacement and filtered reads of the read cache.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use paykeep_core::constants::USER_PROFILE_KEY;
use paykeep_core::errors::PaykeepResult;
use paykeep_core::models::{Category, Payment, PaymentFilter, UserProfile};

use crate::{malformed, sqlite_err};

fn encode<T: Serialize>(value: &T) -> PaykeepResult<String> {
    serde_json::to_string(value).map_err(|e| malformed(e.to_string()))
}

fn decode<T: DeserializeOwned>(table: &str, raw: &str) -> PaykeepResult<T> {
    serde_json::from_str(raw).map_err(|e| malformed(format!("{table}: {e}")))
}

/// Clear and refill `payments`. The caller owns the transaction.
pub fn replace_payments(conn: &Connection, payments: &[Payment]) -> PaykeepResult<()> {
    conn.execute("DELETE FROM payments", []).map_err(sqlite_err)?;
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO payments (id, position, status, due_date, category_id, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(sqlite_err)?;
    for (position, payment) in payments.iter().enumerate() {
        stmt.execute(params![
            payment.id,
            position as i64,
            payment.status.as_str(),
            payment.due_date,
            payment.category_id(),
            encode(payment)?,
        ])
        .map_err(sqlite_err)?;
    }
    Ok(())
}

/// Clear and refill `categories`. The caller owns the transaction.
pub fn replace_categories(conn: &Connection, categories: &[Category]) -> PaykeepResult<()> {
    conn.execute("DELETE FROM categories", []).map_err(sqlite_err)?;
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO categories (id, position, name, data) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sqlite_err)?;
    for (position, category) in categories.iter().enumerate() {
        stmt.execute(params![
            category.id,
            position as i64,
            category.name,
            encode(category)?
        ])
        .map_err(sqlite_err)?;
    }
    Ok(())
}

/// Replace the single profile row; `None` clears it.
pub fn replace_user(conn: &Connection, user: Option<&UserProfile>) -> PaykeepResult<()> {
    conn.execute("DELETE FROM user_profile", []).map_err(sqlite_err)?;
    if let Some(user) = user {
        conn.execute(
            "INSERT INTO user_profile (key, data) VALUES (?1, ?2)",
            params![USER_PROFILE_KEY, encode(user)?],
        )
        .map_err(sqlite_err)?;
    }
    Ok(())
}

/// Payments matching `filter`, by due date then server order.
pub fn list_payments(conn: &Connection, filter: &PaymentFilter) -> PaykeepResult<Vec<Payment>> {
    let due_from = filter.due_from.map(|d| d.format("%Y-%m-%d").to_string());
    let due_to = filter.due_to.map(|d| d.format("%Y-%m-%d").to_string());

    let mut stmt = conn
        .prepare_cached(
            "SELECT data FROM payments
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR category_id = ?2)
               AND (?3 IS NULL OR substr(due_date, 1, 10) >= ?3)
               AND (?4 IS NULL OR substr(due_date, 1, 10) <= ?4)
             ORDER BY due_date, position",
        )
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map(
            params![
                filter.status.map(|s| s.as_str()),
                filter.category_id,
                due_from,
                due_to
            ],
            |row| row.get::<_, String>(0),
        )
        .map_err(sqlite_err)?;

    let mut payments = Vec::new();
    for raw in rows {
        payments.push(decode("payments", &raw.map_err(sqlite_err)?)?);
    }
    Ok(payments)
}

pub fn get_payment(conn: &Connection, id: &str) -> PaykeepResult<Option<Payment>> {
    let raw: Option<String> = conn
        .query_row("SELECT data FROM payments WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()
        .map_err(sqlite_err)?;
    raw.map(|r| decode("payments", &r)).transpose()
}

/// Categories in server order.
pub fn list_categories(conn: &Connection) -> PaykeepResult<Vec<Category>> {
    let mut stmt = conn
        .prepare_cached("SELECT data FROM categories ORDER BY position")
        .map_err(sqlite_err)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(sqlite_err)?;

    let mut categories = Vec::new();
    for raw in rows {
        categories.push(decode("categories", &raw.map_err(sqlite_err)?)?);
    }
    Ok(categories)
}

pub fn get_user(conn: &Connection) -> PaykeepResult<Option<UserProfile>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT data FROM user_profile WHERE key = ?1",
            params![USER_PROFILE_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(sqlite_err)?;
    raw.map(|r| decode("user_profile", &r)).transpose()
}

/// Empty every cache table. The caller owns the transaction.
pub fn clear_cache_tables(conn: &Connection) -> PaykeepResult<()> {
    conn.execute_batch(
        "
        DELETE FROM payments;
        DELETE FROM categories;
        DELETE FROM user_profile;
        ",
    )
    .map_err(sqlite_err)?;
    Ok(())
}
