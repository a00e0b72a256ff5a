use sqlx::{Pool, Sqlite};
use anyhow::Result;
use chrono::{DateTime, Utc};
use crate::db::models::{Card, CardStatus, Customer, PendingAssignment, format_timestamp};

pub async fn get_card(pool: &Pool<Sqlite>, serial_number: &str) -> Result<Option<Card>> {
    let card = sqlx::query_as::<_, Card>(
        "SELECT * FROM cards WHERE serial_number = ?"
    )
    .bind(serial_number)
    .fetch_optional(pool)
    .await?;

    Ok(card)
}

/// Returns `false` when a card with this serial already exists
pub async fn insert_card(pool: &Pool<Sqlite>, serial_number: &str) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO cards (serial_number, status) VALUES (?, ?)"
    )
    .bind(serial_number)
    .bind(CardStatus::Available.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_customer_by_mobile(pool: &Pool<Sqlite>, mobile_number: &str) -> Result<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        "SELECT * FROM customers WHERE mobile_number = ?"
    )
    .bind(mobile_number)
    .fetch_optional(pool)
    .await?;

    Ok(customer)
}

/// Insert a customer or refresh the flags of an existing one
pub async fn upsert_customer(
    pool: &Pool<Sqlite>,
    mobile_number: &str,
    name: &str,
    is_registered: bool,
    is_active: bool,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO customers (mobile_number, name, is_registered, is_active)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(mobile_number) DO UPDATE SET
            name = excluded.name,
            is_registered = excluded.is_registered,
            is_active = excluded.is_active"
    )
    .bind(mobile_number)
    .bind(name)
    .bind(is_registered)
    .bind(is_active)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_pending(
    pool: &Pool<Sqlite>,
    card_serial: &str,
    customer_mobile: &str,
) -> Result<Option<PendingAssignment>> {
    let pending = sqlx::query_as::<_, PendingAssignment>(
        "SELECT * FROM pending_assignments WHERE card_serial = ? AND customer_mobile = ?"
    )
    .bind(card_serial)
    .bind(customer_mobile)
    .fetch_optional(pool)
    .await?;

    Ok(pending)
}

/// Store a freshly dispatched OTP for the pair, replacing any earlier one
pub async fn upsert_pending(pool: &Pool<Sqlite>, pending: &PendingAssignment) -> Result<()> {
    sqlx::query(
        "INSERT INTO pending_assignments
            (card_serial, customer_mobile, otp_digest, otp_dispatched_at, otp_expires_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(card_serial, customer_mobile) DO UPDATE SET
            otp_digest = excluded.otp_digest,
            otp_dispatched_at = excluded.otp_dispatched_at,
            otp_expires_at = excluded.otp_expires_at,
            failed_attempts = 0"
    )
    .bind(&pending.card_serial)
    .bind(&pending.customer_mobile)
    .bind(&pending.otp_digest)
    .bind(&pending.otp_dispatched_at)
    .bind(&pending.otp_expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Count one wrong OTP against the pair and return the new total
pub async fn record_failed_otp(pool: &Pool<Sqlite>, card_serial: &str, customer_mobile: &str) -> Result<i64> {
    let attempts = sqlx::query_scalar::<_, i64>(
        "UPDATE pending_assignments SET failed_attempts = failed_attempts + 1
         WHERE card_serial = ? AND customer_mobile = ?
         RETURNING failed_attempts"
    )
    .bind(card_serial)
    .bind(customer_mobile)
    .fetch_one(pool)
    .await?;

    Ok(attempts)
}

pub async fn delete_pending(pool: &Pool<Sqlite>, card_serial: &str, customer_mobile: &str) -> Result<()> {
    sqlx::query(
        "DELETE FROM pending_assignments WHERE card_serial = ? AND customer_mobile = ?"
    )
    .bind(card_serial)
    .bind(customer_mobile)
    .execute(pool)
    .await?;

    Ok(())
}

/// Flip the card to `assigned` and drop every pending OTP for it, atomically.
///
/// Returns `false` if the card was no longer `available` when the update ran.
pub async fn complete_assignment(
    pool: &Pool<Sqlite>,
    card_serial: &str,
    customer_id: i64,
    hashed_code: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE cards SET status = ?, customer_id = ?, hashed_code = ?, assigned_at = ?
         WHERE serial_number = ? AND status = ?"
    )
    .bind(CardStatus::Assigned.as_str())
    .bind(customer_id)
    .bind(hashed_code)
    .bind(format_timestamp(now))
    .bind(card_serial)
    .bind(CardStatus::Available.as_str())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("DELETE FROM pending_assignments WHERE card_serial = ?")
        .bind(card_serial)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}
