use chrono::NaiveDate;
use diesel::dsl::{count_star, sql, sum};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::Integer;

pub mod catalog;
pub mod db;
pub mod i18n;
pub mod models;
pub mod schema;
pub mod store;
pub mod validation;

use self::models::*;
use db::{DbError, PgPool};

const ACTIVE_SLOT_INDEX: &str = "appointments_active_slot_idx";
const CONFIRMATION_CODE_KEY: &str = "appointments_confirmation_code_key";

#[derive(Debug)]
pub enum BookingOutcome {
    Created(Appointment),
    PhoneBlocked,
    SlotTaken,
    DuplicateCode,
}

#[derive(Debug)]
pub enum ResolveOutcome {
    Resolved(Appointment),
    NotFound,
    AlreadyResolved(AppointmentStatus),
}

/// Blocklist check, slot check and insert in one transaction. A racing insert
/// for the same slot is stopped by the partial unique index.
pub fn create_booking(pool: &PgPool, new_appointment: &NewAppointment) -> Result<BookingOutcome, DbError> {
    use self::schema::{appointments, blocked_phones};

    let conn = &mut pool.get()?;

    let result = conn.transaction::<BookingOutcome, DieselError, _>(|conn| {
        let blocked: i64 = blocked_phones::table
            .filter(blocked_phones::phone.eq(&new_appointment.client_phone))
            .count()
            .get_result(conn)?;

        if blocked > 0 {
            return Ok(BookingOutcome::PhoneBlocked);
        }

        let occupied: i64 = appointments::table
            .filter(appointments::date.eq(new_appointment.date))
            .filter(appointments::time.eq(&new_appointment.time))
            .filter(appointments::status.eq_any(AppointmentStatus::active()))
            .count()
            .get_result(conn)?;

        if occupied > 0 {
            return Ok(BookingOutcome::SlotTaken);
        }

        let created = diesel::insert_into(appointments::table)
            .values(new_appointment)
            .returning(Appointment::as_returning())
            .get_result(conn)?;

        Ok(BookingOutcome::Created(created))
    });

    match result {
        Ok(outcome) => Ok(outcome),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
            match unique_violation_outcome(info.constraint_name()) {
                Some(outcome) => Ok(outcome),
                None => Err(DbError::DieselError(DieselError::DatabaseError(
                    DatabaseErrorKind::UniqueViolation,
                    info,
                ))),
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Booking outcome for a unique violation on `constraint`. A concurrent insert
/// into the same slot trips the partial index, a repeated code trips the key.
/// Any other constraint stays an error.
fn unique_violation_outcome(constraint: Option<&str>) -> Option<BookingOutcome> {
    match constraint {
        Some(ACTIVE_SLOT_INDEX) => Some(BookingOutcome::SlotTaken),
        Some(CONFIRMATION_CODE_KEY) => Some(BookingOutcome::DuplicateCode),
        _ => None,
    }
}

pub fn find_active_slots_by_date(
    pool: &PgPool,
    target_date: NaiveDate,
) -> Result<Vec<(String, String)>, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    Ok(appointments
        .filter(date.eq(target_date))
        .filter(status.eq_any(AppointmentStatus::active()))
        .select((time, status))
        .load::<(String, String)>(conn)?)
}

pub fn find_appointment_by_id(pool: &PgPool, appointment_id: i32) -> Result<Option<Appointment>, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    Ok(appointments
        .filter(id.eq(appointment_id))
        .select(Appointment::as_select())
        .first(conn)
        .optional()?)
}

pub fn find_appointment_by_code(pool: &PgPool, code: &str) -> Result<Option<Appointment>, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    Ok(appointments
        .filter(confirmation_code.eq(code))
        .select(Appointment::as_select())
        .first(conn)
        .optional()?)
}

/// Moves a pending appointment to `new_status`. Terminal rows are left alone.
pub fn resolve_pending_appointment(
    pool: &PgPool,
    appointment_id: i32,
    new_status: AppointmentStatus,
) -> Result<ResolveOutcome, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    let updated = diesel::update(
        appointments
            .filter(id.eq(appointment_id))
            .filter(status.eq(AppointmentStatus::Pending.as_str())),
    )
    .set(status.eq(new_status.as_str()))
    .returning(Appointment::as_returning())
    .get_result(conn)
    .optional()?;

    if let Some(appointment) = updated {
        return Ok(ResolveOutcome::Resolved(appointment));
    }

    let current: Option<String> = appointments
        .filter(id.eq(appointment_id))
        .select(status)
        .first(conn)
        .optional()?;

    Ok(match current.as_deref().and_then(AppointmentStatus::parse) {
        Some(current_status) => ResolveOutcome::AlreadyResolved(current_status),
        None => ResolveOutcome::NotFound,
    })
}

pub fn find_due_reminders(
    pool: &PgPool,
    target_date: NaiveDate,
    target_time: &str,
) -> Result<Vec<Appointment>, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    Ok(appointments
        .filter(date.eq(target_date))
        .filter(time.eq(target_time))
        .filter(status.eq(AppointmentStatus::Confirmed.as_str()))
        .filter(reminder_sent.eq(false))
        .select(Appointment::as_select())
        .load(conn)?)
}

pub fn mark_reminder_sent(pool: &PgPool, appointment_id: i32) -> Result<bool, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    let updated = diesel::update(appointments.filter(id.eq(appointment_id)))
        .set(reminder_sent.eq(true))
        .execute(conn)?;

    Ok(updated > 0)
}

pub fn is_phone_blocked(pool: &PgPool, normalized_phone: &str) -> Result<bool, DbError> {
    use self::schema::blocked_phones::dsl::*;

    let conn = &mut pool.get()?;

    let found: i64 = blocked_phones
        .filter(phone.eq(normalized_phone))
        .count()
        .get_result(conn)?;

    Ok(found > 0)
}

/// Blocking an already blocked phone keeps the original row.
pub fn block_phone(pool: &PgPool, normalized_phone: &str, block_reason: Option<&str>) -> Result<(), DbError> {
    use self::schema::blocked_phones;

    let conn = &mut pool.get()?;

    diesel::insert_into(blocked_phones::table)
        .values(&NewBlockedPhone {
            phone: normalized_phone,
            reason: block_reason,
        })
        .on_conflict(blocked_phones::phone)
        .do_nothing()
        .execute(conn)?;

    Ok(())
}

pub fn unblock_phone(pool: &PgPool, normalized_phone: &str) -> Result<bool, DbError> {
    use self::schema::blocked_phones::dsl::*;

    let conn = &mut pool.get()?;

    let deleted = diesel::delete(blocked_phones.filter(phone.eq(normalized_phone))).execute(conn)?;

    Ok(deleted > 0)
}

pub fn get_blocked_phones(pool: &PgPool) -> Result<Vec<BlockedPhone>, DbError> {
    use self::schema::blocked_phones::dsl::*;

    let conn = &mut pool.get()?;

    Ok(blocked_phones
        .order(blocked_at.desc())
        .select(BlockedPhone::as_select())
        .load(conn)?)
}

/// Replaces any subscriber row that clashes on chat id or phone.
pub fn upsert_subscriber(
    pool: &PgPool,
    subscriber_chat_id: i64,
    normalized_phone: &str,
    display_name: &str,
) -> Result<Subscriber, DbError> {
    use self::schema::telegram_subscribers::dsl::*;

    let conn = &mut pool.get()?;

    Ok(conn.transaction::<Subscriber, DieselError, _>(|conn| {
        diesel::delete(
            telegram_subscribers.filter(
                chat_id
                    .eq(subscriber_chat_id)
                    .or(phone.eq(normalized_phone)),
            ),
        )
        .execute(conn)?;

        diesel::insert_into(telegram_subscribers)
            .values(&NewSubscriber {
                chat_id: subscriber_chat_id,
                phone: normalized_phone,
                name: display_name,
            })
            .returning(Subscriber::as_returning())
            .get_result(conn)
    })?)
}

pub fn find_subscriber_by_phone(pool: &PgPool, normalized_phone: &str) -> Result<Option<Subscriber>, DbError> {
    use self::schema::telegram_subscribers::dsl::*;

    let conn = &mut pool.get()?;

    Ok(telegram_subscribers
        .filter(phone.eq(normalized_phone))
        .select(Subscriber::as_select())
        .first(conn)
        .optional()?)
}

pub fn count_subscribers(pool: &PgPool) -> Result<i64, DbError> {
    use self::schema::telegram_subscribers::dsl::*;

    let conn = &mut pool.get()?;

    Ok(telegram_subscribers.count().get_result(conn)?)
}

pub fn search_appointments(pool: &PgPool, search: Option<&str>, limit: i64) -> Result<Vec<Appointment>, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    let mut query = appointments.select(Appointment::as_select()).into_boxed();

    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", term);
        let by_text = client_name
            .ilike(pattern.clone())
            .or(client_phone.ilike(pattern.clone()))
            .or(confirmation_code.ilike(pattern.clone()))
            .or(client_email.assume_not_null().ilike(pattern));

        query = match validation::parse_iso_date(term) {
            Some(day) => query.filter(by_text.or(date.eq(day))),
            None => query.filter(by_text),
        };
    }

    Ok(query
        .order(sql::<Integer>(
            "CASE status WHEN 'pending' THEN 0 WHEN 'confirmed' THEN 1 ELSE 2 END",
        ))
        .then_order_by(date.desc())
        .then_order_by(time.desc())
        .limit(limit)
        .load(conn)?)
}

pub fn get_booking_stats(pool: &PgPool, today: NaiveDate) -> Result<BookingStats, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    let total: i64 = appointments.select(count_star()).first(conn)?;

    let pending: i64 = appointments
        .filter(status.eq(AppointmentStatus::Pending.as_str()))
        .count()
        .get_result(conn)?;

    let revenue: Option<i64> = appointments
        .filter(status.eq(AppointmentStatus::Confirmed.as_str()))
        .select(sum(price))
        .first(conn)?;

    let today_pending: i64 = appointments
        .filter(date.eq(today))
        .filter(status.eq(AppointmentStatus::Pending.as_str()))
        .count()
        .get_result(conn)?;

    Ok(BookingStats {
        total,
        pending,
        revenue: revenue.unwrap_or(0),
        today_pending,
    })
}

pub fn find_recent_pending(pool: &PgPool, limit: i64) -> Result<Vec<Appointment>, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    Ok(appointments
        .filter(status.eq(AppointmentStatus::Pending.as_str()))
        .order(created_at.desc())
        .limit(limit)
        .select(Appointment::as_select())
        .load(conn)?)
}

pub fn find_day_schedule(pool: &PgPool, target_date: NaiveDate) -> Result<Vec<Appointment>, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    Ok(appointments
        .filter(date.eq(target_date))
        .filter(status.eq_any(AppointmentStatus::active()))
        .order(time.asc())
        .select(Appointment::as_select())
        .load(conn)?)
}

pub fn find_confirmed_appointments(pool: &PgPool) -> Result<Vec<Appointment>, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    Ok(appointments
        .filter(status.eq(AppointmentStatus::Confirmed.as_str()))
        .select(Appointment::as_select())
        .load(conn)?)
}

pub fn rename_appointment_client(pool: &PgPool, appointment_id: i32, new_name: &str) -> Result<bool, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    let updated = diesel::update(appointments.filter(id.eq(appointment_id)))
        .set(client_name.eq(new_name))
        .execute(conn)?;

    Ok(updated > 0)
}

pub fn rename_client_by_phone(pool: &PgPool, normalized_phone: &str, new_name: &str) -> Result<usize, DbError> {
    use self::schema::appointments::dsl::*;

    let conn = &mut pool.get()?;

    Ok(diesel::update(appointments.filter(client_phone.eq(normalized_phone)))
        .set(client_name.eq(new_name))
        .execute(conn)?)
}
