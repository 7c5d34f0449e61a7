use baodao_common::{
    BookingRecord, BookingStatus, LessonRecord, LessonType, Result, ScheduleSlot, TalkError,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Persistence boundary: users, conversation transcripts, and the booking
/// ledger (teacher schedules, bookings, lessons).
#[derive(Debug, Clone)]
pub struct TalkStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct ChatRow {
    pub id: String,
    pub user_id: Uuid,
    pub user_language: String,
    pub messages: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub student_id: Uuid,
    pub teacher_id: String,
    pub lesson_date_time: DateTime<Utc>,
    pub lesson_type: LessonType,
    pub status: BookingStatus,
    pub classroom_link: String,
}

fn db_err(e: sqlx::Error) -> TalkError {
    TalkError::Database(e.to_string())
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| TalkError::Database(format!("invalid uuid in row: {}", e)))
}

impl TalkStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting booking store at {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| TalkError::Database(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                user_language TEXT NOT NULL,
                messages TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS teacher_schedules (
                id TEXT PRIMARY KEY,
                teacher_id TEXT NOT NULL,
                start_time TIMESTAMP NOT NULL,
                end_time TIMESTAMP NOT NULL,
                is_available INTEGER NOT NULL DEFAULT 1
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                teacher_id TEXT NOT NULL,
                schedule_slot_id TEXT NOT NULL REFERENCES teacher_schedules(id),
                lesson_type TEXT NOT NULL,
                status TEXT NOT NULL,
                classroom_link TEXT NOT NULL,
                payment_completed INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS lessons (
                id TEXT PRIMARY KEY,
                booking_id TEXT NOT NULL REFERENCES bookings(id),
                status TEXT NOT NULL DEFAULT 'scheduled',
                classroom_link TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // Users

    pub async fn create_user(
        &self,
        name: Option<&str>,
        email: &str,
        password_hash: &str,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                TalkError::Validation(format!("email already registered: {}", email))
            }
            other => db_err(other),
        })?;
        Ok(id)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query(
            "SELECT id, name, email, password_hash FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| {
            Ok(UserRow {
                id: parse_uuid(&r.get::<String, _>("id"))?,
                name: r.get("name"),
                email: r.get("email"),
                password_hash: r.get("password_hash"),
            })
        })
        .transpose()
    }

    // Conversation transcripts. Last write wins by design: the transcript is
    // a best-effort chat log, not the booking source of truth.

    pub async fn save_chat(
        &self,
        id: &str,
        user_id: Uuid,
        user_language: &str,
        messages: &serde_json::Value,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO chats (id, user_id, user_language, messages, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                messages = excluded.messages,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(user_id.to_string())
        .bind(user_language)
        .bind(messages.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn get_chat(&self, id: &str) -> Result<Option<ChatRow>> {
        let row = sqlx::query("SELECT id, user_id, user_language, messages FROM chats WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|r| {
            let messages: String = r.get("messages");
            Ok(ChatRow {
                id: r.get("id"),
                user_id: parse_uuid(&r.get::<String, _>("user_id"))?,
                user_language: r.get("user_language"),
                messages: serde_json::from_str(&messages)
                    .map_err(|e| TalkError::Database(format!("corrupt transcript: {}", e)))?,
            })
        })
        .transpose()
    }

    /// The pinned language of the user's most recently touched conversation,
    /// if any.
    pub async fn latest_chat_language(&self, user_id: Uuid) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT user_language FROM chats WHERE user_id = ? ORDER BY updated_at DESC, created_at DESC LIMIT 1",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(|r| r.get("user_language")))
    }

    /// Idempotent: deleting an absent transcript is a success.
    pub async fn delete_chat(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // Teacher schedules

    pub async fn insert_schedule_slot(
        &self,
        teacher_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO teacher_schedules (id, teacher_id, start_time, end_time, is_available) VALUES (?, ?, ?, ?, 1)",
        )
        .bind(id.to_string())
        .bind(teacher_id)
        .bind(start_time)
        .bind(end_time)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(id)
    }

    pub async fn slot_exists(
        &self,
        teacher_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<bool> {
        let row = sqlx::query(
            "SELECT id FROM teacher_schedules WHERE teacher_id = ? AND start_time = ?",
        )
        .bind(teacher_id)
        .bind(start_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.is_some())
    }

    pub async fn get_schedule_slot(&self, id: Uuid) -> Result<Option<ScheduleSlot>> {
        let row = sqlx::query(
            "SELECT id, teacher_id, start_time, end_time, is_available FROM teacher_schedules WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| {
            Ok(ScheduleSlot {
                id: parse_uuid(&r.get::<String, _>("id"))?,
                teacher_id: r.get("teacher_id"),
                start_time: r.get("start_time"),
                end_time: r.get("end_time"),
                is_available: r.get("is_available"),
            })
        })
        .transpose()
    }

    // Booking ledger

    /// Create a booking against an available schedule slot, atomically.
    ///
    /// The availability claim is a single conditional UPDATE, so of two
    /// racing transactions exactly one takes the slot; the loser observes
    /// zero affected rows and fails with `NoAvailableSlot`. Booking and
    /// lesson inserts ride the same transaction: any failure rolls back the
    /// claim as well.
    pub async fn create_booking(&self, new: NewBooking) -> Result<BookingRecord> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let claimed: Option<(String,)> = sqlx::query_as(
            r#"
            UPDATE teacher_schedules
            SET is_available = 0
            WHERE teacher_id = ? AND start_time = ? AND is_available = 1
            RETURNING id
            "#,
        )
        .bind(&new.teacher_id)
        .bind(new.lesson_date_time)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some((slot_id,)) = claimed else {
            debug!(
                "No available slot for teacher {} at {}",
                new.teacher_id, new.lesson_date_time
            );
            return Err(TalkError::NoAvailableSlot);
        };

        let booking_id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO bookings
                (id, student_id, teacher_id, schedule_slot_id, lesson_type, status,
                 classroom_link, payment_completed, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(booking_id.to_string())
        .bind(new.student_id.to_string())
        .bind(&new.teacher_id)
        .bind(&slot_id)
        .bind(new.lesson_type.as_str())
        .bind(new.status.as_str())
        .bind(&new.classroom_link)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let lesson_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO lessons (id, booking_id, status, classroom_link, created_at) VALUES (?, ?, 'scheduled', ?, ?)",
        )
        .bind(lesson_id.to_string())
        .bind(booking_id.to_string())
        .bind(&new.classroom_link)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        info!(
            "Booking {} created for teacher {} at {}",
            booking_id, new.teacher_id, new.lesson_date_time
        );

        Ok(BookingRecord {
            id: booking_id,
            student_id: new.student_id,
            teacher_id: new.teacher_id,
            schedule_slot_id: parse_uuid(&slot_id)?,
            lesson_type: new.lesson_type,
            status: new.status,
            classroom_link: new.classroom_link,
            payment_completed: false,
            created_at,
        })
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Option<BookingRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, student_id, teacher_id, schedule_slot_id, lesson_type, status,
                   classroom_link, payment_completed, created_at
            FROM bookings WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| {
            let lesson_type: String = r.get("lesson_type");
            let status: String = r.get("status");
            Ok(BookingRecord {
                id: parse_uuid(&r.get::<String, _>("id"))?,
                student_id: parse_uuid(&r.get::<String, _>("student_id"))?,
                teacher_id: r.get("teacher_id"),
                schedule_slot_id: parse_uuid(&r.get::<String, _>("schedule_slot_id"))?,
                lesson_type: lesson_type.parse()?,
                status: match status.as_str() {
                    "confirmed" => BookingStatus::Confirmed,
                    _ => BookingStatus::Pending,
                },
                classroom_link: r.get("classroom_link"),
                payment_completed: r.get("payment_completed"),
                created_at: r.get("created_at"),
            })
        })
        .transpose()
    }

    /// Mark a booking's payment as completed and confirm it.
    ///
    /// Returns `true` only for the call that performed the transition; the
    /// flag is the idempotency key that keeps the confirmation email to at
    /// most one dispatch per booking.
    pub async fn complete_payment(&self, booking_id: Uuid) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE bookings SET payment_completed = 1, status = 'confirmed' WHERE id = ? AND payment_completed = 0",
        )
        .bind(booking_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .rows_affected();

        if updated == 1 {
            return Ok(true);
        }

        match self.get_booking(booking_id).await? {
            Some(_) => Ok(false),
            None => Err(TalkError::NotFound(format!("booking {}", booking_id))),
        }
    }

    pub async fn lessons_for_booking(&self, booking_id: Uuid) -> Result<Vec<LessonRecord>> {
        let rows = sqlx::query(
            "SELECT id, booking_id, status, classroom_link, created_at FROM lessons WHERE booking_id = ? ORDER BY created_at ASC",
        )
        .bind(booking_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|r| {
                Ok(LessonRecord {
                    id: parse_uuid(&r.get::<String, _>("id"))?,
                    booking_id: parse_uuid(&r.get::<String, _>("booking_id"))?,
                    status: r.get("status"),
                    classroom_link: r.get("classroom_link"),
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    async fn test_store() -> (TalkStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("test.db").display());
        let store = TalkStore::connect(&url).await.unwrap();
        (store, dir)
    }

    fn lesson_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap()
    }

    fn new_booking(student: Uuid, when: DateTime<Utc>) -> NewBooking {
        NewBooking {
            student_id: student,
            teacher_id: "teacher-1".to_string(),
            lesson_date_time: when,
            lesson_type: LessonType::Trial,
            status: BookingStatus::Confirmed,
            classroom_link: "https://meet.baodaotalk.com/test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_user_roundtrip_and_duplicate_email() {
        let (store, _dir) = test_store().await;
        let id = store
            .create_user(Some("Demo"), "demo@example.com", "hash")
            .await
            .unwrap();

        let user = store.get_user_by_email("demo@example.com").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.name.as_deref(), Some("Demo"));

        let duplicate = store.create_user(None, "demo@example.com", "hash2").await;
        assert!(matches!(duplicate, Err(TalkError::Validation(_))));
    }

    #[tokio::test]
    async fn test_chat_upsert_and_idempotent_delete() {
        let (store, _dir) = test_store().await;
        let user = store.create_user(None, "s@example.com", "h").await.unwrap();

        let first = serde_json::json!([{"role": "user", "content": "hi"}]);
        store.save_chat("chat-1", user, "en", &first).await.unwrap();

        let second = serde_json::json!([
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "Would you like a trial or regular lesson?"}
        ]);
        store.save_chat("chat-1", user, "en", &second).await.unwrap();

        let row = store.get_chat("chat-1").await.unwrap().unwrap();
        assert_eq!(row.messages, second);
        assert_eq!(row.user_language, "en");

        store.delete_chat("chat-1").await.unwrap();
        assert!(store.get_chat("chat-1").await.unwrap().is_none());
        // Deleting again is still a success.
        store.delete_chat("chat-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_latest_chat_language_follows_most_recent_conversation() {
        let (store, _dir) = test_store().await;
        let user = store.create_user(None, "s@example.com", "h").await.unwrap();
        assert!(store.latest_chat_language(user).await.unwrap().is_none());

        let messages = serde_json::json!([{"role": "user", "content": "hi"}]);
        store.save_chat("chat-1", user, "zh", &messages).await.unwrap();
        store.save_chat("chat-2", user, "ja", &messages).await.unwrap();
        assert_eq!(
            store.latest_chat_language(user).await.unwrap().as_deref(),
            Some("ja")
        );

        // Touching the older conversation makes it current again.
        store.save_chat("chat-1", user, "zh", &messages).await.unwrap();
        assert_eq!(
            store.latest_chat_language(user).await.unwrap().as_deref(),
            Some("zh")
        );
    }

    #[tokio::test]
    async fn test_create_booking_flips_slot_and_creates_lesson() {
        let (store, _dir) = test_store().await;
        let student = store.create_user(None, "s@example.com", "h").await.unwrap();
        let when = lesson_time();
        let slot_id = store
            .insert_schedule_slot("teacher-1", when, when + Duration::hours(1))
            .await
            .unwrap();

        let booking = store.create_booking(new_booking(student, when)).await.unwrap();
        assert_eq!(booking.schedule_slot_id, slot_id);
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let slot = store.get_schedule_slot(slot_id).await.unwrap().unwrap();
        assert!(!slot.is_available);

        let lessons = store.lessons_for_booking(booking.id).await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].status, "scheduled");
        assert_eq!(lessons[0].classroom_link, booking.classroom_link);
    }

    #[tokio::test]
    async fn test_second_booking_for_same_slot_fails_without_partial_writes() {
        let (store, _dir) = test_store().await;
        let student = store.create_user(None, "s@example.com", "h").await.unwrap();
        let when = lesson_time();
        store
            .insert_schedule_slot("teacher-1", when, when + Duration::hours(1))
            .await
            .unwrap();

        let first = store.create_booking(new_booking(student, when)).await.unwrap();
        let second = store.create_booking(new_booking(student, when)).await;
        assert!(matches!(second, Err(TalkError::NoAvailableSlot)));

        // Exactly one lesson exists, for the winning booking.
        let lessons = store.lessons_for_booking(first.id).await.unwrap();
        assert_eq!(lessons.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_slot_fails_cleanly() {
        let (store, _dir) = test_store().await;
        let student = store.create_user(None, "s@example.com", "h").await.unwrap();
        let result = store.create_booking(new_booking(student, lesson_time())).await;
        assert!(matches!(result, Err(TalkError::NoAvailableSlot)));
    }

    #[tokio::test]
    async fn test_concurrent_bookings_one_winner() {
        let (store, _dir) = test_store().await;
        let student = store.create_user(None, "s@example.com", "h").await.unwrap();
        let when = lesson_time();
        let slot_id = store
            .insert_schedule_slot("teacher-1", when, when + Duration::hours(1))
            .await
            .unwrap();

        let a = store.clone();
        let b = store.clone();
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.create_booking(new_booking(student, when)).await }),
            tokio::spawn(async move { b.create_booking(new_booking(student, when)).await }),
        );
        let results = [ra.unwrap(), rb.unwrap()];

        let winners: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(TalkError::NoAvailableSlot))));

        let slot = store.get_schedule_slot(slot_id).await.unwrap().unwrap();
        assert!(!slot.is_available);
    }

    #[tokio::test]
    async fn test_complete_payment_is_idempotent() {
        let (store, _dir) = test_store().await;
        let student = store.create_user(None, "s@example.com", "h").await.unwrap();
        let when = lesson_time();
        store
            .insert_schedule_slot("teacher-1", when, when + Duration::hours(1))
            .await
            .unwrap();

        let mut new = new_booking(student, when);
        new.lesson_type = LessonType::Regular;
        new.status = BookingStatus::Pending;
        let booking = store.create_booking(new).await.unwrap();

        assert!(store.complete_payment(booking.id).await.unwrap());
        assert!(!store.complete_payment(booking.id).await.unwrap());

        let reloaded = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, BookingStatus::Confirmed);
        assert!(reloaded.payment_completed);

        let missing = store.complete_payment(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(TalkError::NotFound(_))));
    }
}
