//! Migration catalog.
//!
//! Append-only. Released entries are never edited; a correction is a new
//! entry with the next version number.

use assist_core::{AssistError, Migration, Result, SchemaVersion};

/// Every schema migration, in ascending version order.
pub const MIGRATIONS: &[Migration] = &[
    Migration::new(1, "base_entities", V1_BASE_ENTITIES),
    Migration::new(2, "video_meetings", V2_VIDEO_MEETINGS),
    Migration::new(3, "foreign_key_indexes", V3_FOREIGN_KEY_INDEXES),
    Migration::new(4, "chat_messages", V4_CHAT_MESSAGES),
    Migration::new(5, "chat_sender_trigger", V5_CHAT_SENDER_TRIGGER),
];

const V1_BASE_ENTITIES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
      user_id       INTEGER PRIMARY KEY AUTOINCREMENT,
      username      TEXT NOT NULL UNIQUE,
      password_hash TEXT NOT NULL,
      full_name     TEXT,
      role          TEXT NOT NULL CHECK(role IN ('expert','requester','admin')),
      phone         TEXT,
      email         TEXT,
      created_at    INTEGER DEFAULT (strftime('%s','now'))
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS devices (
      device_id     INTEGER PRIMARY KEY AUTOINCREMENT,
      sn            TEXT NOT NULL UNIQUE,
      model         TEXT,
      location      TEXT,
      owner_org     TEXT,
      created_at    INTEGER DEFAULT (strftime('%s','now'))
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS work_orders (
      order_id      INTEGER PRIMARY KEY AUTOINCREMENT,
      requester_id  INTEGER NOT NULL REFERENCES users(user_id) ON DELETE RESTRICT,
      expert_id     INTEGER REFERENCES users(user_id) ON DELETE SET NULL,
      device_id     INTEGER NOT NULL REFERENCES devices(device_id) ON DELETE RESTRICT,
      status        TEXT NOT NULL CHECK(status IN ('open','assigned','in_progress','paused','resolved','closed','canceled')),
      priority      INTEGER NOT NULL DEFAULT 3 CHECK(priority BETWEEN 1 AND 5),
      title         TEXT NOT NULL,
      description   TEXT,
      created_at    INTEGER DEFAULT (strftime('%s','now')),
      assigned_at   INTEGER,
      closed_at     INTEGER
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS device_data (
      data_id       INTEGER PRIMARY KEY AUTOINCREMENT,
      device_id     INTEGER NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
      ts            INTEGER NOT NULL,
      metric        TEXT NOT NULL,
      value_num     REAL,
      value_text    TEXT,
      UNIQUE(device_id, ts, metric)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_logs (
      log_id        INTEGER PRIMARY KEY AUTOINCREMENT,
      order_id      INTEGER NOT NULL REFERENCES work_orders(order_id) ON DELETE CASCADE,
      actor_id      INTEGER REFERENCES users(user_id) ON DELETE SET NULL,
      action        TEXT NOT NULL,
      content       TEXT,
      created_at    INTEGER DEFAULT (strftime('%s','now'))
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_work_orders_status ON work_orders(status);",
    "CREATE INDEX IF NOT EXISTS idx_device_data_device_ts ON device_data(device_id, ts);",
];

const V2_VIDEO_MEETINGS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS video_meetings (
      meeting_id INTEGER PRIMARY KEY AUTOINCREMENT,
      order_id   INTEGER NOT NULL REFERENCES work_orders(order_id) ON DELETE CASCADE,
      start_time INTEGER NOT NULL,
      end_time   INTEGER,
      topic      TEXT,
      created_at INTEGER DEFAULT (strftime('%s','now'))
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS meeting_participants (
      participant_id INTEGER PRIMARY KEY AUTOINCREMENT,
      meeting_id     INTEGER NOT NULL REFERENCES video_meetings(meeting_id) ON DELETE CASCADE,
      user_id        INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
      role           TEXT,
      joined_at      INTEGER DEFAULT (strftime('%s','now')),
      UNIQUE(meeting_id, user_id)
    );
    "#,
];

const V3_FOREIGN_KEY_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_work_orders_requester ON work_orders(requester_id);",
    "CREATE INDEX IF NOT EXISTS idx_work_orders_expert ON work_orders(expert_id);",
    "CREATE INDEX IF NOT EXISTS idx_work_orders_device ON work_orders(device_id);",
    "CREATE INDEX IF NOT EXISTS idx_order_logs_order ON order_logs(order_id);",
    "CREATE INDEX IF NOT EXISTS idx_order_logs_actor ON order_logs(actor_id);",
    "CREATE INDEX IF NOT EXISTS idx_video_meetings_order ON video_meetings(order_id);",
    "CREATE INDEX IF NOT EXISTS idx_meeting_participants_mid ON meeting_participants(meeting_id);",
    "CREATE INDEX IF NOT EXISTS idx_meeting_participants_uid ON meeting_participants(user_id);",
    "CREATE INDEX IF NOT EXISTS idx_device_data_dev_metric_ts ON device_data(device_id, metric, ts);",
];

const V4_CHAT_MESSAGES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS chat_messages (
      message_id   INTEGER PRIMARY KEY AUTOINCREMENT,
      order_id     INTEGER NOT NULL REFERENCES work_orders(order_id) ON DELETE CASCADE,
      sender_id    INTEGER NOT NULL REFERENCES users(user_id) ON DELETE SET NULL,
      receiver_id  INTEGER REFERENCES users(user_id) ON DELETE SET NULL,
      content      TEXT,
      content_type TEXT DEFAULT 'text',
      attachment   TEXT,
      is_read      INTEGER DEFAULT 0,
      created_at   INTEGER DEFAULT (strftime('%s','now')),
      read_at      INTEGER,
      edited_at    INTEGER,
      deleted      INTEGER DEFAULT 0
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_chat_order_time ON chat_messages(order_id, created_at);",
    "CREATE INDEX IF NOT EXISTS idx_chat_sender_time ON chat_messages(sender_id, created_at);",
    "CREATE INDEX IF NOT EXISTS idx_chat_receiver_time ON chat_messages(receiver_id, created_at);",
];

const V5_CHAT_SENDER_TRIGGER: &[&str] = &[r#"
    CREATE TRIGGER IF NOT EXISTS trg_chat_sender_valid
    BEFORE INSERT ON chat_messages
    BEGIN
      SELECT CASE WHEN NOT EXISTS (
        SELECT 1 FROM work_orders
        WHERE order_id = NEW.order_id
          AND (requester_id = NEW.sender_id OR expert_id = NEW.sender_id)
      )
      THEN RAISE(ABORT, 'Sender not a participant of this work order') END;
    END;
    "#];

/// Highest version declared by `catalog`, or 0 when it is empty.
pub fn latest_version(catalog: &[Migration]) -> SchemaVersion {
    catalog.last().map(|m| m.version).unwrap_or(0)
}

/// Check that versions start at 1 and step by exactly 1 in declaration
/// order, and that no migration is empty.
///
/// The runner relies on declaration order, so a shuffled, duplicated or
/// gapped catalog is rejected before it can touch a database.
pub fn validate_catalog(catalog: &[Migration]) -> Result<()> {
    let mut expected: SchemaVersion = 1;
    for migration in catalog {
        if migration.version != expected {
            return Err(AssistError::catalog(format!(
                "migration '{}' declares version {}, expected {}",
                migration.name, migration.version, expected
            )));
        }
        if migration.statements.is_empty() {
            return Err(AssistError::catalog(format!(
                "migration {} ('{}') has no statements",
                migration.version, migration.name
            )));
        }
        expected += 1;
    }
    Ok(())
}
