//! SQLite-based storage for rules, beliefs, events, and feedback.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::migrations;
use super::{data_dir, FeedbackLogStore, ScheduledEventStore, TaskRuleStore, TimingBeliefStore};
use crate::context::ContextKey;
use crate::error::DatabaseError;
use crate::feedback::{FeedbackAction, FeedbackEntry};
use crate::reminder::{EventPriority, ReminderTransition, ScheduledEvent};
use crate::rules::{TaskRule, TriggerCondition};
use crate::timing::{BeliefFilter, TimingBelief, TimingPrior};

// === Helper Functions ===

/// Parse event priority from database string
fn parse_priority(priority_str: &str) -> EventPriority {
    match priority_str {
        "high" => EventPriority::High,
        "low" => EventPriority::Low,
        _ => EventPriority::Medium,
    }
}

/// Format event priority for database storage
fn format_priority(priority: EventPriority) -> &'static str {
    priority.name()
}

/// Parse feedback action from database string
fn parse_action(action_str: &str) -> FeedbackAction {
    match action_str {
        "rejected" => FeedbackAction::Rejected,
        _ => FeedbackAction::Accepted,
    }
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_datetime_opt(dt_str: Option<String>) -> Option<DateTime<Utc>> {
    dt_str.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Build a TaskRule from a database row
fn row_to_rule(row: &rusqlite::Row) -> Result<TaskRule, rusqlite::Error> {
    let id_str: String = row.get(0)?;
    let trigger_json: String = row.get(3)?;
    let trigger: TriggerCondition = serde_json::from_str(&trigger_json).unwrap_or_default();
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(TaskRule {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        name: row.get(1)?,
        description: row.get(2)?,
        trigger,
        weight: row.get(4)?,
        active: row.get::<_, i64>(5)? != 0,
        scheduled_event_id: row.get(6)?,
        created_at: parse_datetime_fallback(&created_at),
        updated_at: parse_datetime_fallback(&updated_at),
    })
}

/// Build a TimingBelief from a database row
fn row_to_belief(row: &rusqlite::Row) -> Result<TimingBelief, rusqlite::Error> {
    let context_key: String = row.get(1)?;
    let last_updated: String = row.get(6)?;

    Ok(TimingBelief {
        task_type: row.get(0)?,
        context_key: ContextKey::from_raw(context_key),
        window_minutes: row.get::<_, i64>(2)? as u32,
        alpha: row.get(3)?,
        beta: row.get(4)?,
        total_triggers: row.get::<_, i64>(5)? as u32,
        last_updated: parse_datetime_fallback(&last_updated),
    })
}

/// Build a ScheduledEvent from a database row
fn row_to_event(row: &rusqlite::Row) -> Result<ScheduledEvent, rusqlite::Error> {
    let start_time: String = row.get(3)?;
    let priority_str: String = row.get(4)?;
    let contexts_json: String = row.get(7)?;

    Ok(ScheduledEvent {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        start_time: parse_datetime_fallback(&start_time),
        priority: parse_priority(&priority_str),
        preparation_minutes: row.get::<_, i64>(5)? as u32,
        travel_minutes: row.get::<_, i64>(6)? as u32,
        suggested_contexts: serde_json::from_str(&contexts_json).unwrap_or_default(),
        optimal_reminder_time: parse_datetime_opt(row.get(8)?),
        last_reminded_at: parse_datetime_opt(row.get(9)?),
        reminder_count: row.get::<_, i64>(10)? as u32,
        completed: row.get::<_, i64>(11)? != 0,
        dismissed: row.get::<_, i64>(12)? != 0,
    })
}

/// Build a FeedbackEntry from a database row
fn row_to_feedback(row: &rusqlite::Row) -> Result<FeedbackEntry, rusqlite::Error> {
    let id_str: String = row.get(0)?;
    let task_id_str: String = row.get(1)?;
    let action_str: String = row.get(2)?;
    let context_key: String = row.get(4)?;
    let context_json: String = row.get(5)?;
    let timestamp: String = row.get(6)?;

    let context = serde_json::from_str(&context_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(FeedbackEntry {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        task_id: Uuid::parse_str(&task_id_str).unwrap_or_else(|_| Uuid::nil()),
        action: parse_action(&action_str),
        window_minutes: row.get::<_, i64>(3)? as u32,
        context_key: ContextKey::from_raw(context_key),
        context,
        timestamp: parse_datetime_fallback(&timestamp),
    })
}

const RULE_COLUMNS: &str =
    "id, name, description, trigger, weight, active, scheduled_event_id, created_at, updated_at";
const BELIEF_COLUMNS: &str =
    "task_type, context_key, window_minutes, alpha, beta, total_triggers, last_updated";
const EVENT_COLUMNS: &str = "id, title, description, start_time, priority, preparation_minutes, \
     travel_minutes, suggested_contexts, optimal_reminder_time, last_reminded_at, \
     reminder_count, completed, dismissed";
const FEEDBACK_COLUMNS: &str =
    "id, task_id, action, window_minutes, context_key, context, timestamp";

/// SQLite database implementing all four store traits.
pub struct Db {
    conn: Connection,
}

impl Db {
    /// Open the database at `~/.config/cueist/cueist.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
            .join("cueist.db");
        let conn = Connection::open(&path).map_err(|source| DatabaseError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open a database at an explicit path (tests, tooling).
    pub fn open_at(path: &std::path::Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    // === Rule CRUD (CLI surface) ===

    pub fn insert_rule(&mut self, rule: &TaskRule) -> Result<(), DatabaseError> {
        let trigger_json = serde_json::to_string(&rule.trigger)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO task_rules (id, name, description, trigger, weight, active, \
             scheduled_event_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                rule.id.to_string(),
                rule.name,
                rule.description,
                trigger_json,
                rule.weight,
                rule.active as i64,
                rule.scheduled_event_id,
                rule.created_at.to_rfc3339(),
                rule.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All rules, inactive ones included.
    pub fn all_rules(&self) -> Result<Vec<TaskRule>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RULE_COLUMNS} FROM task_rules ORDER BY created_at"))?;
        let rules = stmt
            .query_map([], row_to_rule)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    pub fn set_rule_active(&mut self, id: Uuid, active: bool) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE task_rules SET active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active as i64, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(DatabaseError::QueryFailed(format!("no rule with id {id}")));
        }
        Ok(())
    }

    pub fn rule_count(&self) -> Result<usize, DatabaseError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM task_rules", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // === Event CRUD (CLI surface) ===

    pub fn insert_event(&mut self, event: &ScheduledEvent) -> Result<(), DatabaseError> {
        let contexts_json = serde_json::to_string(&event.suggested_contexts)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO scheduled_events (id, title, description, start_time, priority, \
             preparation_minutes, travel_minutes, suggested_contexts, optimal_reminder_time, \
             last_reminded_at, reminder_count, completed, dismissed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                event.id,
                event.title,
                event.description,
                event.start_time.to_rfc3339(),
                format_priority(event.priority),
                event.preparation_minutes as i64,
                event.travel_minutes as i64,
                contexts_json,
                event.optimal_reminder_time.map(|t| t.to_rfc3339()),
                event.last_reminded_at.map(|t| t.to_rfc3339()),
                event.reminder_count as i64,
                event.completed as i64,
                event.dismissed as i64,
            ],
        )?;
        Ok(())
    }

    pub fn all_events(&self) -> Result<Vec<ScheduledEvent>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM scheduled_events ORDER BY start_time"
        ))?;
        let events = stmt
            .query_map([], row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    pub fn set_event_completed(&mut self, event_id: &str) -> Result<(), DatabaseError> {
        self.set_event_flag(event_id, "completed")
    }

    pub fn set_event_dismissed(&mut self, event_id: &str) -> Result<(), DatabaseError> {
        self.set_event_flag(event_id, "dismissed")
    }

    fn set_event_flag(&mut self, event_id: &str, column: &str) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            &format!("UPDATE scheduled_events SET {column} = 1 WHERE id = ?1"),
            params![event_id],
        )?;
        if changed == 0 {
            return Err(DatabaseError::QueryFailed(format!(
                "no event with id {event_id}"
            )));
        }
        Ok(())
    }
}

impl TaskRuleStore for Db {
    fn list_active(&self) -> Result<Vec<TaskRule>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM task_rules WHERE active = 1 ORDER BY created_at"
        ))?;
        let rules = stmt
            .query_map([], row_to_rule)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    fn get_rule(&self, id: Uuid) -> Result<Option<TaskRule>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RULE_COLUMNS} FROM task_rules WHERE id = ?1"))?;
        let rule = stmt
            .query_row(params![id.to_string()], row_to_rule)
            .optional()?;
        Ok(rule)
    }

    fn update_weight(&mut self, id: Uuid, new_weight: f64) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE task_rules SET weight = ?1, updated_at = ?2 WHERE id = ?3",
            params![new_weight, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(DatabaseError::QueryFailed(format!("no rule with id {id}")));
        }
        Ok(())
    }
}

impl TimingBeliefStore for Db {
    fn get_or_create(
        &mut self,
        task_type: &str,
        context_key: &ContextKey,
        window_minutes: u32,
        prior: TimingPrior,
    ) -> Result<TimingBelief, DatabaseError> {
        let existing = {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {BELIEF_COLUMNS} FROM timing_beliefs
                 WHERE task_type = ?1 AND context_key = ?2 AND window_minutes = ?3"
            ))?;
            stmt.query_row(
                params![task_type, context_key.as_str(), window_minutes as i64],
                row_to_belief,
            )
            .optional()?
        };

        if let Some(belief) = existing {
            return Ok(belief);
        }

        let belief =
            TimingBelief::from_prior(task_type, context_key.clone(), window_minutes, prior);
        self.conn.execute(
            "INSERT INTO timing_beliefs (task_type, context_key, window_minutes, alpha, beta, \
             total_triggers, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                belief.task_type,
                belief.context_key.as_str(),
                belief.window_minutes as i64,
                belief.alpha,
                belief.beta,
                belief.total_triggers as i64,
                belief.last_updated.to_rfc3339(),
            ],
        )?;
        Ok(belief)
    }

    fn update_belief(&mut self, belief: &TimingBelief) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE timing_beliefs SET alpha = ?1, beta = ?2, total_triggers = ?3, \
             last_updated = ?4
             WHERE task_type = ?5 AND context_key = ?6 AND window_minutes = ?7",
            params![
                belief.alpha,
                belief.beta,
                belief.total_triggers as i64,
                belief.last_updated.to_rfc3339(),
                belief.task_type,
                belief.context_key.as_str(),
                belief.window_minutes as i64,
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::QueryFailed(format!(
                "no belief for ({}, {}, {})",
                belief.task_type, belief.context_key, belief.window_minutes
            )));
        }
        Ok(())
    }

    fn list_beliefs(&self, filter: &BeliefFilter) -> Result<Vec<TimingBelief>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BELIEF_COLUMNS} FROM timing_beliefs
             ORDER BY task_type, context_key, window_minutes"
        ))?;
        let beliefs = stmt
            .query_map([], row_to_belief)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|b| {
                filter
                    .task_type
                    .as_deref()
                    .map_or(true, |t| b.task_type == t)
            })
            .filter(|b| {
                filter
                    .context_key
                    .as_ref()
                    .map_or(true, |k| &b.context_key == k)
            })
            .collect();
        Ok(beliefs)
    }
}

impl ScheduledEventStore for Db {
    fn upcoming(
        &self,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<Vec<ScheduledEvent>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM scheduled_events
             WHERE completed = 0 AND dismissed = 0 ORDER BY start_time"
        ))?;
        let cutoff = now + horizon;
        let events = stmt
            .query_map([], row_to_event)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|e| e.start_time >= now && e.start_time <= cutoff)
            .collect();
        Ok(events)
    }

    fn mark_reminded(
        &mut self,
        event_id: &str,
        transition: &ReminderTransition,
    ) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE scheduled_events SET last_reminded_at = ?1, reminder_count = ?2 \
             WHERE id = ?3",
            params![
                transition.last_reminded_at.to_rfc3339(),
                transition.reminder_count as i64,
                event_id,
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::QueryFailed(format!(
                "no event with id {event_id}"
            )));
        }
        Ok(())
    }
}

impl FeedbackLogStore for Db {
    fn append(&mut self, entry: &FeedbackEntry) -> Result<(), DatabaseError> {
        let context_json = serde_json::to_string(&entry.context)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO feedback_log (id, task_id, action, window_minutes, context_key, \
             context, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id.to_string(),
                entry.task_id.to_string(),
                entry.action.name(),
                entry.window_minutes as i64,
                entry.context_key.as_str(),
                context_json,
                entry.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn recent(
        &self,
        task_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<FeedbackEntry>, DatabaseError> {
        let entries = match task_id {
            Some(id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {FEEDBACK_COLUMNS} FROM feedback_log WHERE task_id = ?1
                     ORDER BY timestamp DESC LIMIT ?2"
                ))?;
                let rows = stmt
                    .query_map(params![id.to_string(), limit as i64], row_to_feedback)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {FEEDBACK_COLUMNS} FROM feedback_log
                     ORDER BY timestamp DESC LIMIT ?1"
                ))?;
                let rows = stmt
                    .query_map(params![limit as i64], row_to_feedback)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(entries)
    }
}
