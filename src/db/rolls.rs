use std::rc::Rc;

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::rows::time_column;
use super::Database;

/// An import batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roll {
    pub id: i64,
    pub time: DateTime<Utc>,
}

pub struct RollStore {
    db: Rc<Database>,
}

impl RollStore {
    pub fn new(db: Rc<Database>) -> Self {
        Self { db }
    }

    pub fn create_roll(&self, time: DateTime<Utc>) -> Result<i64> {
        self.db.execute("INSERT INTO rolls (time) VALUES (?)", [time.timestamp()])?;
        Ok(self.db.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> Result<Option<Roll>> {
        self.db.query_row("SELECT id, time FROM rolls WHERE id = ?", [id], |row| {
            Ok(Roll {
                id: row.get(0)?,
                time: time_column(row, 1)?,
            })
        })
    }

    /// Newest first, at most `limit` when given.
    pub fn get_rolls(&self, limit: Option<usize>) -> Result<Vec<Roll>> {
        let mut sql = "SELECT id, time FROM rolls ORDER BY time DESC, id DESC".to_string();
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        let mut stmt = self.db.prepare(&sql)?;
        let rolls = stmt
            .query_map([], |row| {
                Ok(Roll {
                    id: row.get(0)?,
                    time: time_column(row, 1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rolls)
    }

    pub fn photo_count(&self, roll_id: i64) -> Result<usize> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM photos WHERE roll_id = ?", [roll_id], |row| row.get(0))?
            .unwrap_or(0);
        Ok(count as usize)
    }
}
