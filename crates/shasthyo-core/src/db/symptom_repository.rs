//! Cached symptom catalog repository

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::Symptom;
use crate::util::unix_millis_now;

/// Trait for the read-only symptom catalog cache
pub trait SymptomRepository {
    /// Replace the whole cache with a freshly fetched catalog
    fn replace_all(&self, symptoms: &[Symptom]) -> Result<()>;

    /// All cached symptoms, stable catalog order (by id)
    fn list(&self) -> Result<Vec<Symptom>>;
}

/// `SQLite` implementation of [`SymptomRepository`]
pub struct SqliteSymptomRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSymptomRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SymptomRepository for SqliteSymptomRepository<'_> {
    fn replace_all(&self, symptoms: &[Symptom]) -> Result<()> {
        let fetched_at = unix_millis_now();

        self.conn.execute_batch("BEGIN")?;
        let outcome = (|| -> Result<()> {
            self.conn.execute("DELETE FROM symptom_cache", [])?;
            for symptom in symptoms {
                self.conn.execute(
                    "INSERT INTO symptom_cache \
                     (id, name_en, name_bn, icon, category, severity_weight, fetched_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    params![
                        symptom.id,
                        symptom.name_en,
                        symptom.name_bn,
                        symptom.icon,
                        symptom.category,
                        symptom.severity_weight,
                        fetched_at,
                    ],
                )?;
            }
            Ok(())
        })();

        match outcome {
            Ok(()) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(error) => {
                self.conn.execute_batch("ROLLBACK").ok();
                Err(error)
            }
        }
    }

    fn list(&self) -> Result<Vec<Symptom>> {
        let mut statement = self.conn.prepare(
            "SELECT id, name_en, name_bn, icon, category, severity_weight \
             FROM symptom_cache ORDER BY id ASC",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(Symptom {
                id: row.get(0)?,
                name_en: row.get(1)?,
                name_bn: row.get(2)?,
                icon: row.get(3)?,
                category: row.get(4)?,
                severity_weight: row.get(5)?,
            })
        })?;

        let mut symptoms = Vec::new();
        for symptom in rows {
            symptoms.push(symptom?);
        }
        Ok(symptoms)
    }
}
