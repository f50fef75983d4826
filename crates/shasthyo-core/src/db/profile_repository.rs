//! Local user profile repository

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{UserId, UserProfile};

/// Trait for the single local profile record
pub trait ProfileRepository {
    /// Insert or update the local profile
    fn save(&self, profile: &UserProfile) -> Result<()>;

    /// The local profile, if one was created
    fn get(&self) -> Result<Option<UserProfile>>;
}

/// `SQLite` implementation of [`ProfileRepository`]
pub struct SqliteProfileRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteProfileRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn save(&self, profile: &UserProfile) -> Result<()> {
        self.conn.execute(
            "INSERT INTO profile (id, age, gender, location, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             age = excluded.age, gender = excluded.gender, \
             location = excluded.location, updated_at = excluded.updated_at",
            params![
                profile.id.as_str(),
                profile.age,
                profile.gender.as_str(),
                profile.location,
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get(&self) -> Result<Option<UserProfile>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, age, gender, location, created_at, updated_at FROM profile \
                 ORDER BY updated_at DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, age, gender, location, created_at, updated_at)) = raw else {
            return Ok(None);
        };

        let id: UserId = id
            .parse()
            .map_err(|_| Error::Database("bad profile id".to_string()))?;
        let gender = gender.parse().map_err(Error::Database)?;

        Ok(Some(UserProfile {
            id,
            age,
            gender,
            location,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|error| Error::Database(format!("bad profile timestamp: {error}")))?
        .to_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Gender, ProfileDraft};

    #[test]
    fn save_then_get_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteProfileRepository::new(db.connection());

        assert!(repo.get().unwrap().is_none());

        let profile = UserProfile::new(ProfileDraft {
            age: 34,
            gender: Gender::Female,
            location: Some("Gaibandha".to_string()),
        });
        repo.save(&profile).unwrap();

        let fetched = repo.get().unwrap().unwrap();
        assert_eq!(fetched.id, profile.id);
        assert_eq!(fetched.age, 34);
        assert_eq!(fetched.gender, Gender::Female);
        assert_eq!(fetched.location.as_deref(), Some("Gaibandha"));
    }

    #[test]
    fn save_updates_in_place() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteProfileRepository::new(db.connection());

        let profile = UserProfile::new(ProfileDraft {
            age: 34,
            gender: Gender::Female,
            location: None,
        });
        repo.save(&profile).unwrap();

        let updated = profile.apply(ProfileDraft {
            age: 35,
            gender: Gender::Female,
            location: Some("Bogura".to_string()),
        });
        repo.save(&updated).unwrap();

        let fetched = repo.get().unwrap().unwrap();
        assert_eq!(fetched.id, updated.id);
        assert_eq!(fetched.age, 35);
        assert_eq!(fetched.location.as_deref(), Some("Bogura"));
        assert!(fetched.updated_at >= fetched.created_at);
    }
}
