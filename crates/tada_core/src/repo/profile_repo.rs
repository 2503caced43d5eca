//! Single-row user profile repository.

use crate::model::profile::{Persona, UserProfile};
use crate::repo::{bool_to_int, int_to_bool, RepoError, RepoResult};
use rusqlite::{params, Connection};

const PROFILE_ID: &str = "default";

pub trait ProfileRepository {
    fn get_profile(&self) -> RepoResult<UserProfile>;
    fn save_profile(&self, profile: &UserProfile) -> RepoResult<()>;
}

pub struct SqliteProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfileRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn get_profile(&self) -> RepoResult<UserProfile> {
        let mut stmt = self.conn.prepare(
            "SELECT persona, task_view, uncertainty_tolerance, incompletion_style,
                    user_note, onboarding_completed, wrm_confidence, created_at, updated_at
             FROM user_profile WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([PROFILE_ID])?;
        let Some(row) = rows.next()? else {
            return Ok(UserProfile::default());
        };

        let persona_raw: Option<String> = row.get("persona")?;
        let persona_names: Vec<String> =
            crate::repo::parse_json_column(persona_raw, "user_profile.persona")?;
        let mut persona = Vec::with_capacity(persona_names.len());
        for name in persona_names {
            persona.push(Persona::parse(&name).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid persona `{name}` in user_profile.persona"))
            })?);
        }

        Ok(UserProfile {
            persona,
            task_view: decode_enum(row.get("task_view")?, "user_profile.task_view")?,
            uncertainty_tolerance: decode_enum(
                row.get("uncertainty_tolerance")?,
                "user_profile.uncertainty_tolerance",
            )?,
            incompletion_style: decode_enum(
                row.get("incompletion_style")?,
                "user_profile.incompletion_style",
            )?,
            user_note: row.get("user_note")?,
            onboarding_completed: int_to_bool(
                row.get("onboarding_completed")?,
                "user_profile.onboarding_completed",
            )?,
            wrm_confidence: crate::repo::parse_json_column(
                row.get("wrm_confidence")?,
                "user_profile.wrm_confidence",
            )?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn save_profile(&self, profile: &UserProfile) -> RepoResult<()> {
        let persona: Vec<&str> = profile.persona.iter().map(|p| p.as_str()).collect();
        self.conn.execute(
            "INSERT INTO user_profile (
                id, persona, task_view, uncertainty_tolerance, incompletion_style,
                user_note, onboarding_completed, wrm_confidence, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                persona = excluded.persona,
                task_view = excluded.task_view,
                uncertainty_tolerance = excluded.uncertainty_tolerance,
                incompletion_style = excluded.incompletion_style,
                user_note = excluded.user_note,
                onboarding_completed = excluded.onboarding_completed,
                wrm_confidence = excluded.wrm_confidence,
                updated_at = excluded.updated_at;",
            params![
                PROFILE_ID,
                crate::repo::to_json_text(&persona)?,
                encode_enum(&profile.task_view)?,
                encode_enum(&profile.uncertainty_tolerance)?,
                encode_enum(&profile.incompletion_style)?,
                profile.user_note.as_deref(),
                bool_to_int(profile.onboarding_completed),
                profile
                    .wrm_confidence
                    .as_ref()
                    .map(crate::repo::to_json_text)
                    .transpose()?,
                profile.created_at,
                profile.updated_at,
            ],
        )?;
        Ok(())
    }
}

/// Enum columns hold the serde string form (`process`, `low`, ...).
fn decode_enum<T: serde::de::DeserializeOwned>(
    raw: Option<String>,
    column: &str,
) -> RepoResult<Option<T>> {
    match raw {
        None => Ok(None),
        Some(text) => serde_json::from_value(serde_json::Value::String(text.clone()))
            .map(Some)
            .map_err(|_| RepoError::InvalidData(format!("invalid value `{text}` in {column}"))),
    }
}

fn encode_enum<T: serde::Serialize>(value: &Option<T>) -> RepoResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(inner) => match serde_json::to_value(inner) {
            Ok(serde_json::Value::String(text)) => Ok(Some(text)),
            _ => Err(RepoError::InvalidData(
                "profile enum did not encode to a string".to_string(),
            )),
        },
    }
}
