//! Typed settings and user profile services.
//!
//! # Invariants
//! - Reads fall back to defaults for keys that were never written.
//! - Schedule settings are validated (`HH:mm`, weekdays 0..=6) before save.
//! - Onboarding completion is only ever set through `complete_onboarding`.

use crate::db::now_epoch_ms;
use crate::model::profile::UserProfile;
use crate::model::settings::{
    AiSettings, AppearanceSettings, PreferenceSettings, ScheduleSettings,
};
use crate::model::task::{PRIORITY_HIGH, PRIORITY_LOW};
use crate::repo::profile_repo::ProfileRepository;
use crate::repo::settings_repo::{
    SettingsRepository, AI_KEY, APPEARANCE_KEY, PREFERENCES_KEY, SCHEDULE_KEY,
};
use crate::repo::RepoError;
use crate::scheduler::parse_schedule_time;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum SettingsError {
    InvalidScheduleTime(String),
    InvalidScheduleDay(u8),
    InvalidPriority(u8),
    Repo(RepoError),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidScheduleTime(value) => {
                write!(f, "schedule time must be HH:mm, got `{value}`")
            }
            Self::InvalidScheduleDay(day) => write!(f, "schedule day must be 0..=6, got {day}"),
            Self::InvalidPriority(value) => write!(
                f,
                "default priority must be {PRIORITY_HIGH}..={PRIORITY_LOW}, got {value}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SettingsError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

pub struct SettingsService<S: SettingsRepository> {
    repo: S,
}

impl<S: SettingsRepository> SettingsService<S> {
    pub fn new(repo: S) -> Self {
        Self { repo }
    }

    fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, SettingsError> {
        Ok(self.repo.get::<T>(key)?.unwrap_or_default())
    }

    fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SettingsError> {
        self.repo.put(key, value, now_epoch_ms())?;
        info!("event=settings_update module=service status=ok key={key}");
        Ok(())
    }

    pub fn appearance(&self) -> Result<AppearanceSettings, SettingsError> {
        self.load(APPEARANCE_KEY)
    }

    pub fn update_appearance(&self, value: &AppearanceSettings) -> Result<(), SettingsError> {
        self.store(APPEARANCE_KEY, value)
    }

    pub fn preferences(&self) -> Result<PreferenceSettings, SettingsError> {
        self.load(PREFERENCES_KEY)
    }

    pub fn update_preferences(&self, value: &PreferenceSettings) -> Result<(), SettingsError> {
        if let Some(priority) = value.default_new_task_priority {
            if !(PRIORITY_HIGH..=PRIORITY_LOW).contains(&priority) {
                return Err(SettingsError::InvalidPriority(priority));
            }
        }
        self.store(PREFERENCES_KEY, value)
    }

    pub fn ai(&self) -> Result<AiSettings, SettingsError> {
        self.load(AI_KEY)
    }

    pub fn update_ai(&self, value: &AiSettings) -> Result<(), SettingsError> {
        self.store(AI_KEY, value)
    }

    pub fn schedule(&self) -> Result<ScheduleSettings, SettingsError> {
        self.load(SCHEDULE_KEY)
    }

    /// Saves schedule settings with days sorted and deduplicated.
    pub fn update_schedule(&self, value: &ScheduleSettings) -> Result<ScheduleSettings, SettingsError> {
        if parse_schedule_time(&value.time).is_none() {
            return Err(SettingsError::InvalidScheduleTime(value.time.clone()));
        }
        if let Some(day) = value.days.iter().copied().find(|day| *day > 6) {
            return Err(SettingsError::InvalidScheduleDay(day));
        }
        let mut normalized = value.clone();
        normalized.time = value.time.trim().to_string();
        normalized.days.sort_unstable();
        normalized.days.dedup();
        self.store(SCHEDULE_KEY, &normalized)?;
        Ok(normalized)
    }
}

pub struct ProfileService<P: ProfileRepository> {
    repo: P,
}

impl<P: ProfileRepository> ProfileService<P> {
    pub fn new(repo: P) -> Self {
        Self { repo }
    }

    pub fn get(&self) -> Result<UserProfile, RepoError> {
        self.repo.get_profile()
    }

    /// Saves answers, keeping `created_at` and the onboarding flag.
    pub fn save(&self, profile: &UserProfile) -> Result<UserProfile, RepoError> {
        let current = self.repo.get_profile()?;
        let now = now_epoch_ms();
        let updated = UserProfile {
            user_note: profile
                .user_note
                .as_deref()
                .map(str::trim)
                .filter(|note| !note.is_empty())
                .map(str::to_string),
            onboarding_completed: current.onboarding_completed,
            created_at: if current.created_at > 0 {
                current.created_at
            } else {
                now
            },
            updated_at: now,
            ..profile.clone()
        };
        self.repo.save_profile(&updated)?;
        Ok(updated)
    }

    pub fn complete_onboarding(&self, profile: &UserProfile) -> Result<UserProfile, RepoError> {
        let mut saved = self.save(profile)?;
        saved.onboarding_completed = true;
        self.repo.save_profile(&saved)?;
        info!("event=onboarding_complete module=service status=ok");
        Ok(saved)
    }

    /// Clears answers so onboarding runs again.
    pub fn reset_onboarding(&self) -> Result<UserProfile, RepoError> {
        let current = self.repo.get_profile()?;
        let reset = UserProfile {
            created_at: current.created_at,
            updated_at: now_epoch_ms(),
            ..UserProfile::default()
        };
        self.repo.save_profile(&reset)?;
        Ok(reset)
    }
}
