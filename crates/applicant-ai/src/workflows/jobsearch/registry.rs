use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::NaiveDateTime;

use super::domain::{Application, ApplicationId, ApplicationStatus};

/// Authoritative in-memory store of tracked applications.
///
/// All mutation flows through [`ApplicationRegistry::transition`], which is
/// atomic per id: the mutation closure runs under the registry lock and every
/// commit bumps the record's version token, so a racing transition can never
/// observe or overwrite a half-applied update.
#[derive(Debug)]
pub struct ApplicationRegistry {
    records: Mutex<HashMap<ApplicationId, VersionedRecord>>,
    max_follow_ups: u8,
}

#[derive(Debug, Clone)]
struct VersionedRecord {
    version: u64,
    app: Application,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("application {0} not found")]
    NotFound(String),
    #[error("cannot move application from {} to {}", from.label(), to.label())]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("application {id} already has {max} follow-ups")]
    FollowUpLimit { id: String, max: u8 },
}

impl ApplicationRegistry {
    pub fn new(max_follow_ups: u8) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            max_follow_ups,
        }
    }

    /// Insert or replace an application wholesale. Lifecycle transitions must
    /// go through [`ApplicationRegistry::transition`] instead.
    pub fn upsert(&self, app: Application) -> Application {
        let mut records = self.records.lock().expect("registry mutex poisoned");
        let version = records.get(&app.id).map(|record| record.version + 1).unwrap_or(1);
        records.insert(
            app.id.clone(),
            VersionedRecord {
                version,
                app: app.clone(),
            },
        );
        app
    }

    pub fn get(&self, id: &ApplicationId) -> Result<Application, RegistryError> {
        let records = self.records.lock().expect("registry mutex poisoned");
        records
            .get(id)
            .map(|record| record.app.clone())
            .ok_or_else(|| RegistryError::NotFound(id.0.clone()))
    }

    pub fn list_by_status(&self, status: ApplicationStatus) -> Vec<Application> {
        let records = self.records.lock().expect("registry mutex poisoned");
        let mut apps: Vec<Application> = records
            .values()
            .filter(|record| record.app.status == status)
            .map(|record| record.app.clone())
            .collect();
        apps.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        apps
    }

    /// Every tracked application, oldest first.
    pub fn snapshot(&self) -> Vec<Application> {
        let records = self.records.lock().expect("registry mutex poisoned");
        let mut apps: Vec<Application> = records.values().map(|record| record.app.clone()).collect();
        apps.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        apps
    }

    /// The application whose outbound thread contains `message_id`, if any.
    pub fn find_by_reference(&self, message_id: &str) -> Option<Application> {
        let records = self.records.lock().expect("registry mutex poisoned");
        records
            .values()
            .find(|record| record.app.references(message_id))
            .map(|record| record.app.clone())
    }

    /// Outbound message ids of every non-terminal application, used to scope
    /// response polling.
    pub fn open_thread_ids(&self) -> Vec<String> {
        let records = self.records.lock().expect("registry mutex poisoned");
        records
            .values()
            .filter(|record| !record.app.status.is_terminal())
            .flat_map(|record| record.app.thread_message_ids.iter().cloned())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        let records = self.records.lock().expect("registry mutex poisoned");
        records
            .values()
            .filter(|record| !record.app.status.is_terminal())
            .count()
    }

    pub fn completed_count(&self) -> usize {
        let records = self.records.lock().expect("registry mutex poisoned");
        records
            .values()
            .filter(|record| record.app.status.is_terminal())
            .count()
    }

    pub fn status_counts(&self) -> BTreeMap<&'static str, usize> {
        let records = self.records.lock().expect("registry mutex poisoned");
        let mut counts = BTreeMap::new();
        for record in records.values() {
            *counts.entry(record.app.status.label()).or_insert(0) += 1;
        }
        counts
    }

    /// Apply `mutate` to the application atomically.
    ///
    /// The mutation is validated before commit: a status change must follow
    /// the transition graph and the follow-up counter must stay within bounds.
    /// Every commit refreshes `last_transition_at` and bumps the version.
    pub fn transition<F>(
        &self,
        id: &ApplicationId,
        now: NaiveDateTime,
        mutate: F,
    ) -> Result<Application, RegistryError>
    where
        F: FnOnce(&mut Application) -> Result<(), RegistryError>,
    {
        let mut records = self.records.lock().expect("registry mutex poisoned");
        let record = records
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.0.clone()))?;

        let mut draft = record.app.clone();
        mutate(&mut draft)?;

        if draft.status != record.app.status
            && !record.app.status.can_advance_to(draft.status)
        {
            return Err(RegistryError::InvalidTransition {
                from: record.app.status,
                to: draft.status,
            });
        }
        if draft.follow_ups_sent > self.max_follow_ups {
            return Err(RegistryError::FollowUpLimit {
                id: id.0.clone(),
                max: self.max_follow_ups,
            });
        }

        draft.last_transition_at = now;
        record.version += 1;
        record.app = draft.clone();
        Ok(draft)
    }
}
