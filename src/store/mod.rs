//! Normalized in-memory projection of server state.
//!
//! Every operation follows the same shape: call the gateway, and only on
//! success merge the response into the collections (running the membership
//! rules when a task's card can have changed). A failed call leaves the
//! collections exactly as they were.
//!
//! Reads that return many entities never fail outright. On error they keep
//! the last good collection, hand back an empty [`Listing`] and carry the
//! error alongside so the caller can tell "nothing there" from "could not
//! load".

mod cards;
mod directory;
mod projects;
mod tasks;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use crate::gateway::{Gateway, GatewayError};
use crate::model::{
    Card, CardId, Project, ProjectId, ProjectMember, ProjectReport, Task, TaskId, User, UserId,
    UserReport,
};
use crate::ops::reorder::ReorderError;

pub use projects::{MemberOutcome, ProjectCreation};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("{kind} {id} is not loaded")]
    NotLoaded { kind: &'static str, id: String },
    #[error("invalid position: {0}")]
    InvalidPosition(#[from] ReorderError),
}

/// Result of a fetch-many read
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    /// Fresh items, or empty when the read failed
    pub items: Vec<T>,
    /// Why the read failed; the cached collection was left untouched
    pub failure: Option<GatewayError>,
}

impl<T> Listing<T> {
    fn loaded(items: Vec<T>) -> Self {
        Listing {
            items,
            failure: None,
        }
    }

    fn degraded(failure: GatewayError) -> Self {
        Listing {
            items: Vec::new(),
            failure: Some(failure),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Log a failed remote call and lift it into a store error
fn failed(op: &'static str, err: GatewayError) -> StoreError {
    warn!(op, error = %err, "remote call failed");
    StoreError::Gateway(err)
}

/// Log a failed read that is being degraded to an empty listing
fn degraded<T>(op: &'static str, err: GatewayError) -> Listing<T> {
    warn!(op, error = %err, "read failed, keeping cached data");
    Listing::degraded(err)
}

pub struct EntityStore<G> {
    gateway: Arc<G>,
    projects: IndexMap<ProjectId, Project>,
    tasks: IndexMap<TaskId, Task>,
    cards: IndexMap<CardId, Card>,
    users: IndexMap<UserId, User>,
    members: HashMap<ProjectId, IndexMap<UserId, ProjectMember>>,
    current_project: Option<Project>,
    project_report: Option<ProjectReport>,
    user_report: Option<UserReport>,
}

impl<G: Gateway> EntityStore<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        EntityStore {
            gateway,
            projects: IndexMap::new(),
            tasks: IndexMap::new(),
            cards: IndexMap::new(),
            users: IndexMap::new(),
            members: HashMap::new(),
            current_project: None,
            project_report: None,
            user_report: None,
        }
    }
}

impl<G> EntityStore<G> {
    /// Drop every cached entity
    pub fn reset(&mut self) {
        self.projects.clear();
        self.tasks.clear();
        self.cards.clear();
        self.users.clear();
        self.members.clear();
        self.current_project = None;
        self.project_report = None;
        self.user_report = None;
    }

    /// True when nothing at all is cached
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
            && self.tasks.is_empty()
            && self.cards.is_empty()
            && self.users.is_empty()
            && self.members.is_empty()
            && self.current_project.is_none()
            && self.project_report.is_none()
            && self.user_report.is_none()
    }

    pub fn projects(&self) -> impl ExactSizeIterator<Item = &Project> {
        self.projects.values()
    }

    pub fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.get(id)
    }

    /// Tasks in collection order
    pub fn tasks(&self) -> impl ExactSizeIterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Cards in board order, each with its embedded tasks
    pub fn cards(&self) -> impl ExactSizeIterator<Item = &Card> {
        self.cards.values()
    }

    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards.get(id)
    }

    pub fn users(&self) -> impl ExactSizeIterator<Item = &User> {
        self.users.values()
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    /// Cached members of a project, empty if never fetched
    pub fn members(&self, project: &ProjectId) -> Vec<&ProjectMember> {
        self.members
            .get(project)
            .map(|ms| ms.values().collect())
            .unwrap_or_default()
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.current_project.as_ref()
    }

    pub fn project_report(&self) -> Option<&ProjectReport> {
        self.project_report.as_ref()
    }

    pub fn user_report(&self) -> Option<&UserReport> {
        self.user_report.as_ref()
    }

    /// Tasks of one project that are not on any existing card
    pub fn unlisted_tasks(&self, project: &ProjectId) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| &t.project_id == project)
            .filter(|t| {
                t.card_id
                    .as_ref()
                    .is_none_or(|card| !self.cards.contains_key(card))
            })
            .collect()
    }

    pub(crate) fn task_collection(&self) -> &IndexMap<TaskId, Task> {
        &self.tasks
    }

    pub(crate) fn card_collection(&self) -> &IndexMap<CardId, Card> {
        &self.cards
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::logged_in_store;
    use super::*;
    use crate::model::{NewCard, NewProject, NewTask};

    #[test]
    fn reset_empties_every_collection() {
        let (_gw, mut store) = logged_in_store();
        let p = store
            .create_project(&NewProject {
                name: "P".into(),
                ..Default::default()
            })
            .unwrap()
            .project;
        store.fetch_project(&p.id).unwrap();
        let card = store
            .create_card(&p.id, &NewCard {
                title: "Todo".into(),
                position: None,
            })
            .unwrap();
        let mut data = NewTask::titled("T");
        data.card_id = Some(card.id.clone());
        store.create_task(&p.id, &data).unwrap();
        store.fetch_users();
        store.fetch_project_report(&p.id).unwrap();
        assert!(!store.is_empty());

        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.projects().len(), 0);
        assert_eq!(store.cards().len(), 0);
        assert!(store.current_project().is_none());
    }

    #[test]
    fn listing_flags() {
        let ok: Listing<u8> = Listing::loaded(vec![1]);
        assert!(ok.is_ok());
        assert!(!ok.is_empty());
        let bad: Listing<u8> = Listing::degraded(GatewayError::Unauthorized);
        assert!(!bad.is_ok());
        assert!(bad.is_empty());
    }
}
