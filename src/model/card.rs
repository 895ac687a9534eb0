use serde::{Deserialize, Serialize};

use super::id::{CardId, ProjectId, TaskId};
use super::task::Task;

/// A board column. `tasks` is the embedded, ordered projection of the tasks
/// filed under this card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub project_id: ProjectId,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Card {
    /// Whether `task_id` is embedded in this card
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.tasks.iter().any(|t| &t.id == task_id)
    }

    /// Ids of the embedded tasks, in display order
    pub fn task_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.iter().map(|t| &t.id)
    }
}

/// Payload for creating a card inside a project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewCard {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

/// Payload for updating a card's own fields. The embedded task list is never
/// sent; the server owns membership through the assign/remove calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardUpdate {
    pub id: CardId,
    pub title: String,
    pub position: i64,
}

impl From<&Card> for CardUpdate {
    fn from(card: &Card) -> Self {
        CardUpdate {
            id: card.id.clone(),
            title: card.title.clone(),
            position: card.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_without_tasks_field_deserializes_empty() {
        let card: Card =
            serde_json::from_str(r#"{"id": 1, "project_id": 2, "name": "Doing"}"#).unwrap();
        assert_eq!(card.title, "Doing");
        assert_eq!(card.position, 0);
        assert!(card.tasks.is_empty());
    }

    #[test]
    fn card_update_carries_no_tasks() {
        let card: Card = serde_json::from_str(
            r#"{"id": 1, "project_id": 2, "title": "Doing", "position": 3,
                "tasks": [{"id": 9, "project_id": 2, "title": "x", "card_id": 1}]}"#,
        )
        .unwrap();
        assert!(card.contains(&TaskId::from(9)));
        let body = serde_json::to_value(CardUpdate::from(&card)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"id": 1, "title": "Doing", "position": 3})
        );
    }
}
