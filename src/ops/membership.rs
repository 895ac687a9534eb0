//! Keeps each card's embedded task list in line with the task collection.
//!
//! Every rule takes the whole card collection by `&mut` and finishes its
//! work before returning. A move is therefore a single update: no caller can
//! observe the task on both cards, or on neither, in between.

use indexmap::IndexMap;

use crate::model::card::Card;
use crate::model::id::{CardId, ProjectId, TaskId};
use crate::model::task::Task;

/// A task-side change the card view has to absorb
#[derive(Debug, Clone, Copy)]
pub enum Change<'a> {
    /// A task that was just created
    Insert(&'a Task),
    /// Fresh fields for a task whose card may or may not have changed.
    /// The current holder is found by scanning the cards.
    Replace(&'a Task),
    /// The task's card changed; `from` is its card before the change
    Move {
        task: &'a Task,
        from: Option<&'a CardId>,
    },
    /// The task was deleted
    Remove(&'a TaskId),
}

/// Apply one change to the card collection
pub fn apply(cards: &mut IndexMap<CardId, Card>, change: Change<'_>) {
    match change {
        Change::Insert(task) => place(cards, task),
        Change::Replace(task) => {
            let holder = holder_of(cards, &task.id).cloned();
            if holder.as_ref() != task.card_id.as_ref()
                && let Some(holder) = holder
            {
                detach(cards, &holder, &task.id);
            }
            place(cards, task);
        }
        Change::Move { task, from } => {
            if let Some(from) = from
                && Some(from) != task.card_id.as_ref()
            {
                detach(cards, from, &task.id);
            }
            place(cards, task);
        }
        Change::Remove(task_id) => {
            for card in cards.values_mut() {
                card.tasks.retain(|t| &t.id != task_id);
            }
        }
    }
}

/// Rebuild every card's list against the task collection.
///
/// Embedded tasks that the collection knows are overwritten with the
/// collection's copy and dropped if they now belong elsewhere. Embedded
/// tasks the collection has never seen are kept as they are. Tasks filed
/// under a card but missing from its list are appended in collection order.
pub fn reconcile(cards: &mut IndexMap<CardId, Card>, tasks: &IndexMap<TaskId, Task>) {
    for card in cards.values_mut() {
        card.tasks.retain_mut(|embedded| match tasks.get(&embedded.id) {
            Some(task) if task.card_id.as_ref() == Some(&card.id) => {
                *embedded = task.clone();
                true
            }
            Some(_) => false,
            None => true,
        });
        for task in tasks.values() {
            if task.card_id.as_ref() == Some(&card.id) && !card.contains(&task.id) {
                card.tasks.push(task.clone());
            }
        }
    }
}

/// Drop embedded tasks of `project` that the collection no longer holds.
/// Run after the project's tasks were replaced wholesale: anything of that
/// project still embedded but absent is gone on the server. Unknown tasks of
/// other projects are left alone.
pub fn forget_missing(
    cards: &mut IndexMap<CardId, Card>,
    project: &ProjectId,
    tasks: &IndexMap<TaskId, Task>,
) {
    for card in cards.values_mut() {
        card.tasks
            .retain(|t| &t.project_id != project || tasks.contains_key(&t.id));
    }
}

/// A disagreement between the task collection and the card lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Task is filed under an existing card but missing from its list
    Missing { task: TaskId, card: CardId },
    /// Task is embedded in a card other than its own
    Stray { task: TaskId, card: CardId },
    /// Task appears more than once in a card
    Duplicate { task: TaskId, card: CardId },
    /// Embedded copy differs from the collection's copy
    Stale { task: TaskId, card: CardId },
}

/// List every way the card lists disagree with the task collection.
/// Cards that no longer exist and tasks the collection has never seen are
/// not violations.
pub fn violations(cards: &IndexMap<CardId, Card>, tasks: &IndexMap<TaskId, Task>) -> Vec<Violation> {
    let mut found = Vec::new();
    for card in cards.values() {
        for (i, embedded) in card.tasks.iter().enumerate() {
            if card.tasks[..i].iter().any(|t| t.id == embedded.id) {
                found.push(Violation::Duplicate {
                    task: embedded.id.clone(),
                    card: card.id.clone(),
                });
                continue;
            }
            let Some(task) = tasks.get(&embedded.id) else {
                continue;
            };
            if task.card_id.as_ref() != Some(&card.id) {
                found.push(Violation::Stray {
                    task: task.id.clone(),
                    card: card.id.clone(),
                });
            } else if task != embedded {
                found.push(Violation::Stale {
                    task: task.id.clone(),
                    card: card.id.clone(),
                });
            }
        }
    }
    for task in tasks.values() {
        if let Some(card_id) = &task.card_id
            && let Some(card) = cards.get(card_id)
            && !card.contains(&task.id)
        {
            found.push(Violation::Missing {
                task: task.id.clone(),
                card: card_id.clone(),
            });
        }
    }
    found
}

fn holder_of<'a>(cards: &'a IndexMap<CardId, Card>, task_id: &TaskId) -> Option<&'a CardId> {
    cards
        .values()
        .find(|c| c.contains(task_id))
        .map(|c| &c.id)
}

fn detach(cards: &mut IndexMap<CardId, Card>, card_id: &CardId, task_id: &TaskId) {
    if let Some(card) = cards.get_mut(card_id) {
        card.tasks.retain(|t| &t.id != task_id);
    }
}

/// Overwrite the task in place in its card, or append it there.
/// A task with no card (or an unknown card) is placed nowhere.
fn place(cards: &mut IndexMap<CardId, Card>, task: &Task) {
    let Some(card) = task.card_id.as_ref().and_then(|id| cards.get_mut(id)) else {
        return;
    };
    match card.tasks.iter_mut().find(|t| t.id == task.id) {
        Some(slot) => *slot = task.clone(),
        None => card.tasks.push(task.clone()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
