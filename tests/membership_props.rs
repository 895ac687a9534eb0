//! Random sequences of membership operations against the in-memory server.
//! After every step each task must sit in exactly the card its `card_id`
//! names, as an exact copy, and in no other card.

use std::sync::Arc;

use proptest::prelude::*;
use taskboard::gateway::{AuthApi, CardsApi, MemoryGateway, TasksApi};
use taskboard::model::{
    CardId, CardUpdate, Credentials, NewCard, NewProject, NewTask, TaskId, TaskStatus,
};
use taskboard::store::EntityStore;

#[derive(Debug, Clone)]
enum Op {
    Create(Option<usize>),
    SetCard(usize, Option<usize>),
    Assign(usize, usize),
    Unassign(usize, usize),
    Status(usize),
    Rename(usize),
    Delete(usize),
    DeleteCard(usize),
    UpdateCard(usize),
    RefetchTasks,
    RefetchCards,
    Reset,
    ReorderCardTasks(usize, usize, usize),
    // changes made on the server without the store seeing them
    ServerDelete(usize),
    ServerSetCard(usize, Option<usize>),
    ServerAssign(usize, usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => proptest::option::of(0..3usize).prop_map(Op::Create),
        3 => (0..12usize, proptest::option::of(0..3usize)).prop_map(|(t, c)| Op::SetCard(t, c)),
        2 => (0..3usize, 0..12usize).prop_map(|(c, t)| Op::Assign(c, t)),
        2 => (0..3usize, 0..12usize).prop_map(|(c, t)| Op::Unassign(c, t)),
        1 => (0..12usize).prop_map(Op::Status),
        1 => (0..12usize).prop_map(Op::Rename),
        1 => (0..12usize).prop_map(Op::Delete),
        1 => (0..3usize).prop_map(Op::DeleteCard),
        1 => (0..3usize).prop_map(Op::UpdateCard),
        2 => Just(Op::RefetchTasks),
        2 => Just(Op::RefetchCards),
        1 => Just(Op::Reset),
        1 => (0..3usize, 0..4usize, 0..4usize).prop_map(|(c, a, b)| Op::ReorderCardTasks(c, a, b)),
        1 => (0..12usize).prop_map(Op::ServerDelete),
        1 => (0..12usize, proptest::option::of(0..3usize)).prop_map(|(t, c)| Op::ServerSetCard(t, c)),
        1 => (0..3usize, 0..12usize).prop_map(|(c, t)| Op::ServerAssign(c, t)),
    ]
}

struct World {
    gw: Arc<MemoryGateway>,
    store: EntityStore<MemoryGateway>,
    project: taskboard::model::ProjectId,
    cards: Vec<CardId>,
    tasks: Vec<TaskId>,
    /// The task collection holds every server task of the project. False
    /// after a reset until the tasks are fetched again.
    tasks_loaded: bool,
}

impl World {
    fn new() -> Self {
        let gw = Arc::new(MemoryGateway::new());
        gw.add_account("Ada", "ada@example.com", "pw");
        let resp = gw
            .login(&Credentials {
                email: "ada@example.com".into(),
                password: "pw".into(),
            })
            .unwrap();
        gw.set_auth_token(resp.token.as_deref());
        let mut store = EntityStore::new(Arc::clone(&gw));
        let project = store
            .create_project(&NewProject {
                name: "P".into(),
                ..Default::default()
            })
            .unwrap()
            .project
            .id;
        let cards = (0..3)
            .map(|i| {
                store
                    .create_card(&project, &NewCard {
                        title: format!("card {}", i),
                        position: None,
                    })
                    .unwrap()
                    .id
            })
            .collect();
        World {
            gw,
            store,
            project,
            cards,
            tasks: Vec::new(),
            tasks_loaded: true,
        }
    }

    fn task(&self, i: usize) -> Option<TaskId> {
        if self.tasks.is_empty() {
            None
        } else {
            Some(self.tasks[i % self.tasks.len()].clone())
        }
    }

    /// Failed calls are fine; they must simply leave things consistent.
    fn run(&mut self, op: &Op) {
        match op {
            Op::Create(card) => {
                let mut data = NewTask::titled(format!("t{}", self.tasks.len()));
                data.card_id = card.map(|c| self.cards[c].clone());
                if let Ok(task) = self.store.create_task(&self.project, &data) {
                    self.tasks.push(task.id);
                }
            }
            Op::SetCard(t, card) => {
                if let Some(id) = self.task(*t) {
                    let card = card.map(|c| self.cards[c].clone());
                    let _ = self.store.update_task_card(&id, card.as_ref());
                }
            }
            Op::Assign(c, t) => {
                if let Some(id) = self.task(*t) {
                    let _ = self.store.assign_task_to_card(&self.cards[*c], &id);
                }
            }
            Op::Unassign(c, t) => {
                if let Some(id) = self.task(*t) {
                    let _ = self.store.remove_task_from_card(&self.cards[*c], &id);
                }
            }
            Op::Status(t) => {
                if let Some(id) = self.task(*t) {
                    let _ = self.store.update_task_status(&id, TaskStatus::Done);
                }
            }
            Op::Rename(t) => {
                if let Some(task) = self.task(*t).and_then(|id| self.store.task(&id).cloned()) {
                    let mut edited = task;
                    edited.title.push('!');
                    let _ = self.store.update_task(&edited);
                }
            }
            Op::Delete(t) => {
                if let Some(id) = self.task(*t) {
                    let _ = self.store.delete_task(&id);
                }
            }
            Op::DeleteCard(c) => {
                let _ = self.store.delete_card(&self.cards[*c]);
            }
            Op::UpdateCard(c) => {
                let id = &self.cards[*c];
                let position = self.store.card(id).map_or(0, |card| card.position);
                let _ = self.store.update_card(&CardUpdate {
                    id: id.clone(),
                    title: format!("card {} renamed", c),
                    position,
                });
            }
            Op::RefetchTasks => {
                if self.store.fetch_tasks(&self.project).is_ok() {
                    self.tasks_loaded = true;
                }
            }
            Op::RefetchCards => {
                self.store.fetch_cards(&self.project);
            }
            Op::Reset => {
                self.store.reset();
                self.tasks_loaded = false;
            }
            Op::ReorderCardTasks(c, from, to) => {
                let _ = self.store.reorder_card_tasks(&self.cards[*c], *from, *to);
            }
            Op::ServerDelete(t) => {
                if let Some(id) = self.task(*t) {
                    let _ = self.gw.delete_task(&id);
                }
            }
            Op::ServerSetCard(t, card) => {
                if let Some(id) = self.task(*t) {
                    let card = card.map(|c| self.cards[c].clone());
                    let _ = self.gw.set_task_card(&id, card.as_ref());
                }
            }
            Op::ServerAssign(c, t) => {
                if let Some(id) = self.task(*t) {
                    let _ = self.gw.assign_task(&self.cards[*c], &id);
                }
            }
        }
    }

    fn check(&self) -> Result<(), TestCaseError> {
        for task in self.store.tasks() {
            for card in self.store.cards() {
                let copies: Vec<_> = card.tasks.iter().filter(|t| t.id == task.id).collect();
                if task.card_id.as_ref() == Some(&card.id) {
                    prop_assert_eq!(copies.len(), 1, "task {} missing from card {}", task.id, card.id);
                    prop_assert_eq!(copies[0], task);
                } else {
                    prop_assert!(copies.is_empty(), "task {} stray on card {}", task.id, card.id);
                }
            }
        }
        for card in self.store.cards() {
            let mut seen = Vec::new();
            for embedded in &card.tasks {
                prop_assert!(!seen.contains(&&embedded.id), "task {} twice on card {}", embedded.id, card.id);
                seen.push(&embedded.id);
                // once the project's tasks are loaded, nothing gone from the
                // collection may linger on a card
                if self.tasks_loaded {
                    prop_assert!(
                        self.store.task(&embedded.id).is_some(),
                        "unknown task {} on card {}",
                        embedded.id,
                        card.id
                    );
                }
            }
        }
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_task_sits_on_exactly_its_card(ops in proptest::collection::vec(arb_op(), 1..40)) {
        let mut world = World::new();
        for op in &ops {
            world.run(op);
            world.check()?;
        }
    }
}
