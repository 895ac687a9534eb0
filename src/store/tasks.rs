use super::{EntityStore, Listing, StoreError, degraded, failed};
use crate::gateway::Gateway;
use crate::model::{NewTask, ProjectId, Task, TaskId, TaskPriority, TaskStatus, UserId};
use crate::ops::membership::{self, Change};
use crate::ops::reorder;

impl<G> EntityStore<G> {
    /// Store the server's copy of a task and bring the card lists along.
    /// The prior card comes from the cached copy; an uncached task is
    /// located by scanning the cards.
    pub(super) fn merge_task(&mut self, task: &Task) {
        let prior = self
            .tasks
            .insert(task.id.clone(), task.clone())
            .map(|old| old.card_id);
        let change = match &prior {
            Some(from) if from != &task.card_id => Change::Move {
                task,
                from: from.as_ref(),
            },
            _ => Change::Replace(task),
        };
        membership::apply(&mut self.cards, change);
    }

    /// Move a task within the task list. Local only.
    ///
    /// Positions count across every cached task, in load order, so with more
    /// than one project loaded they are not a single project's positions.
    /// Use [`reorder_project_tasks`](Self::reorder_project_tasks) for that.
    pub fn reorder_tasks(&mut self, from: usize, to: usize) -> Result<(), StoreError> {
        reorder::move_entry(&mut self.tasks, from, to)?;
        Ok(())
    }

    /// Move a task among one project's tasks. Positions count only that
    /// project's tasks; tasks of other projects keep their relative order.
    pub fn reorder_project_tasks(
        &mut self,
        project: &ProjectId,
        from: usize,
        to: usize,
    ) -> Result<(), StoreError> {
        reorder::move_entry_where(&mut self.tasks, |t| &t.project_id == project, from, to)?;
        Ok(())
    }
}

impl<G: Gateway> EntityStore<G> {
    /// Replace the cached tasks of one project and rebuild the card lists
    pub fn fetch_tasks(&mut self, project: &ProjectId) -> Listing<Task> {
        match self.gateway.list_tasks(project) {
            Ok(tasks) => {
                self.tasks.retain(|_, t| &t.project_id != project);
                self.tasks
                    .extend(tasks.iter().map(|t| (t.id.clone(), t.clone())));
                membership::forget_missing(&mut self.cards, project, &self.tasks);
                membership::reconcile(&mut self.cards, &self.tasks);
                Listing::loaded(tasks)
            }
            Err(e) => degraded("fetch_tasks", e),
        }
    }

    pub fn fetch_task(&mut self, id: &TaskId) -> Result<Task, StoreError> {
        let task = self
            .gateway
            .get_task(id)
            .map_err(|e| failed("fetch_task", e))?;
        self.merge_task(&task);
        Ok(task)
    }

    pub fn create_task(&mut self, project: &ProjectId, data: &NewTask) -> Result<Task, StoreError> {
        let task = self
            .gateway
            .create_task(project, data)
            .map_err(|e| failed("create_task", e))?;
        self.tasks.insert(task.id.clone(), task.clone());
        membership::apply(&mut self.cards, Change::Insert(&task));
        Ok(task)
    }

    pub fn update_task(&mut self, task: &Task) -> Result<Task, StoreError> {
        let updated = self
            .gateway
            .update_task(task)
            .map_err(|e| failed("update_task", e))?;
        self.merge_task(&updated);
        Ok(updated)
    }

    pub fn update_task_status(
        &mut self,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, StoreError> {
        let updated = self
            .gateway
            .set_task_status(id, status)
            .map_err(|e| failed("update_task_status", e))?;
        self.merge_task(&updated);
        Ok(updated)
    }

    pub fn update_task_priority(
        &mut self,
        id: &TaskId,
        priority: TaskPriority,
    ) -> Result<Task, StoreError> {
        let updated = self
            .gateway
            .set_task_priority(id, priority)
            .map_err(|e| failed("update_task_priority", e))?;
        self.merge_task(&updated);
        Ok(updated)
    }

    /// Assign (or with `None`, unassign) a user. Sent as a full task update,
    /// so an uncached task is fetched first.
    pub fn update_task_assigned_user(
        &mut self,
        id: &TaskId,
        user: Option<&UserId>,
    ) -> Result<Task, StoreError> {
        let mut task = match self.tasks.get(id) {
            Some(task) => task.clone(),
            None => self.fetch_task(id)?,
        };
        task.assigned_user_id = user.cloned();
        self.update_task(&task)
    }

    pub fn delete_task(&mut self, id: &TaskId) -> Result<(), StoreError> {
        self.gateway
            .delete_task(id)
            .map_err(|e| failed("delete_task", e))?;
        self.tasks.shift_remove(id);
        membership::apply(&mut self.cards, Change::Remove(id));
        Ok(())
    }

    /// File a task under a card, or under none
    pub fn update_task_card(
        &mut self,
        id: &TaskId,
        card: Option<&crate::model::CardId>,
    ) -> Result<Task, StoreError> {
        let updated = self
            .gateway
            .set_task_card(id, card)
            .map_err(|e| failed("update_task_card", e))?;
        self.merge_task(&updated);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::logged_in_store;
    use super::*;
    use crate::gateway::{GatewayError, MemoryGateway, TasksApi};
    use crate::model::{Card, CardId, NewCard, NewProject, Project};
    use crate::ops::membership::violations;
    use crate::ops::reorder::ReorderError;
    use pretty_assertions::assert_eq;

    struct Board {
        gw: std::sync::Arc<MemoryGateway>,
        store: EntityStore<MemoryGateway>,
        project: Project,
        todo: Card,
        done: Card,
    }

    fn board() -> Board {
        let (gw, mut store) = logged_in_store();
        let project = store
            .create_project(&NewProject {
                name: "P".into(),
                ..Default::default()
            })
            .unwrap()
            .project;
        let mut card = |title: &str| {
            store
                .create_card(&project.id, &NewCard {
                    title: title.into(),
                    position: None,
                })
                .unwrap()
        };
        let todo = card("Todo");
        let done = card("Done");
        Board {
            gw,
            store,
            project,
            todo,
            done,
        }
    }

    fn on_card(store: &EntityStore<MemoryGateway>, card: &CardId) -> Vec<TaskId> {
        store.card(card).unwrap().task_ids().cloned().collect()
    }

    fn consistent(store: &EntityStore<MemoryGateway>) {
        assert_eq!(
            violations(store.card_collection(), store.task_collection()),
            vec![]
        );
    }

    impl Board {
        fn task_on(&mut self, title: &str, card: Option<&CardId>) -> Task {
            let mut data = NewTask::titled(title);
            data.card_id = card.cloned();
            self.store.create_task(&self.project.id, &data).unwrap()
        }
    }

    #[test]
    fn create_places_task_on_its_card() {
        let mut b = board();
        let todo = b.todo.id.clone();
        let a = b.task_on("a", Some(&todo));
        let loose = b.task_on("loose", None);

        assert_eq!(on_card(&b.store, &todo), vec![a.id.clone()]);
        assert_eq!(b.store.tasks().len(), 2);
        assert_eq!(b.store.unlisted_tasks(&b.project.id)[0].id, loose.id);
        consistent(&b.store);
    }

    #[test]
    fn status_change_propagates_in_place() {
        let mut b = board();
        let todo = b.todo.id.clone();
        let a = b.task_on("a", Some(&todo));
        let c = b.task_on("c", Some(&todo));

        b.store.update_task_status(&a.id, TaskStatus::Done).unwrap();
        b.store
            .update_task_priority(&c.id, TaskPriority::High)
            .unwrap();

        let card = b.store.card(&todo).unwrap();
        assert_eq!(card.tasks[0].status, TaskStatus::Done);
        assert_eq!(card.tasks[1].priority, TaskPriority::High);
        assert_eq!(on_card(&b.store, &todo), vec![a.id, c.id]);
        consistent(&b.store);
    }

    #[test]
    fn full_update_with_new_card_moves_task() {
        let mut b = board();
        let (todo, done) = (b.todo.id.clone(), b.done.id.clone());
        let a = b.task_on("a", Some(&todo));

        let mut edited = a.clone();
        edited.title = "a2".into();
        edited.card_id = Some(done.clone());
        b.store.update_task(&edited).unwrap();

        assert!(on_card(&b.store, &todo).is_empty());
        assert_eq!(b.store.card(&done).unwrap().tasks, vec![edited]);
        consistent(&b.store);
    }

    #[test]
    fn update_task_card_moves_and_unfiles() {
        let mut b = board();
        let (todo, done) = (b.todo.id.clone(), b.done.id.clone());
        let a = b.task_on("a", Some(&todo));

        let moved = b.store.update_task_card(&a.id, Some(&done)).unwrap();
        assert_eq!(moved.card_id, Some(done.clone()));
        assert!(on_card(&b.store, &todo).is_empty());
        assert_eq!(on_card(&b.store, &done), vec![a.id.clone()]);

        b.store.update_task_card(&a.id, None).unwrap();
        assert!(on_card(&b.store, &done).is_empty());
        assert_eq!(b.store.task(&a.id).unwrap().card_id, None);
        consistent(&b.store);
    }

    #[test]
    fn assigned_user_fetches_cold_task_first() {
        let mut b = board();
        let todo = b.todo.id.clone();
        // created on the server only
        let mut data = NewTask::titled("cold");
        data.card_id = Some(todo.clone());
        let cold = b.gw.create_task(&b.project.id, &data).unwrap();
        let ada = crate::model::UserId::from(1);

        let updated = b
            .store
            .update_task_assigned_user(&cold.id, Some(&ada))
            .unwrap();
        assert_eq!(updated.assigned_user_id, Some(ada));
        assert_eq!(b.store.card(&todo).unwrap().tasks, vec![updated]);
        let calls = b.gw.calls();
        assert_eq!(&calls[calls.len() - 2..], ["get_task", "update_task"]);

        let cleared = b.store.update_task_assigned_user(&cold.id, None).unwrap();
        assert_eq!(cleared.assigned_user_id, None);
    }

    #[test]
    fn delete_removes_everywhere() {
        let mut b = board();
        let todo = b.todo.id.clone();
        let a = b.task_on("a", Some(&todo));
        let c = b.task_on("c", Some(&todo));

        b.store.delete_task(&a.id).unwrap();
        assert!(b.store.task(&a.id).is_none());
        assert_eq!(on_card(&b.store, &todo), vec![c.id]);
        consistent(&b.store);
    }

    #[test]
    fn failed_write_leaves_cache_alone() {
        let mut b = board();
        let todo = b.todo.id.clone();
        let a = b.task_on("a", Some(&todo));
        b.gw.fail_operation("set_task_card");

        let err = b.store.update_task_card(&a.id, None).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Gateway(GatewayError::Rejected { status: 500, .. })
        ));
        assert_eq!(b.store.task(&a.id), Some(&a));
        assert_eq!(on_card(&b.store, &todo), vec![a.id]);
    }

    #[test]
    fn fetch_replaces_only_that_project() {
        let mut b = board();
        let todo = b.todo.id.clone();
        let other = b
            .store
            .create_project(&NewProject {
                name: "Other".into(),
                ..Default::default()
            })
            .unwrap()
            .project;
        let keep = b
            .store
            .create_task(&other.id, &NewTask::titled("keep"))
            .unwrap();
        let a = b.task_on("a", Some(&todo));
        // changed behind the store's back
        b.gw.set_task_card(&a.id, None).unwrap();

        let listing = b.store.fetch_tasks(&b.project.id);
        assert_eq!(listing.items.len(), 1);
        assert!(b.store.task(&keep.id).is_some());
        assert!(on_card(&b.store, &todo).is_empty());
        consistent(&b.store);

        b.gw.set_offline(true);
        let listing = b.store.fetch_tasks(&b.project.id);
        assert!(listing.is_empty());
        assert!(listing.failure.is_some());
        assert_eq!(b.store.tasks().len(), 2);
    }

    #[test]
    fn fetch_drops_tasks_deleted_on_the_server() {
        let mut b = board();
        let todo = b.todo.id.clone();
        let gone = b.task_on("gone", Some(&todo));
        let kept = b.task_on("kept", Some(&todo));
        b.gw.delete_task(&gone.id).unwrap();

        let listing = b.store.fetch_tasks(&b.project.id);
        assert_eq!(listing.items, vec![kept.clone()]);
        assert!(b.store.task(&gone.id).is_none());
        assert_eq!(on_card(&b.store, &todo), vec![kept.id]);
        consistent(&b.store);
    }

    #[test]
    fn project_reorder_skips_other_projects() {
        let mut b = board();
        let other = b
            .store
            .create_project(&NewProject {
                name: "Other".into(),
                ..Default::default()
            })
            .unwrap()
            .project;
        let a = b.task_on("a", None);
        let x = b
            .store
            .create_task(&other.id, &NewTask::titled("x"))
            .unwrap();
        let c = b.task_on("c", None);
        let d = b.task_on("d", None);

        b.store.reorder_project_tasks(&b.project.id, 0, 2).unwrap();
        let order: Vec<TaskId> = b.store.tasks().map(|t| t.id.clone()).collect();
        assert_eq!(order, vec![x.id.clone(), c.id.clone(), d.id.clone(), a.id.clone()]);

        b.store.reorder_project_tasks(&b.project.id, 2, 0).unwrap();
        let mine: Vec<TaskId> = b
            .store
            .tasks()
            .filter(|t| t.project_id == b.project.id)
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(mine, vec![a.id, c.id, d.id]);

        assert!(matches!(
            b.store.reorder_project_tasks(&other.id, 0, 1),
            Err(StoreError::InvalidPosition(ReorderError::OutOfRange { index: 1, len: 1 }))
        ));
    }

    #[test]
    fn reorder_is_local_and_reversible() {
        let mut b = board();
        let ids: Vec<TaskId> = ["a", "b", "c"]
            .iter()
            .map(|t| b.task_on(t, None).id)
            .collect();
        let calls = b.gw.calls().len();

        b.store.reorder_tasks(0, 2).unwrap();
        let order: Vec<TaskId> = b.store.tasks().map(|t| t.id.clone()).collect();
        assert_eq!(order, vec![ids[1].clone(), ids[2].clone(), ids[0].clone()]);

        b.store.reorder_tasks(2, 0).unwrap();
        let order: Vec<TaskId> = b.store.tasks().map(|t| t.id.clone()).collect();
        assert_eq!(order, ids);
        assert_eq!(b.gw.calls().len(), calls);

        assert!(matches!(
            b.store.reorder_tasks(0, 3),
            Err(StoreError::InvalidPosition(ReorderError::OutOfRange { index: 3, len: 3 }))
        ));
    }
}
