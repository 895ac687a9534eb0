use super::{EntityStore, Listing, StoreError, degraded, failed};
use crate::gateway::Gateway;
use crate::model::{Card, CardId, CardUpdate, NewCard, ProjectId, Task, TaskId};
use crate::ops::{membership, reorder};

impl<G> EntityStore<G> {
    /// Move a card on the board. Local only.
    pub fn reorder_cards(&mut self, from: usize, to: usize) -> Result<(), StoreError> {
        reorder::move_entry(&mut self.cards, from, to)?;
        Ok(())
    }

    /// Move a task within one card's list. Local only.
    pub fn reorder_card_tasks(
        &mut self,
        card: &CardId,
        from: usize,
        to: usize,
    ) -> Result<(), StoreError> {
        let card = self.cards.get_mut(card).ok_or_else(|| StoreError::NotLoaded {
            kind: "card",
            id: card.to_string(),
        })?;
        reorder::move_item(&mut card.tasks, from, to)?;
        Ok(())
    }
}

impl<G: Gateway> EntityStore<G> {
    /// Replace the cached cards of one project. Embedded tasks are then
    /// overwritten from the task collection where it knows them.
    pub fn fetch_cards(&mut self, project: &ProjectId) -> Listing<Card> {
        match self.gateway.list_cards(project) {
            Ok(cards) => {
                self.cards.retain(|_, c| &c.project_id != project);
                self.cards
                    .extend(cards.iter().map(|c| (c.id.clone(), c.clone())));
                membership::reconcile(&mut self.cards, &self.tasks);
                Listing::loaded(cards)
            }
            Err(e) => degraded("fetch_cards", e),
        }
    }

    /// Read one card from the server without caching it
    pub fn fetch_card(&self, id: &CardId) -> Result<Card, StoreError> {
        self.gateway
            .get_card(id)
            .map_err(|e| failed("fetch_card", e))
    }

    pub fn create_card(&mut self, project: &ProjectId, data: &NewCard) -> Result<Card, StoreError> {
        let card = self
            .gateway
            .create_card(project, data)
            .map_err(|e| failed("create_card", e))?;
        self.cards.insert(card.id.clone(), card.clone());
        Ok(card)
    }

    /// Update a card's own fields. Its task list is kept, since the server
    /// does not send one back. A card seen here for the first time gets its
    /// list from the task collection.
    pub fn update_card(&mut self, data: &CardUpdate) -> Result<Card, StoreError> {
        let updated = self
            .gateway
            .update_card(data)
            .map_err(|e| failed("update_card", e))?;
        let id = updated.id.clone();
        match self.cards.get_mut(&id) {
            Some(card) => {
                card.title = updated.title;
                card.position = updated.position;
            }
            None => {
                self.cards.insert(id.clone(), updated);
                membership::reconcile(&mut self.cards, &self.tasks);
            }
        }
        self.cards.get(&id).cloned().ok_or(StoreError::NotLoaded {
            kind: "card",
            id: id.to_string(),
        })
    }

    /// Delete a card. Its tasks stay in the task collection.
    pub fn delete_card(&mut self, id: &CardId) -> Result<(), StoreError> {
        self.gateway
            .delete_card(id)
            .map_err(|e| failed("delete_card", e))?;
        self.cards.shift_remove(id);
        Ok(())
    }

    pub fn assign_task_to_card(&mut self, card: &CardId, task: &TaskId) -> Result<Task, StoreError> {
        let updated = self
            .gateway
            .assign_task(card, task)
            .map_err(|e| failed("assign_task_to_card", e))?;
        self.merge_task(&updated);
        Ok(updated)
    }

    pub fn remove_task_from_card(
        &mut self,
        card: &CardId,
        task: &TaskId,
    ) -> Result<Task, StoreError> {
        let updated = self
            .gateway
            .remove_task(card, task)
            .map_err(|e| failed("remove_task_from_card", e))?;
        self.merge_task(&updated);
        Ok(updated)
    }
}
