//! Users, reports and comments. Comments are never cached.

use super::{EntityStore, Listing, StoreError, degraded, failed};
use crate::gateway::Gateway;
use crate::model::{Comment, CommentId, TaskId, User, UserId, UserReport};

impl<G: Gateway> EntityStore<G> {
    pub fn fetch_users(&mut self) -> Listing<User> {
        match self.gateway.list_users() {
            Ok(users) => {
                self.users = users.iter().map(|u| (u.id.clone(), u.clone())).collect();
                Listing::loaded(users)
            }
            Err(e) => degraded("fetch_users", e),
        }
    }

    pub fn fetch_user_report(&mut self, user: &UserId) -> Result<UserReport, StoreError> {
        let report = self
            .gateway
            .user_report(user)
            .map_err(|e| failed("fetch_user_report", e))?;
        self.user_report = Some(report.clone());
        Ok(report)
    }

    pub fn fetch_task_comments(&self, task: &TaskId) -> Listing<Comment> {
        match self.gateway.list_comments(task) {
            Ok(comments) => Listing::loaded(comments),
            Err(e) => degraded("fetch_task_comments", e),
        }
    }

    pub fn add_comment(&self, task: &TaskId, content: &str) -> Result<Comment, StoreError> {
        self.gateway
            .create_comment(task, content)
            .map_err(|e| failed("add_comment", e))
    }

    pub fn update_comment(&self, id: &CommentId, content: &str) -> Result<Comment, StoreError> {
        self.gateway
            .update_comment(id, content)
            .map_err(|e| failed("update_comment", e))
    }

    pub fn delete_comment(&self, id: &CommentId) -> Result<(), StoreError> {
        self.gateway
            .delete_comment(id)
            .map_err(|e| failed("delete_comment", e))
    }
}
