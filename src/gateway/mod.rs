//! Remote gateway: one resource operation per call, no entity state.
//!
//! Each resource family is its own capability trait so callers and fakes can
//! be written against the narrowest surface they need. [`Gateway`] is the
//! union and is implemented automatically.

pub mod http;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use crate::model::{
    Card, CardId, CardUpdate, Comment, CommentId, Credentials, LoginResponse, NewCard, NewProject,
    NewTask, Permission, Project, ProjectId, ProjectMember, ProjectReport, Registration, Task,
    TaskId, TaskPriority, TaskStatus, User, UserId, UserReport,
};

pub use http::HttpGateway;
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryGateway;

/// Error type for gateway calls
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("could not reach server: {0}")]
    Transport(String),
    #[error("not authorized")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Classify a non-2xx response
    pub fn from_status(status: u16, body: &str, path: &str) -> Self {
        match status {
            401 | 403 => GatewayError::Unauthorized,
            404 => GatewayError::NotFound(path.to_string()),
            _ => GatewayError::Rejected {
                status,
                message: error_message(body),
            },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GatewayError::Unauthorized)
    }
}

/// Pull a human message out of an error body: `{"message": ...}`,
/// `{"error": ...}`, or the raw text.
fn error_message(body: &str) -> String {
    let body = body.trim();
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(serde_json::Value::String(msg)) = map.get(key) {
                return msg.clone();
            }
        }
    }
    if body.is_empty() {
        "no details".to_string()
    } else {
        body.to_string()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

pub trait ProjectsApi {
    fn list_projects(&self) -> GatewayResult<Vec<Project>>;
    fn get_project(&self, id: &ProjectId) -> GatewayResult<Project>;
    fn create_project(&self, data: &NewProject) -> GatewayResult<Project>;
    fn update_project(&self, project: &Project) -> GatewayResult<Project>;
    fn delete_project(&self, id: &ProjectId) -> GatewayResult<()>;
    fn list_members(&self, project: &ProjectId) -> GatewayResult<Vec<ProjectMember>>;
    fn assign_member(
        &self,
        project: &ProjectId,
        user: &UserId,
        permissions: &[Permission],
    ) -> GatewayResult<ProjectMember>;
    fn update_member_permissions(
        &self,
        project: &ProjectId,
        user: &UserId,
        permissions: &[Permission],
    ) -> GatewayResult<ProjectMember>;
    fn remove_member(&self, project: &ProjectId, user: &UserId) -> GatewayResult<()>;
}

pub trait TasksApi {
    fn list_tasks(&self, project: &ProjectId) -> GatewayResult<Vec<Task>>;
    fn get_task(&self, id: &TaskId) -> GatewayResult<Task>;
    fn create_task(&self, project: &ProjectId, data: &NewTask) -> GatewayResult<Task>;
    fn update_task(&self, task: &Task) -> GatewayResult<Task>;
    fn delete_task(&self, id: &TaskId) -> GatewayResult<()>;
    fn set_task_priority(&self, id: &TaskId, priority: TaskPriority) -> GatewayResult<Task>;
    fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> GatewayResult<Task>;
    fn set_task_card(&self, id: &TaskId, card: Option<&CardId>) -> GatewayResult<Task>;
}

pub trait CardsApi {
    fn list_cards(&self, project: &ProjectId) -> GatewayResult<Vec<Card>>;
    fn create_card(&self, project: &ProjectId, data: &NewCard) -> GatewayResult<Card>;
    fn get_card(&self, id: &CardId) -> GatewayResult<Card>;
    fn update_card(&self, data: &CardUpdate) -> GatewayResult<Card>;
    fn delete_card(&self, id: &CardId) -> GatewayResult<()>;
    fn assign_task(&self, card: &CardId, task: &TaskId) -> GatewayResult<Task>;
    fn remove_task(&self, card: &CardId, task: &TaskId) -> GatewayResult<Task>;
}

pub trait CommentsApi {
    fn list_comments(&self, task: &TaskId) -> GatewayResult<Vec<Comment>>;
    fn create_comment(&self, task: &TaskId, content: &str) -> GatewayResult<Comment>;
    fn update_comment(&self, id: &CommentId, content: &str) -> GatewayResult<Comment>;
    fn delete_comment(&self, id: &CommentId) -> GatewayResult<()>;
}

pub trait ReportsApi {
    fn project_report(&self, project: &ProjectId) -> GatewayResult<ProjectReport>;
    fn user_report(&self, user: &UserId) -> GatewayResult<UserReport>;
}

pub trait AuthApi {
    fn register(&self, data: &Registration) -> GatewayResult<User>;
    fn login(&self, credentials: &Credentials) -> GatewayResult<LoginResponse>;
    /// Attach (`Some`) or detach (`None`) the token sent with every later call
    fn set_auth_token(&self, token: Option<&str>);
}

pub trait UsersApi {
    fn list_users(&self) -> GatewayResult<Vec<User>>;
}

/// Every capability the store and session need
pub trait Gateway:
    ProjectsApi + TasksApi + CardsApi + CommentsApi + ReportsApi + AuthApi + UsersApi
{
}

impl<T> Gateway for T where
    T: ProjectsApi + TasksApi + CardsApi + CommentsApi + ReportsApi + AuthApi + UsersApi
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            GatewayError::from_status(401, "", "/projects"),
            GatewayError::Unauthorized
        );
        assert_eq!(
            GatewayError::from_status(403, "", "/projects"),
            GatewayError::Unauthorized
        );
        assert_eq!(
            GatewayError::from_status(404, "", "/tasks/9"),
            GatewayError::NotFound("/tasks/9".into())
        );
        assert_eq!(
            GatewayError::from_status(422, r#"{"message": "title is required"}"#, "/tasks"),
            GatewayError::Rejected {
                status: 422,
                message: "title is required".into()
            }
        );
    }

    #[test]
    fn error_message_fallbacks() {
        assert_eq!(error_message(r#"{"error": "boom"}"#), "boom");
        assert_eq!(error_message("plain failure"), "plain failure");
        assert_eq!(error_message("   "), "no details");
    }
}
