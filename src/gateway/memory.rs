//! In-process stand-in for the remote service.
//!
//! Behaves like the real API closely enough to drive the store end to end:
//! it assigns ids, enforces the session token, embeds tasks in cards on
//! read, and can be told to fail specific operations.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use serde_json::Value;

use super::{
    AuthApi, CardsApi, CommentsApi, GatewayError, GatewayResult, ProjectsApi, ReportsApi,
    TasksApi, UsersApi,
};
use crate::model::{
    Card, CardId, CardUpdate, Comment, CommentId, Credentials, LoginResponse, NewCard, NewProject,
    NewTask, Permission, Project, ProjectId, ProjectMember, ProjectReport, Registration, Task,
    TaskId, TaskPriority, TaskStatus, User, UserId, UserReport,
};

#[derive(Default)]
struct ServerState {
    next_id: i64,
    projects: IndexMap<ProjectId, Project>,
    members: HashMap<ProjectId, Vec<ProjectMember>>,
    tasks: IndexMap<TaskId, Task>,
    cards: IndexMap<CardId, Card>,
    comments: IndexMap<CommentId, Comment>,
    users: IndexMap<UserId, User>,
    /// email -> (password, user)
    accounts: HashMap<String, (String, UserId)>,
    issued_tokens: HashMap<String, UserId>,
    attached_token: Option<String>,

    offline: bool,
    omit_login_token: bool,
    failing_ops: HashSet<String>,
    rejected_members: HashSet<UserId>,
    calls: Vec<String>,
}

impl ServerState {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn card_with_tasks(&self, card: &Card) -> Card {
        let mut out = card.clone();
        out.tasks = self
            .tasks
            .values()
            .filter(|t| t.card_id.as_ref() == Some(&card.id))
            .cloned()
            .collect();
        out
    }

    fn task_mut(&mut self, id: &TaskId) -> GatewayResult<&mut Task> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(format!("/tasks/{}", id)))
    }
}

#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<ServerState>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record the call and apply the configured failure modes. Calls that
    /// need a session are rejected unless a token we issued is attached.
    fn begin(&self, op: &str, needs_auth: bool) -> GatewayResult<MutexGuard<'_, ServerState>> {
        let mut state = self.lock();
        state.calls.push(op.to_string());
        if state.offline {
            return Err(GatewayError::Transport("connection refused".into()));
        }
        if state.failing_ops.contains(op) {
            return Err(GatewayError::Rejected {
                status: 500,
                message: format!("{} failed", op),
            });
        }
        if needs_auth {
            let authorized = state
                .attached_token
                .as_ref()
                .is_some_and(|t| state.issued_tokens.contains_key(t));
            if !authorized {
                return Err(GatewayError::Unauthorized);
            }
        }
        Ok(state)
    }

    // -----------------------------------------------------------------------
    // Test controls
    // -----------------------------------------------------------------------

    /// Create an account that can log in. Returns its user id.
    pub fn add_account(&self, name: &str, email: &str, password: &str) -> UserId {
        let mut state = self.lock();
        let id = UserId::from(state.next());
        state.users.insert(
            id.clone(),
            User {
                id: id.clone(),
                name: name.to_string(),
                email: email.to_string(),
            },
        );
        state
            .accounts
            .insert(email.to_string(), (password.to_string(), id.clone()));
        id
    }

    /// Every call fails with a transport error while offline
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Answer successful logins without a `token` field
    pub fn omit_login_token(&self, omit: bool) {
        self.lock().omit_login_token = omit;
    }

    /// Make every call of the named operation fail with a 500
    pub fn fail_operation(&self, op: &str) {
        self.lock().failing_ops.insert(op.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_ops.clear();
        state.rejected_members.clear();
        state.offline = false;
    }

    /// Reject member assignments for this user with a 422
    pub fn reject_member(&self, user: &UserId) {
        self.lock().rejected_members.insert(user.clone());
    }

    /// Operation names in call order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn attached_token(&self) -> Option<String> {
        self.lock().attached_token.clone()
    }

    /// Server-side view of a task, bypassing auth
    pub fn server_task(&self, id: &TaskId) -> Option<Task> {
        self.lock().tasks.get(id).cloned()
    }

    /// Server-side view of a card with its tasks embedded, bypassing auth
    pub fn server_card(&self, id: &CardId) -> Option<Card> {
        let state = self.lock();
        state.cards.get(id).map(|c| state.card_with_tasks(c))
    }
}

impl ProjectsApi for MemoryGateway {
    fn list_projects(&self) -> GatewayResult<Vec<Project>> {
        let state = self.begin("list_projects", true)?;
        Ok(state.projects.values().cloned().collect())
    }

    fn get_project(&self, id: &ProjectId) -> GatewayResult<Project> {
        let state = self.begin("get_project", true)?;
        state
            .projects
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("/projects/{}", id)))
    }

    fn create_project(&self, data: &NewProject) -> GatewayResult<Project> {
        let mut state = self.begin("create_project", true)?;
        if data.name.trim().is_empty() {
            return Err(GatewayError::Rejected {
                status: 422,
                message: "name is required".into(),
            });
        }
        let project = Project {
            id: ProjectId::from(state.next()),
            name: data.name.clone(),
            description: data.description.clone(),
        };
        state.projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    fn update_project(&self, project: &Project) -> GatewayResult<Project> {
        let mut state = self.begin("update_project", true)?;
        let slot = state
            .projects
            .get_mut(&project.id)
            .ok_or_else(|| GatewayError::NotFound(format!("/projects/{}", project.id)))?;
        *slot = project.clone();
        Ok(project.clone())
    }

    fn delete_project(&self, id: &ProjectId) -> GatewayResult<()> {
        let mut state = self.begin("delete_project", true)?;
        if state.projects.shift_remove(id).is_none() {
            return Err(GatewayError::NotFound(format!("/projects/{}", id)));
        }
        state.members.remove(id);
        state.tasks.retain(|_, t| &t.project_id != id);
        state.cards.retain(|_, c| &c.project_id != id);
        Ok(())
    }

    fn list_members(&self, project: &ProjectId) -> GatewayResult<Vec<ProjectMember>> {
        let state = self.begin("list_members", true)?;
        if !state.projects.contains_key(project) {
            return Err(GatewayError::NotFound(format!("/projects/{}", project)));
        }
        Ok(state.members.get(project).cloned().unwrap_or_default())
    }

    fn assign_member(
        &self,
        project: &ProjectId,
        user: &UserId,
        permissions: &[Permission],
    ) -> GatewayResult<ProjectMember> {
        let mut state = self.begin("assign_member", true)?;
        if state.rejected_members.contains(user) {
            return Err(GatewayError::Rejected {
                status: 422,
                message: format!("user {} cannot join", user),
            });
        }
        if !state.projects.contains_key(project) {
            return Err(GatewayError::NotFound(format!("/projects/{}", project)));
        }
        let user = state
            .users
            .get(user)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("/users/{}", user)))?;
        let member = ProjectMember {
            user,
            permissions: permissions.to_vec(),
        };
        let members = state.members.entry(project.clone()).or_default();
        members.retain(|m| m.user.id != member.user.id);
        members.push(member.clone());
        Ok(member)
    }

    fn update_member_permissions(
        &self,
        project: &ProjectId,
        user: &UserId,
        permissions: &[Permission],
    ) -> GatewayResult<ProjectMember> {
        let mut state = self.begin("update_member_permissions", true)?;
        let member = state
            .members
            .get_mut(project)
            .and_then(|ms| ms.iter_mut().find(|m| &m.user.id == user))
            .ok_or_else(|| GatewayError::NotFound(format!("/projects/{}/users/{}", project, user)))?;
        member.permissions = permissions.to_vec();
        Ok(member.clone())
    }

    fn remove_member(&self, project: &ProjectId, user: &UserId) -> GatewayResult<()> {
        let mut state = self.begin("remove_member", true)?;
        let members = state
            .members
            .get_mut(project)
            .ok_or_else(|| GatewayError::NotFound(format!("/projects/{}/users/{}", project, user)))?;
        let before = members.len();
        members.retain(|m| &m.user.id != user);
        if members.len() == before {
            return Err(GatewayError::NotFound(format!(
                "/projects/{}/users/{}",
                project, user
            )));
        }
        Ok(())
    }
}

impl TasksApi for MemoryGateway {
    fn list_tasks(&self, project: &ProjectId) -> GatewayResult<Vec<Task>> {
        let state = self.begin("list_tasks", true)?;
        Ok(state
            .tasks
            .values()
            .filter(|t| &t.project_id == project)
            .cloned()
            .collect())
    }

    fn get_task(&self, id: &TaskId) -> GatewayResult<Task> {
        let mut state = self.begin("get_task", true)?;
        state.task_mut(id).map(|t| t.clone())
    }

    fn create_task(&self, project: &ProjectId, data: &NewTask) -> GatewayResult<Task> {
        let mut state = self.begin("create_task", true)?;
        if !state.projects.contains_key(project) {
            return Err(GatewayError::NotFound(format!("/projects/{}", project)));
        }
        if let Some(card) = &data.card_id
            && !state.cards.contains_key(card)
        {
            return Err(GatewayError::Rejected {
                status: 422,
                message: format!("card {} does not exist", card),
            });
        }
        let task = Task {
            id: TaskId::from(state.next()),
            project_id: project.clone(),
            card_id: data.card_id.clone(),
            title: data.title.clone(),
            description: data.description.clone(),
            status: data.status.unwrap_or_default(),
            priority: data.priority.unwrap_or_default(),
            assigned_user_id: data.assigned_user_id.clone(),
        };
        state.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    fn update_task(&self, task: &Task) -> GatewayResult<Task> {
        let mut state = self.begin("update_task", true)?;
        let slot = state.task_mut(&task.id)?;
        *slot = task.clone();
        Ok(task.clone())
    }

    fn delete_task(&self, id: &TaskId) -> GatewayResult<()> {
        let mut state = self.begin("delete_task", true)?;
        if state.tasks.shift_remove(id).is_none() {
            return Err(GatewayError::NotFound(format!("/tasks/{}", id)));
        }
        state.comments.retain(|_, c| &c.task_id != id);
        Ok(())
    }

    fn set_task_priority(&self, id: &TaskId, priority: TaskPriority) -> GatewayResult<Task> {
        let mut state = self.begin("set_task_priority", true)?;
        let task = state.task_mut(id)?;
        task.priority = priority;
        Ok(task.clone())
    }

    fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> GatewayResult<Task> {
        let mut state = self.begin("set_task_status", true)?;
        let task = state.task_mut(id)?;
        task.status = status;
        Ok(task.clone())
    }

    fn set_task_card(&self, id: &TaskId, card: Option<&CardId>) -> GatewayResult<Task> {
        let mut state = self.begin("set_task_card", true)?;
        if let Some(card) = card
            && !state.cards.contains_key(card)
        {
            return Err(GatewayError::NotFound(format!("/cards/{}", card)));
        }
        let task = state.task_mut(id)?;
        task.card_id = card.cloned();
        Ok(task.clone())
    }
}

impl CardsApi for MemoryGateway {
    fn list_cards(&self, project: &ProjectId) -> GatewayResult<Vec<Card>> {
        let state = self.begin("list_cards", true)?;
        Ok(state
            .cards
            .values()
            .filter(|c| &c.project_id == project)
            .map(|c| state.card_with_tasks(c))
            .collect())
    }

    fn create_card(&self, project: &ProjectId, data: &NewCard) -> GatewayResult<Card> {
        let mut state = self.begin("create_card", true)?;
        if !state.projects.contains_key(project) {
            return Err(GatewayError::NotFound(format!("/projects/{}", project)));
        }
        let position = data.position.unwrap_or_else(|| {
            state
                .cards
                .values()
                .filter(|c| &c.project_id == project)
                .count() as i64
        });
        let card = Card {
            id: CardId::from(state.next()),
            project_id: project.clone(),
            title: data.title.clone(),
            position,
            tasks: Vec::new(),
        };
        state.cards.insert(card.id.clone(), card.clone());
        Ok(card)
    }

    fn get_card(&self, id: &CardId) -> GatewayResult<Card> {
        let state = self.begin("get_card", true)?;
        state
            .cards
            .get(id)
            .map(|c| state.card_with_tasks(c))
            .ok_or_else(|| GatewayError::NotFound(format!("/cards/{}", id)))
    }

    /// Like the real API, the response carries no embedded tasks.
    fn update_card(&self, data: &CardUpdate) -> GatewayResult<Card> {
        let mut state = self.begin("update_card", true)?;
        let card = state
            .cards
            .get_mut(&data.id)
            .ok_or_else(|| GatewayError::NotFound(format!("/cards/{}", data.id)))?;
        card.title = data.title.clone();
        card.position = data.position;
        Ok(card.clone())
    }

    fn delete_card(&self, id: &CardId) -> GatewayResult<()> {
        let mut state = self.begin("delete_card", true)?;
        if state.cards.shift_remove(id).is_none() {
            return Err(GatewayError::NotFound(format!("/cards/{}", id)));
        }
        for task in state.tasks.values_mut() {
            if task.card_id.as_ref() == Some(id) {
                task.card_id = None;
            }
        }
        Ok(())
    }

    fn assign_task(&self, card: &CardId, task: &TaskId) -> GatewayResult<Task> {
        let mut state = self.begin("assign_task", true)?;
        if !state.cards.contains_key(card) {
            return Err(GatewayError::NotFound(format!("/cards/{}", card)));
        }
        let task = state.task_mut(task)?;
        task.card_id = Some(card.clone());
        Ok(task.clone())
    }

    fn remove_task(&self, card: &CardId, task: &TaskId) -> GatewayResult<Task> {
        let mut state = self.begin("remove_task", true)?;
        let task = state.task_mut(task)?;
        if task.card_id.as_ref() != Some(card) {
            return Err(GatewayError::Rejected {
                status: 409,
                message: format!("task {} is not on card {}", task.id, card),
            });
        }
        task.card_id = None;
        Ok(task.clone())
    }
}

impl CommentsApi for MemoryGateway {
    fn list_comments(&self, task: &TaskId) -> GatewayResult<Vec<Comment>> {
        let state = self.begin("list_comments", true)?;
        Ok(state
            .comments
            .values()
            .filter(|c| &c.task_id == task)
            .cloned()
            .collect())
    }

    fn create_comment(&self, task: &TaskId, content: &str) -> GatewayResult<Comment> {
        let mut state = self.begin("create_comment", true)?;
        if !state.tasks.contains_key(task) {
            return Err(GatewayError::NotFound(format!("/tasks/{}", task)));
        }
        let author = state
            .attached_token
            .as_ref()
            .and_then(|t| state.issued_tokens.get(t))
            .cloned();
        let comment = Comment {
            id: CommentId::from(state.next()),
            task_id: task.clone(),
            content: content.to_string(),
            user_id: author,
            created_at: None,
        };
        state.comments.insert(comment.id.clone(), comment.clone());
        Ok(comment)
    }

    fn update_comment(&self, id: &CommentId, content: &str) -> GatewayResult<Comment> {
        let mut state = self.begin("update_comment", true)?;
        let comment = state
            .comments
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(format!("/comments/{}", id)))?;
        comment.content = content.to_string();
        Ok(comment.clone())
    }

    fn delete_comment(&self, id: &CommentId) -> GatewayResult<()> {
        let mut state = self.begin("delete_comment", true)?;
        state
            .comments
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound(format!("/comments/{}", id)))
    }
}

impl ReportsApi for MemoryGateway {
    fn project_report(&self, project: &ProjectId) -> GatewayResult<ProjectReport> {
        let state = self.begin("project_report", true)?;
        if !state.projects.contains_key(project) {
            return Err(GatewayError::NotFound(format!("/reports/projects/{}", project)));
        }
        let tasks: Vec<&Task> = state
            .tasks
            .values()
            .filter(|t| &t.project_id == project)
            .collect();
        let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
        let mut report = ProjectReport {
            project_id: Some(project.clone()),
            ..Default::default()
        };
        report
            .metrics
            .insert("total_tasks".into(), Value::from(tasks.len()));
        report.metrics.insert("done_tasks".into(), Value::from(done));
        Ok(report)
    }

    fn user_report(&self, user: &UserId) -> GatewayResult<UserReport> {
        let state = self.begin("user_report", true)?;
        if !state.users.contains_key(user) {
            return Err(GatewayError::NotFound(format!("/reports/users/{}", user)));
        }
        let assigned = state
            .tasks
            .values()
            .filter(|t| t.assigned_user_id.as_ref() == Some(user))
            .count();
        let mut report = UserReport {
            user_id: Some(user.clone()),
            ..Default::default()
        };
        report
            .metrics
            .insert("assigned_tasks".into(), Value::from(assigned));
        Ok(report)
    }
}

impl AuthApi for MemoryGateway {
    fn register(&self, data: &Registration) -> GatewayResult<User> {
        let mut state = self.begin("register", false)?;
        if state.accounts.contains_key(&data.email) {
            return Err(GatewayError::Rejected {
                status: 409,
                message: "email already registered".into(),
            });
        }
        let user = User {
            id: UserId::from(state.next()),
            name: data.name.clone(),
            email: data.email.clone(),
        };
        state.users.insert(user.id.clone(), user.clone());
        state.accounts.insert(
            data.email.clone(),
            (data.password.clone(), user.id.clone()),
        );
        Ok(user)
    }

    fn login(&self, credentials: &Credentials) -> GatewayResult<LoginResponse> {
        let mut state = self.begin("login", false)?;
        let user = match state.accounts.get(&credentials.email) {
            Some((password, user)) if *password == credentials.password => user.clone(),
            _ => return Err(GatewayError::Unauthorized),
        };
        if state.omit_login_token {
            return Ok(LoginResponse {
                token: None,
                user_id: Some(user),
            });
        }
        let token = format!("tok-{}", state.next());
        state.issued_tokens.insert(token.clone(), user.clone());
        Ok(LoginResponse {
            token: Some(token),
            user_id: Some(user),
        })
    }

    fn set_auth_token(&self, token: Option<&str>) {
        self.lock().attached_token = token.filter(|t| !t.is_empty()).map(str::to_string);
    }
}

impl UsersApi for MemoryGateway {
    fn list_users(&self) -> GatewayResult<Vec<User>> {
        let state = self.begin("list_users", true)?;
        Ok(state.users.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged_in() -> MemoryGateway {
        let gw = MemoryGateway::new();
        gw.add_account("Ada", "ada@example.com", "pw");
        let resp = gw
            .login(&Credentials {
                email: "ada@example.com".into(),
                password: "pw".into(),
            })
            .unwrap();
        gw.set_auth_token(resp.token.as_deref());
        gw
    }

    #[test]
    fn calls_without_token_are_unauthorized() {
        let gw = MemoryGateway::new();
        assert_eq!(gw.list_projects(), Err(GatewayError::Unauthorized));
        gw.set_auth_token(Some("forged"));
        assert_eq!(gw.list_projects(), Err(GatewayError::Unauthorized));
    }

    #[test]
    fn cards_embed_their_tasks_on_read() {
        let gw = logged_in();
        let p = gw.create_project(&NewProject {
            name: "P".into(),
            ..Default::default()
        })
        .unwrap();
        let c = gw
            .create_card(&p.id, &NewCard {
                title: "Todo".into(),
                position: None,
            })
            .unwrap();
        let t = gw.create_task(&p.id, &NewTask::titled("T")).unwrap();
        gw.assign_task(&c.id, &t.id).unwrap();

        let cards = gw.list_cards(&p.id).unwrap();
        assert_eq!(cards[0].tasks.len(), 1);
        assert_eq!(cards[0].tasks[0].id, t.id);
    }

    #[test]
    fn failure_modes() {
        let gw = logged_in();
        gw.fail_operation("list_users");
        assert!(matches!(
            gw.list_users(),
            Err(GatewayError::Rejected { status: 500, .. })
        ));
        gw.set_offline(true);
        assert!(matches!(gw.list_projects(), Err(GatewayError::Transport(_))));
        gw.clear_failures();
        assert!(gw.list_users().is_ok());
        assert_eq!(gw.calls().last().map(String::as_str), Some("list_users"));
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let gw = MemoryGateway::new();
        gw.add_account("Ada", "ada@example.com", "pw");
        let err = gw
            .login(&Credentials {
                email: "ada@example.com".into(),
                password: "nope".into(),
            })
            .unwrap_err();
        assert_eq!(err, GatewayError::Unauthorized);
    }
}
