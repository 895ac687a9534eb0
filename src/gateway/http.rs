use std::sync::RwLock;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::{
    AuthApi, CardsApi, CommentsApi, GatewayError, GatewayResult, ProjectsApi, ReportsApi,
    TasksApi, UsersApi,
};
use crate::model::{
    Card, CardId, CardUpdate, Comment, CommentId, Credentials, LoginResponse, NewCard, NewProject,
    NewTask, Permission, Project, ProjectId, ProjectMember, ProjectReport, Registration, Task,
    TaskId, TaskPriority, TaskStatus, User, UserId, UserReport,
};
use crate::model::config::ApiConfig;

/// Header the server reads the session token from
const TOKEN_HEADER: &str = "Token";

/// Blocking JSON-over-HTTP gateway.
///
/// The token slot is read on every request, so attaching or detaching it
/// affects all calls made afterwards.
pub struct HttpGateway {
    agent: ureq::Agent,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpGateway {
    pub fn new(config: &ApiConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        HttpGateway {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn current_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn send(&self, method: &str, path: &str, body: Option<Value>) -> GatewayResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .agent
            .request(method, &url)
            .set("Accept", "application/json");
        if let Some(token) = self.current_token() {
            request = request.set(TOKEN_HEADER, &token);
        }
        debug!(method, path, "gateway request");

        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        let response = result.map_err(|err| map_error(err, path))?;
        let text = response
            .into_string()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        parse_body(&text)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        decode(self.send("GET", path, None)?)
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> GatewayResult<T> {
        decode(self.send("POST", path, Some(body))?)
    }

    fn put<T: DeserializeOwned>(&self, path: &str, body: Value) -> GatewayResult<T> {
        decode(self.send("PUT", path, Some(body))?)
    }

    fn patch<T: DeserializeOwned>(&self, path: &str, body: Value) -> GatewayResult<T> {
        decode(self.send("PATCH", path, Some(body))?)
    }

    fn delete(&self, path: &str) -> GatewayResult<()> {
        self.send("DELETE", path, None).map(|_| ())
    }
}

fn map_error(err: ureq::Error, path: &str) -> GatewayError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            GatewayError::from_status(status, &body, path)
        }
        ureq::Error::Transport(transport) => GatewayError::Transport(transport.to_string()),
    }
}

/// Empty bodies (typical for DELETE) read as `null`
fn parse_body(text: &str) -> GatewayResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| GatewayError::Decode(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> GatewayResult<T> {
    serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))
}

fn to_body<T: serde::Serialize>(value: &T) -> GatewayResult<Value> {
    serde_json::to_value(value).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Lists come back either bare (`[...]`) or wrapped (`{"tasks": [...]}`).
/// Any other shape is an empty list.
fn decode_list<T: DeserializeOwned>(value: Value, key: &str) -> GatewayResult<Vec<T>> {
    match value {
        Value::Array(_) => decode(value),
        Value::Object(mut map) => match map.remove(key) {
            Some(inner @ Value::Array(_)) => decode(inner),
            _ => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

/// Some responses wrap the entity (`{"card": {...}}`); accept either form.
fn decode_wrapped<T: DeserializeOwned>(value: Value, key: &str) -> GatewayResult<T> {
    match value {
        Value::Object(mut map) if map.contains_key(key) => {
            decode(map.remove(key).unwrap_or(Value::Null))
        }
        other => decode(other),
    }
}

/// Percent-encode one path segment
fn seg(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

impl ProjectsApi for HttpGateway {
    fn list_projects(&self) -> GatewayResult<Vec<Project>> {
        decode_list(self.send("GET", "/projects", None)?, "projects")
    }

    fn get_project(&self, id: &ProjectId) -> GatewayResult<Project> {
        self.get(&format!("/projects/{}", seg(id.as_str())))
    }

    fn create_project(&self, data: &NewProject) -> GatewayResult<Project> {
        self.post("/projects", to_body(data)?)
    }

    fn update_project(&self, project: &Project) -> GatewayResult<Project> {
        self.put(
            &format!("/projects/{}", seg(project.id.as_str())),
            to_body(project)?,
        )
    }

    fn delete_project(&self, id: &ProjectId) -> GatewayResult<()> {
        self.delete(&format!("/projects/{}", seg(id.as_str())))
    }

    fn list_members(&self, project: &ProjectId) -> GatewayResult<Vec<ProjectMember>> {
        let path = format!("/projects/{}/users", seg(project.as_str()));
        decode_list(self.send("GET", &path, None)?, "users")
    }

    fn assign_member(
        &self,
        project: &ProjectId,
        user: &UserId,
        permissions: &[Permission],
    ) -> GatewayResult<ProjectMember> {
        self.post(
            &format!("/projects/{}/users", seg(project.as_str())),
            json!({ "user_id": user, "permissions": permissions }),
        )
    }

    fn update_member_permissions(
        &self,
        project: &ProjectId,
        user: &UserId,
        permissions: &[Permission],
    ) -> GatewayResult<ProjectMember> {
        self.put(
            &format!(
                "/projects/{}/users/{}",
                seg(project.as_str()),
                seg(user.as_str())
            ),
            json!({ "permissions": permissions }),
        )
    }

    fn remove_member(&self, project: &ProjectId, user: &UserId) -> GatewayResult<()> {
        self.delete(&format!(
            "/projects/{}/users/{}",
            seg(project.as_str()),
            seg(user.as_str())
        ))
    }
}

impl TasksApi for HttpGateway {
    fn list_tasks(&self, project: &ProjectId) -> GatewayResult<Vec<Task>> {
        let path = format!("/projects/{}/tasks", seg(project.as_str()));
        decode_list(self.send("GET", &path, None)?, "tasks")
    }

    fn get_task(&self, id: &TaskId) -> GatewayResult<Task> {
        self.get(&format!("/tasks/{}", seg(id.as_str())))
    }

    fn create_task(&self, project: &ProjectId, data: &NewTask) -> GatewayResult<Task> {
        self.post(
            &format!("/projects/{}/tasks", seg(project.as_str())),
            to_body(data)?,
        )
    }

    fn update_task(&self, task: &Task) -> GatewayResult<Task> {
        self.put(&format!("/tasks/{}", seg(task.id.as_str())), to_body(task)?)
    }

    fn delete_task(&self, id: &TaskId) -> GatewayResult<()> {
        self.delete(&format!("/tasks/{}", seg(id.as_str())))
    }

    fn set_task_priority(&self, id: &TaskId, priority: TaskPriority) -> GatewayResult<Task> {
        self.patch(
            &format!("/tasks/{}/priority", seg(id.as_str())),
            json!({ "priority": priority }),
        )
    }

    fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> GatewayResult<Task> {
        self.patch(
            &format!("/tasks/{}/status", seg(id.as_str())),
            json!({ "status": status }),
        )
    }

    fn set_task_card(&self, id: &TaskId, card: Option<&CardId>) -> GatewayResult<Task> {
        self.patch(
            &format!("/tasks/{}/card", seg(id.as_str())),
            json!({ "card_id": card }),
        )
    }
}

impl CardsApi for HttpGateway {
    fn list_cards(&self, project: &ProjectId) -> GatewayResult<Vec<Card>> {
        let path = format!("/projects/{}/cards", seg(project.as_str()));
        decode_list(self.send("GET", &path, None)?, "cards")
    }

    fn create_card(&self, project: &ProjectId, data: &NewCard) -> GatewayResult<Card> {
        self.post(
            &format!("/projects/{}/cards", seg(project.as_str())),
            to_body(data)?,
        )
    }

    fn get_card(&self, id: &CardId) -> GatewayResult<Card> {
        self.get(&format!("/cards/{}", seg(id.as_str())))
    }

    fn update_card(&self, data: &CardUpdate) -> GatewayResult<Card> {
        let path = format!("/cards/{}", seg(data.id.as_str()));
        decode_wrapped(self.send("PUT", &path, Some(to_body(data)?))?, "card")
    }

    fn delete_card(&self, id: &CardId) -> GatewayResult<()> {
        self.delete(&format!("/cards/{}", seg(id.as_str())))
    }

    fn assign_task(&self, card: &CardId, task: &TaskId) -> GatewayResult<Task> {
        let path = format!("/cards/{}/tasks/{}", seg(card.as_str()), seg(task.as_str()));
        decode_wrapped(self.send("POST", &path, None)?, "task")
    }

    fn remove_task(&self, card: &CardId, task: &TaskId) -> GatewayResult<Task> {
        let path = format!("/cards/{}/tasks/{}", seg(card.as_str()), seg(task.as_str()));
        decode_wrapped(self.send("DELETE", &path, None)?, "task")
    }
}

impl CommentsApi for HttpGateway {
    fn list_comments(&self, task: &TaskId) -> GatewayResult<Vec<Comment>> {
        let path = format!("/tasks/{}/comments", seg(task.as_str()));
        decode_list(self.send("GET", &path, None)?, "comments")
    }

    fn create_comment(&self, task: &TaskId, content: &str) -> GatewayResult<Comment> {
        self.post(
            &format!("/tasks/{}/comments", seg(task.as_str())),
            json!({ "content": content }),
        )
    }

    fn update_comment(&self, id: &CommentId, content: &str) -> GatewayResult<Comment> {
        self.put(
            &format!("/comments/{}", seg(id.as_str())),
            json!({ "content": content }),
        )
    }

    fn delete_comment(&self, id: &CommentId) -> GatewayResult<()> {
        self.delete(&format!("/comments/{}", seg(id.as_str())))
    }
}

impl ReportsApi for HttpGateway {
    fn project_report(&self, project: &ProjectId) -> GatewayResult<ProjectReport> {
        self.get(&format!("/reports/projects/{}", seg(project.as_str())))
    }

    fn user_report(&self, user: &UserId) -> GatewayResult<UserReport> {
        self.get(&format!("/reports/users/{}", seg(user.as_str())))
    }
}

impl AuthApi for HttpGateway {
    fn register(&self, data: &Registration) -> GatewayResult<User> {
        decode_wrapped(
            self.send("POST", "/auth/register", Some(to_body(data)?))?,
            "user",
        )
    }

    fn login(&self, credentials: &Credentials) -> GatewayResult<LoginResponse> {
        self.post("/auth/login", to_body(credentials)?)
    }

    fn set_auth_token(&self, token: Option<&str>) {
        let token = token.filter(|t| !t.is_empty()).map(str::to_string);
        match self.token.write() {
            Ok(mut slot) => *slot = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }
}

impl UsersApi for HttpGateway {
    fn list_users(&self) -> GatewayResult<Vec<User>> {
        decode_list(self.send("GET", "/users", None)?, "users")
    }
}
