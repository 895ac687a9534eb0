use serde::Serialize;

use crate::model::{
    Card, Comment, Project, ProjectMember, Task, TaskPriority, TaskStatus, User,
};
use crate::store::{MemberOutcome, ProjectCreation};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct StatusJson {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub api_url: String,
    pub config_path: String,
    pub session_file: String,
}

#[derive(Serialize)]
pub struct BoardJson<'a> {
    pub project: &'a Project,
    pub cards: Vec<&'a Card>,
    pub unlisted: Vec<&'a Task>,
}

#[derive(Serialize)]
pub struct MemberOutcomeJson {
    pub user_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ProjectCreationJson<'a> {
    pub project: &'a Project,
    pub members: Vec<MemberOutcomeJson>,
}

/// What delete and remove commands print with `--json`
#[derive(Serialize)]
pub struct DeletedJson {
    pub kind: &'static str,
    pub deleted: String,
    /// Set when the entity was removed from a project rather than deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl DeletedJson {
    pub fn new(kind: &'static str, id: impl ToString) -> Self {
        DeletedJson {
            kind,
            deleted: id.to_string(),
            project: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn outcome_to_json(outcome: &MemberOutcome) -> MemberOutcomeJson {
    MemberOutcomeJson {
        user_id: outcome.assignment.user_id.to_string(),
        ok: outcome.result.is_ok(),
        error: outcome.result.as_ref().err().map(|e| e.to_string()),
    }
}

pub fn creation_to_json(creation: &ProjectCreation) -> ProjectCreationJson<'_> {
    ProjectCreationJson {
        project: &creation.project,
        members: creation.members.iter().map(outcome_to_json).collect(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn status_char(status: TaskStatus) -> char {
    match status {
        TaskStatus::Todo => ' ',
        TaskStatus::InProgress => '>',
        TaskStatus::Done => 'x',
    }
}

/// Format a single task as a one-line summary
pub fn format_task_line(task: &Task) -> String {
    let priority = match task.priority {
        TaskPriority::Medium => String::new(),
        other => format!(" ({})", other),
    };
    let assignee = task
        .assigned_user_id
        .as_ref()
        .map(|u| format!(" @{}", u))
        .unwrap_or_default();
    format!(
        "[{}] {} {}{}{}",
        status_char(task.status),
        task.id,
        task.title,
        priority,
        assignee
    )
}

/// Format detailed task view
pub fn format_task_detail(task: &Task) -> Vec<String> {
    let mut lines = vec![format_task_line(task)];
    lines.push(format!("status: {}", task.status));
    lines.push(format!("priority: {}", task.priority));
    lines.push(format!("project: {}", task.project_id));
    if let Some(card) = &task.card_id {
        lines.push(format!("card: {}", card));
    }
    if let Some(user) = &task.assigned_user_id {
        lines.push(format!("assigned: {}", user));
    }
    if let Some(desc) = task.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push("description:".to_string());
        for line in desc.lines() {
            lines.push(format!("  {}", line));
        }
    }
    lines
}

/// Card header plus its tasks, indented
pub fn format_card(card: &Card) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", card.title, card.id)];
    if card.tasks.is_empty() {
        lines.push("  (empty)".to_string());
    }
    for task in &card.tasks {
        lines.push(format!("  {}", format_task_line(task)));
    }
    lines
}

/// Whole board: every card in order, then tasks on no card
pub fn format_board(project: &Project, cards: &[&Card], unlisted: &[&Task]) -> Vec<String> {
    let mut lines = vec![format!("== {} ({}) ==", project.name, project.id)];
    for card in cards {
        lines.push(String::new());
        lines.extend(format_card(card));
    }
    if !unlisted.is_empty() {
        lines.push(String::new());
        lines.push("Unlisted".to_string());
        for task in unlisted {
            lines.push(format!("  {}", format_task_line(task)));
        }
    }
    lines
}

pub fn format_project_line(project: &Project) -> String {
    match project.description.as_deref().filter(|d| !d.is_empty()) {
        Some(desc) => format!("{}  {}  - {}", project.id, project.name, desc),
        None => format!("{}  {}", project.id, project.name),
    }
}

pub fn format_member_line(member: &ProjectMember) -> String {
    let perms = member
        .permissions
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("+");
    format!("{}  {} [{}]", member.user.id, member.user.label(), perms)
}

pub fn format_user_line(user: &User) -> String {
    if user.email.is_empty() || user.name.is_empty() {
        format!("{}  {}", user.id, user.label())
    } else {
        format!("{}  {} <{}>", user.id, user.name, user.email)
    }
}

pub fn format_comment(comment: &Comment) -> String {
    let author = comment
        .user_id
        .as_ref()
        .map(|u| format!("@{} ", u))
        .unwrap_or_default();
    let when = comment
        .created_at
        .map(|t| format!("{} ", t.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();
    format!("#{} {}{}{}", comment.id, when, author, comment.content)
}

/// Report metrics as `key: value` lines, keys sorted
pub fn format_metrics(metrics: &std::collections::BTreeMap<String, serde_json::Value>) -> Vec<String> {
    metrics
        .iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => format!("{}: {}", k, s),
            other => format!("{}: {}", k, other),
        })
        .collect()
}

/// One line per member assignment of a new project
pub fn format_creation(creation: &ProjectCreation) -> Vec<String> {
    let mut lines = vec![format!(
        "created {}",
        format_project_line(&creation.project)
    )];
    for outcome in &creation.members {
        match &outcome.result {
            Ok(member) => lines.push(format!("  + {}", format_member_line(member))),
            Err(e) => lines.push(format!(
                "  ! member {} not added: {}",
                outcome.assignment.user_id, e
            )),
        }
    }
    lines
}
