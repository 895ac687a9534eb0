use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::{ProjectId, UserId};
use super::user::User;

/// A project as returned by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Per-member permission within a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => write!(f, "read"),
            Permission::Write => write!(f, "write"),
            Permission::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            "admin" => Ok(Permission::Admin),
            other => Err(format!(
                "unknown permission '{}' (expected read, write, admin)",
                other
            )),
        }
    }
}

/// A user's membership in a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// A member to add while creating a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberAssignment {
    pub user_id: UserId,
    pub permissions: Vec<Permission>,
}

impl FromStr for MemberAssignment {
    type Err = String;

    /// Parse `USER[:perm+perm]`, e.g. `12:read+write`. No permissions means read.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user, perms) = match s.split_once(':') {
            Some((user, perms)) => (user, Some(perms)),
            None => (s, None),
        };
        if user.trim().is_empty() {
            return Err(format!("missing user id in member '{}'", s));
        }
        let permissions = match perms {
            Some(p) if !p.trim().is_empty() => p
                .split('+')
                .map(str::parse)
                .collect::<Result<Vec<Permission>, _>>()?,
            _ => vec![Permission::Read],
        };
        Ok(MemberAssignment {
            user_id: UserId::parse(user),
            permissions,
        })
    }
}

/// Payload for creating a project. `members` is not part of the create call;
/// each member is assigned with a follow-up call once the project exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewProject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    pub members: Vec<MemberAssignment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_body_excludes_members() {
        let data = NewProject {
            name: "Apollo".into(),
            description: None,
            members: vec!["4:write".parse().unwrap()],
        };
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            serde_json::json!({"name": "Apollo"})
        );
    }

    #[test]
    fn member_assignment_parsing() {
        let m: MemberAssignment = "12:read+admin".parse().unwrap();
        assert_eq!(m.user_id, UserId::from(12));
        assert_eq!(m.permissions, vec![Permission::Read, Permission::Admin]);

        let m: MemberAssignment = "alice".parse().unwrap();
        assert_eq!(m.permissions, vec![Permission::Read]);

        assert!(":write".parse::<MemberAssignment>().is_err());
        assert!("3:root".parse::<MemberAssignment>().is_err());
    }

    #[test]
    fn member_flattens_user_fields() {
        let m: ProjectMember = serde_json::from_str(
            r#"{"id": 5, "name": "Ada", "email": "ada@example.com", "permissions": ["write"]}"#,
        )
        .unwrap();
        assert_eq!(m.user.name, "Ada");
        assert_eq!(m.permissions, vec![Permission::Write]);
    }
}
