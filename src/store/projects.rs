use tracing::warn;

use super::{EntityStore, Listing, StoreError, degraded, failed};
use crate::gateway::{Gateway, GatewayError};
use crate::model::{
    MemberAssignment, NewProject, Permission, Project, ProjectId, ProjectMember, ProjectReport,
    UserId,
};

/// Outcome of one member assignment issued while creating a project
#[derive(Debug, Clone, PartialEq)]
pub struct MemberOutcome {
    pub assignment: MemberAssignment,
    pub result: Result<ProjectMember, GatewayError>,
}

/// A created project plus the per-member results of the follow-up calls.
///
/// The project exists even when some members failed; nothing is rolled
/// back. Callers decide whether to retry the failed assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectCreation {
    pub project: Project,
    pub members: Vec<MemberOutcome>,
}

impl ProjectCreation {
    /// True when every member assignment went through
    pub fn is_complete(&self) -> bool {
        self.members.iter().all(|m| m.result.is_ok())
    }

    /// Assignments that failed, ready to be retried
    pub fn failed_members(&self) -> Vec<&MemberAssignment> {
        self.members
            .iter()
            .filter(|m| m.result.is_err())
            .map(|m| &m.assignment)
            .collect()
    }
}

impl<G: Gateway> EntityStore<G> {
    pub fn fetch_projects(&mut self) -> Listing<Project> {
        match self.gateway.list_projects() {
            Ok(projects) => {
                self.projects = projects.iter().map(|p| (p.id.clone(), p.clone())).collect();
                Listing::loaded(projects)
            }
            Err(e) => degraded("fetch_projects", e),
        }
    }

    /// Load one project and make it the current project
    pub fn fetch_project(&mut self, id: &ProjectId) -> Result<Project, StoreError> {
        let project = self
            .gateway
            .get_project(id)
            .map_err(|e| failed("fetch_project", e))?;
        if let Some(slot) = self.projects.get_mut(&project.id) {
            *slot = project.clone();
        }
        self.current_project = Some(project.clone());
        Ok(project)
    }

    /// Create a project, then assign each requested member one call at a
    /// time. A member that fails is logged and skipped.
    pub fn create_project(&mut self, data: &NewProject) -> Result<ProjectCreation, StoreError> {
        let project = self
            .gateway
            .create_project(data)
            .map_err(|e| failed("create_project", e))?;
        self.projects.insert(project.id.clone(), project.clone());

        let mut outcomes = Vec::with_capacity(data.members.len());
        for assignment in &data.members {
            let result = self.gateway.assign_member(
                &project.id,
                &assignment.user_id,
                &assignment.permissions,
            );
            match &result {
                Ok(member) => {
                    self.members
                        .entry(project.id.clone())
                        .or_default()
                        .insert(member.user.id.clone(), member.clone());
                }
                Err(e) => warn!(
                    project = %project.id,
                    user = %assignment.user_id,
                    error = %e,
                    "member assignment failed, continuing"
                ),
            }
            outcomes.push(MemberOutcome {
                assignment: assignment.clone(),
                result,
            });
        }

        Ok(ProjectCreation {
            project,
            members: outcomes,
        })
    }

    pub fn update_project(&mut self, project: &Project) -> Result<Project, StoreError> {
        let updated = self
            .gateway
            .update_project(project)
            .map_err(|e| failed("update_project", e))?;
        if let Some(slot) = self.projects.get_mut(&project.id) {
            *slot = updated.clone();
        }
        if let Some(current) = &mut self.current_project
            && current.id == updated.id
        {
            *current = updated.clone();
        }
        Ok(updated)
    }

    /// Delete a project along with everything cached under it
    pub fn delete_project(&mut self, id: &ProjectId) -> Result<(), StoreError> {
        self.gateway
            .delete_project(id)
            .map_err(|e| failed("delete_project", e))?;
        self.projects.shift_remove(id);
        self.tasks.retain(|_, t| &t.project_id != id);
        self.cards.retain(|_, c| &c.project_id != id);
        self.members.remove(id);
        if self.current_project.as_ref().is_some_and(|p| &p.id == id) {
            self.current_project = None;
        }
        if self
            .project_report
            .as_ref()
            .is_some_and(|r| r.project_id.as_ref() == Some(id))
        {
            self.project_report = None;
        }
        Ok(())
    }

    pub fn fetch_project_users(&mut self, project: &ProjectId) -> Listing<ProjectMember> {
        match self.gateway.list_members(project) {
            Ok(members) => {
                self.members.insert(
                    project.clone(),
                    members
                        .iter()
                        .map(|m| (m.user.id.clone(), m.clone()))
                        .collect(),
                );
                Listing::loaded(members)
            }
            Err(e) => degraded("fetch_project_users", e),
        }
    }

    pub fn assign_member(
        &mut self,
        project: &ProjectId,
        user: &UserId,
        permissions: &[Permission],
    ) -> Result<ProjectMember, StoreError> {
        let member = self
            .gateway
            .assign_member(project, user, permissions)
            .map_err(|e| failed("assign_member", e))?;
        self.members
            .entry(project.clone())
            .or_default()
            .insert(member.user.id.clone(), member.clone());
        Ok(member)
    }

    pub fn update_member_permissions(
        &mut self,
        project: &ProjectId,
        user: &UserId,
        permissions: &[Permission],
    ) -> Result<ProjectMember, StoreError> {
        let member = self
            .gateway
            .update_member_permissions(project, user, permissions)
            .map_err(|e| failed("update_member_permissions", e))?;
        self.members
            .entry(project.clone())
            .or_default()
            .insert(member.user.id.clone(), member.clone());
        Ok(member)
    }

    pub fn remove_member(&mut self, project: &ProjectId, user: &UserId) -> Result<(), StoreError> {
        self.gateway
            .remove_member(project, user)
            .map_err(|e| failed("remove_member", e))?;
        if let Some(members) = self.members.get_mut(project) {
            members.shift_remove(user);
        }
        Ok(())
    }

    pub fn fetch_project_report(&mut self, project: &ProjectId) -> Result<ProjectReport, StoreError> {
        let report = self
            .gateway
            .project_report(project)
            .map_err(|e| failed("fetch_project_report", e))?;
        self.project_report = Some(report.clone());
        Ok(report)
    }
}
