// service/permissions.rs
//! Single place where role and ownership rules are decided.
use crate::models::{
    jobmodel::Job,
    usermodel::{User, UserRole},
};

#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    PostJob,
    ApplyToJob(&'a Job),
    AcceptJob(&'a Job),
    SelectApplication(&'a Job),
    AdvanceJob(&'a Job),
    CancelJob(&'a Job),
    ViewJobThread { job: &'a Job, has_applied: bool },
    SendAdminMessage,
    ViewApplications(&'a Job),
}

impl Action<'_> {
    /// Short phrase used in permission-denied messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Action::PostJob => "post jobs",
            Action::ApplyToJob(_) => "apply to this job",
            Action::AcceptJob(_) => "accept this job",
            Action::SelectApplication(_) => "select applications for this job",
            Action::AdvanceJob(_) => "update the progress of this job",
            Action::CancelJob(_) => "cancel this job",
            Action::ViewJobThread { .. } => "access this job thread",
            Action::SendAdminMessage => "message the admin team",
            Action::ViewApplications(_) => "view applications for this job",
        }
    }
}

pub fn is_allowed(user: &User, action: &Action<'_>) -> bool {
    if !user.is_active() {
        return false;
    }

    let is_owner_or_admin = |job: &Job| job.requester_id == user.id || user.is_admin();

    match action {
        Action::PostJob => matches!(user.role, UserRole::Requester | UserRole::Admin),
        Action::ApplyToJob(job) | Action::AcceptJob(job) => {
            user.role == UserRole::Provider && job.is_open_for_assignment()
        }
        Action::SelectApplication(job)
        | Action::CancelJob(job)
        | Action::ViewApplications(job) => is_owner_or_admin(job),
        Action::AdvanceJob(job) => job.provider_id == Some(user.id),
        Action::ViewJobThread { job, has_applied } => {
            job.is_participant(user.id) || *has_applied || user.is_admin()
        }
        Action::SendAdminMessage => true,
    }
}
