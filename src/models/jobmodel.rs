// models/jobmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Accepted,
    Enroute,
    Onsite,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn to_str(&self) -> &str {
        match self {
            JobStatus::Open => "open",
            JobStatus::Accepted => "accepted",
            JobStatus::Enroute => "enroute",
            JobStatus::Onsite => "onsite",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// open → accepted → enroute → onsite → completed, with cancelled
    /// reachable from open and accepted only.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Open, JobStatus::Accepted)
                | (JobStatus::Accepted, JobStatus::Enroute)
                | (JobStatus::Enroute, JobStatus::Onsite)
                | (JobStatus::Onsite, JobStatus::Completed)
                | (JobStatus::Open, JobStatus::Cancelled)
                | (JobStatus::Accepted, JobStatus::Cancelled)
        )
    }

    /// Statuses only the assigned provider may move the job into.
    pub fn is_provider_progress(&self) -> bool {
        matches!(
            self,
            JobStatus::Enroute | JobStatus::Onsite | JobStatus::Completed
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Selected,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub budget: Option<f64>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_open_for_assignment(&self) -> bool {
        self.status == JobStatus::Open && self.provider_id.is_none()
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.requester_id == user_id || self.provider_id == Some(user_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub budget: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobApplication {
    pub id: Uuid,
    pub job_id: Uuid,
    pub provider_id: Uuid,
    pub cover_letter: Option<String>,
    pub proposed_rate: Option<f64>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Rows touched by selecting one application for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSelection {
    pub job: Job,
    pub selected: JobApplication,
    pub rejected: Vec<JobApplication>,
}

/// A direct accept or a cancellation, together with the pending
/// applications it closed.
#[derive(Debug, Clone)]
pub struct JobResolution {
    pub job: Job,
    pub rejected: Vec<JobApplication>,
}
