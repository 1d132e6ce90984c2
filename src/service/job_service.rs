// service/job_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{JobExt, Store},
    models::{
        jobmodel::*,
        usermodel::{User, UserRole},
    },
    service::{
        chat_service::ChatService,
        error::ServiceError,
        notification_service::NotificationService,
        permissions::{is_allowed, Action},
    },
};

#[derive(Debug, Clone)]
pub struct JobService {
    db_client: Arc<dyn Store>,
    chat_service: Arc<ChatService>,
    notification_service: Arc<NotificationService>,
}

fn ensure(user: &User, action: Action<'_>) -> Result<(), ServiceError> {
    if is_allowed(user, &action) {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(user.id, action.describe()))
    }
}

impl JobService {
    pub fn new(
        db_client: Arc<dyn Store>,
        chat_service: Arc<ChatService>,
        notification_service: Arc<NotificationService>,
    ) -> Self {
        Self {
            db_client,
            chat_service,
            notification_service,
        }
    }

    async fn load_job(&self, job_id: Uuid) -> Result<Job, ServiceError> {
        self.db_client
            .get_job_by_id(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))
    }

    pub async fn post_job(&self, user: &User, job: NewJob) -> Result<Job, ServiceError> {
        ensure(user, Action::PostJob)?;

        let job = self.db_client.create_job(user.id, job).await?;
        tracing::info!("Job {} posted by {}: {}", job.id, user.id, job.title);
        Ok(job)
    }

    pub async fn list_open_jobs(&self, limit: i64, offset: i64) -> Result<Vec<Job>, ServiceError> {
        Ok(self.db_client.get_open_jobs(limit, offset).await?)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Job, ServiceError> {
        self.load_job(job_id).await
    }

    pub async fn apply_to_job(
        &self,
        user: &User,
        job_id: Uuid,
        cover_letter: Option<String>,
        proposed_rate: Option<f64>,
    ) -> Result<JobApplication, ServiceError> {
        let job = self.load_job(job_id).await?;

        if !is_allowed(user, &Action::ApplyToJob(&job)) {
            if user.role == UserRole::Provider && !job.is_open_for_assignment() {
                return Err(ServiceError::JobNotOpen(job.id));
            }
            return Err(ServiceError::PermissionDenied(
                user.id,
                Action::ApplyToJob(&job).describe(),
            ));
        }

        let application = self
            .db_client
            .create_job_application(job.id, user.id, cover_letter, proposed_rate)
            .await?
            .ok_or(ServiceError::DuplicateApplication(job.id))?;

        if let Err(e) = self
            .notification_service
            .notify_job_application(&job, &application)
            .await
        {
            tracing::warn!("Failed to notify requester of application {}: {}", application.id, e);
        }

        Ok(application)
    }

    pub async fn list_applications(
        &self,
        user: &User,
        job_id: Uuid,
    ) -> Result<Vec<JobApplication>, ServiceError> {
        let job = self.load_job(job_id).await?;
        ensure(user, Action::ViewApplications(&job))?;

        Ok(self.db_client.get_job_applications(job.id).await?)
    }

    /// Selects one application and rejects the rest in a single transaction,
    /// then notifies every provider involved.
    pub async fn select_application(
        &self,
        user: &User,
        job_id: Uuid,
        application_id: Uuid,
    ) -> Result<ApplicationSelection, ServiceError> {
        let job = self.load_job(job_id).await?;
        ensure(user, Action::SelectApplication(&job))?;

        let application = self
            .db_client
            .get_job_application_by_id(application_id)
            .await?
            .filter(|a| a.job_id == job.id)
            .ok_or(ServiceError::ApplicationNotFound(application_id))?;

        if application.status != ApplicationStatus::Pending {
            return Err(ServiceError::ApplicationResolved(application.id));
        }
        if !job.is_open_for_assignment() {
            return Err(ServiceError::AlreadyAccepted(job.id));
        }

        let selection = self
            .db_client
            .select_application(job.id, application.id)
            .await?
            .ok_or(ServiceError::AlreadyAccepted(job.id))?;

        tracing::info!(
            "Application {} selected for job {}, {} rejected",
            selection.selected.id,
            job.id,
            selection.rejected.len()
        );

        if let Err(e) = self
            .notification_service
            .notify_application_selected(&selection.job, &selection.selected)
            .await
        {
            tracing::warn!("Failed to notify selected provider: {}", e);
        }
        for rejected in &selection.rejected {
            if let Err(e) = self
                .notification_service
                .notify_application_rejected(&selection.job, rejected)
                .await
            {
                tracing::warn!("Failed to notify rejected provider {}: {}", rejected.provider_id, e);
            }
        }
        self.post_progress(
            &selection.job,
            user.id,
            selection.selected.provider_id,
            format!("{} selected you for this job", user.name),
        )
        .await;

        Ok(selection)
    }

    pub async fn accept_job(&self, user: &User, job_id: Uuid) -> Result<Job, ServiceError> {
        let job = self.load_job(job_id).await?;

        if !is_allowed(user, &Action::AcceptJob(&job)) {
            if user.role == UserRole::Provider && !job.is_open_for_assignment() {
                return Err(ServiceError::AlreadyAccepted(job.id));
            }
            return Err(ServiceError::PermissionDenied(
                user.id,
                Action::AcceptJob(&job).describe(),
            ));
        }

        let JobResolution { job, rejected } = self
            .db_client
            .accept_job(job.id, user.id)
            .await?
            .ok_or(ServiceError::AlreadyAccepted(job.id))?;

        tracing::info!(
            "Job {} accepted by provider {}, {} pending applications rejected",
            job.id,
            user.id,
            rejected.len()
        );

        if let Err(e) = self.notification_service.notify_job_accepted(&job).await {
            tracing::warn!("Failed to notify requester of acceptance: {}", e);
        }
        for application in &rejected {
            if let Err(e) = self
                .notification_service
                .notify_application_rejected(&job, application)
                .await
            {
                tracing::warn!(
                    "Failed to notify rejected provider {}: {}",
                    application.provider_id,
                    e
                );
            }
        }
        self.post_progress(
            &job,
            user.id,
            job.requester_id,
            format!("{} accepted this job", user.name),
        )
        .await;

        Ok(job)
    }

    /// Moves a job along its lifecycle. `expected` is the status the caller
    /// last saw; when omitted the current status is assumed.
    pub async fn update_status(
        &self,
        user: &User,
        job_id: Uuid,
        next: JobStatus,
        expected: Option<JobStatus>,
    ) -> Result<Job, ServiceError> {
        let job = self.load_job(job_id).await?;
        let expected = expected.unwrap_or(job.status);
        if expected != job.status {
            return Err(ServiceError::StaleStatus {
                job_id: job.id,
                expected,
            });
        }

        if next == JobStatus::Cancelled {
            return self.cancel_job(user, job, expected).await;
        }
        if !next.is_provider_progress() {
            return Err(ServiceError::Validation(format!(
                "Status {} is set by accepting the job or selecting an application",
                next.to_str()
            )));
        }

        ensure(user, Action::AdvanceJob(&job))?;
        if !job.status.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition {
                job_id: job.id,
                from: job.status,
                to: next,
            });
        }

        let job = self
            .db_client
            .update_job_status(job.id, expected, next)
            .await?
            .ok_or(ServiceError::StaleStatus {
                job_id: job.id,
                expected,
            })?;

        tracing::info!("Job {} moved to {} by {}", job.id, next.to_str(), user.id);

        if let Err(e) = self.notification_service.notify_status_changed(&job, next).await {
            tracing::warn!("Failed to notify requester of status change: {}", e);
        }
        self.post_progress(
            &job,
            user.id,
            job.requester_id,
            format!("Job status changed to {}", next.to_str()),
        )
        .await;

        Ok(job)
    }

    async fn cancel_job(
        &self,
        user: &User,
        job: Job,
        expected: JobStatus,
    ) -> Result<Job, ServiceError> {
        ensure(user, Action::CancelJob(&job))?;
        if !job.status.can_transition_to(JobStatus::Cancelled) {
            return Err(ServiceError::InvalidTransition {
                job_id: job.id,
                from: job.status,
                to: JobStatus::Cancelled,
            });
        }

        let JobResolution { job, rejected } = self
            .db_client
            .cancel_job(job.id, expected)
            .await?
            .ok_or(ServiceError::StaleStatus {
                job_id: job.id,
                expected,
            })?;

        tracing::info!(
            "Job {} cancelled by {}, {} pending applications closed",
            job.id,
            user.id,
            rejected.len()
        );

        if let Err(e) = self.notification_service.notify_job_cancelled(&job).await {
            tracing::warn!("Failed to notify provider of cancellation: {}", e);
        }
        for application in &rejected {
            if let Err(e) = self
                .notification_service
                .notify_application_closed(&job, application)
                .await
            {
                tracing::warn!(
                    "Failed to notify applicant {} of cancellation: {}",
                    application.provider_id,
                    e
                );
            }
        }
        if let Some(provider_id) = job.provider_id {
            self.post_progress(&job, user.id, provider_id, "Job was cancelled".to_string())
                .await;
        }

        Ok(job)
    }

    /// System message in the job thread. Best-effort once the transition is
    /// committed.
    async fn post_progress(&self, job: &Job, actor_id: Uuid, receiver_id: Uuid, content: String) {
        if actor_id == receiver_id {
            return;
        }
        if let Err(e) = self
            .chat_service
            .post_system_message(job, actor_id, receiver_id, content)
            .await
        {
            tracing::warn!("Failed to post progress message for job {}: {}", job.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memorydb::MemoryDB, ChatExt, NotificationExt};
    use crate::models::{
        chatmodel::{MessageType, ThreadKey, Viewer},
        notificationmodel::NotificationType,
    };
    use crate::service::events::EventBus;

    struct Harness {
        db: Arc<MemoryDB>,
        jobs: JobService,
    }

    impl Harness {
        fn new() -> Self {
            let db = Arc::new(MemoryDB::new());
            let bus = EventBus::new(64);
            let chat = Arc::new(ChatService::new(db.clone(), bus.clone()));
            let notifications = Arc::new(NotificationService::new(db.clone(), bus));
            let jobs = JobService::new(db.clone(), chat, notifications);
            Harness { db, jobs }
        }

        async fn post(&self, requester: &User) -> Job {
            self.jobs
                .post_job(
                    requester,
                    NewJob {
                        title: "Rewire kitchen".to_string(),
                        description: "Replace old wiring and sockets".to_string(),
                        category: "electrical".to_string(),
                        location: "Palapye".to_string(),
                        budget: Some(2800.0),
                    },
                )
                .await
                .unwrap()
        }

        async fn notification_types(&self, user: &User) -> Vec<NotificationType> {
            self.db
                .get_user_notifications(user.id, 100, 0)
                .await
                .unwrap()
                .into_iter()
                .map(|n| n.notification_type)
                .collect()
        }
    }

    #[tokio::test]
    async fn providers_cannot_post_jobs() {
        let h = Harness::new();
        let provider = h.db.add_user("Thato", UserRole::Provider).await;
        let err = h
            .jobs
            .post_job(
                &provider,
                NewJob {
                    title: "x".to_string(),
                    description: "y".to_string(),
                    category: "z".to_string(),
                    location: "Gaborone".to_string(),
                    budget: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_, _)));
    }

    #[tokio::test]
    async fn selecting_one_of_three_rejects_the_others() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let job = h.post(&requester).await;

        let mut providers = Vec::new();
        let mut applications = Vec::new();
        for name in ["Thato", "Masego", "Pako"] {
            let provider = h.db.add_user(name, UserRole::Provider).await;
            let application = h
                .jobs
                .apply_to_job(&provider, job.id, Some("Experienced".to_string()), Some(2500.0))
                .await
                .unwrap();
            providers.push(provider);
            applications.push(application);
        }

        let selection = h
            .jobs
            .select_application(&requester, job.id, applications[1].id)
            .await
            .unwrap();

        assert_eq!(selection.selected.id, applications[1].id);
        assert_eq!(selection.selected.status, ApplicationStatus::Selected);
        assert_eq!(selection.rejected.len(), 2);
        assert_eq!(selection.job.provider_id, Some(providers[1].id));
        assert_eq!(selection.job.status, JobStatus::Accepted);

        let stored = h.db.get_job_applications(job.id).await.unwrap();
        for application in &stored {
            if application.id == applications[1].id {
                assert_eq!(application.status, ApplicationStatus::Selected);
            } else {
                assert_eq!(application.status, ApplicationStatus::Rejected);
            }
            assert!(application.resolved_at.is_some());
        }

        assert_eq!(
            h.notification_types(&providers[1]).await,
            vec![NotificationType::ApplicationSelected]
        );
        assert_eq!(
            h.notification_types(&providers[0]).await,
            vec![NotificationType::ApplicationRejected]
        );
        assert_eq!(
            h.notification_types(&requester).await,
            vec![NotificationType::JobApplication; 3]
        );
    }

    #[tokio::test]
    async fn posted_job_applied_by_two_selected_one() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let a = h.db.add_user("Thato", UserRole::Provider).await;
        let b = h.db.add_user("Masego", UserRole::Provider).await;
        let job = h.post(&requester).await;

        let app_a = h.jobs.apply_to_job(&a, job.id, None, None).await.unwrap();
        let app_b = h.jobs.apply_to_job(&b, job.id, None, None).await.unwrap();
        h.jobs
            .select_application(&requester, job.id, app_a.id)
            .await
            .unwrap();

        let job = h.jobs.get_job(job.id).await.unwrap();
        assert_eq!(job.provider_id, Some(a.id));
        assert_ne!(job.status, JobStatus::Open);

        let app_a = h.db.get_job_application_by_id(app_a.id).await.unwrap().unwrap();
        let app_b = h.db.get_job_application_by_id(app_b.id).await.unwrap().unwrap();
        assert_eq!(app_a.status, ApplicationStatus::Selected);
        assert_eq!(app_b.status, ApplicationStatus::Rejected);

        // A resolved application cannot be selected again.
        let err = h
            .jobs
            .select_application(&requester, job.id, app_b.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ApplicationResolved(_)));
    }

    #[tokio::test]
    async fn duplicate_application_conflicts() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let provider = h.db.add_user("Thato", UserRole::Provider).await;
        let job = h.post(&requester).await;

        h.jobs.apply_to_job(&provider, job.id, None, None).await.unwrap();
        let err = h
            .jobs
            .apply_to_job(&provider, job.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateApplication(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn second_accept_loses_the_race() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let first = h.db.add_user("Thato", UserRole::Provider).await;
        let second = h.db.add_user("Masego", UserRole::Provider).await;
        let job = h.post(&requester).await;

        let (a, b) = tokio::join!(
            h.jobs.accept_job(&first, job.id),
            h.jobs.accept_job(&second, job.id)
        );
        let outcomes = [a, b];
        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);

        let loser = outcomes.into_iter().find_map(|r| r.err()).unwrap();
        assert_eq!(loser.status_code(), axum::http::StatusCode::CONFLICT);
        assert_eq!(
            loser.to_string(),
            format!("Job {} has already been accepted", job.id)
        );
    }

    #[tokio::test]
    async fn accept_notifies_requester_and_posts_into_thread() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let provider = h.db.add_user("Thato", UserRole::Provider).await;
        let job = h.post(&requester).await;

        h.jobs.accept_job(&provider, job.id).await.unwrap();

        assert_eq!(
            h.notification_types(&requester).await,
            vec![NotificationType::JobAccepted]
        );
        let thread = h
            .db
            .get_thread_messages(ThreadKey::Job(job.id), Viewer::from(&requester), 50, 0)
            .await
            .unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].message_type, MessageType::SystemNotification);
        assert_eq!(thread[0].receiver_id, Some(requester.id));
    }

    #[tokio::test]
    async fn only_assigned_provider_advances_the_job() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let provider = h.db.add_user("Thato", UserRole::Provider).await;
        let other = h.db.add_user("Masego", UserRole::Provider).await;
        let job = h.post(&requester).await;
        h.jobs.accept_job(&provider, job.id).await.unwrap();

        let err = h
            .jobs
            .update_status(&other, job.id, JobStatus::Enroute, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_, _)));

        let err = h
            .jobs
            .update_status(&requester, job.id, JobStatus::Enroute, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_, _)));

        for next in [JobStatus::Enroute, JobStatus::Onsite, JobStatus::Completed] {
            let updated = h
                .jobs
                .update_status(&provider, job.id, next, None)
                .await
                .unwrap();
            assert_eq!(updated.status, next);
        }

        assert_eq!(
            h.notification_types(&requester).await,
            vec![
                NotificationType::JobStatusChanged,
                NotificationType::JobStatusChanged,
                NotificationType::JobStatusChanged,
                NotificationType::JobAccepted,
            ]
        );
    }

    #[tokio::test]
    async fn skipping_a_stage_is_a_bad_request() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let provider = h.db.add_user("Thato", UserRole::Provider).await;
        let job = h.post(&requester).await;
        h.jobs.accept_job(&provider, job.id).await.unwrap();

        let err = h
            .jobs
            .update_status(&provider, job.id, JobStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn open_and_accepted_cannot_be_patched_directly() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let provider = h.db.add_user("Thato", UserRole::Provider).await;
        let job = h.post(&requester).await;
        h.jobs.accept_job(&provider, job.id).await.unwrap();

        for next in [JobStatus::Open, JobStatus::Accepted] {
            let err = h
                .jobs
                .update_status(&provider, job.id, next, None)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn stale_expected_status_conflicts() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let provider = h.db.add_user("Thato", UserRole::Provider).await;
        let job = h.post(&requester).await;
        h.jobs.accept_job(&provider, job.id).await.unwrap();
        h.jobs
            .update_status(&provider, job.id, JobStatus::Enroute, Some(JobStatus::Accepted))
            .await
            .unwrap();

        let err = h
            .jobs
            .update_status(&provider, job.id, JobStatus::Enroute, Some(JobStatus::Accepted))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StaleStatus { .. }));
    }

    #[tokio::test]
    async fn cancel_notifies_assigned_provider() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let provider = h.db.add_user("Thato", UserRole::Provider).await;
        let job = h.post(&requester).await;
        h.jobs.accept_job(&provider, job.id).await.unwrap();

        let err = h
            .jobs
            .update_status(&provider, job.id, JobStatus::Cancelled, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_, _)));

        let cancelled = h
            .jobs
            .update_status(&requester, job.id, JobStatus::Cancelled, None)
            .await
            .unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert_eq!(
            h.notification_types(&provider).await,
            vec![NotificationType::JobCancelled]
        );
        assert_eq!(
            h.db.get_unread_message_count(Viewer::from(&provider)).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn direct_accept_closes_other_applications() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let acceptor = h.db.add_user("Thato", UserRole::Provider).await;
        let waiting = h.db.add_user("Masego", UserRole::Provider).await;
        let job = h.post(&requester).await;

        h.jobs.apply_to_job(&acceptor, job.id, None, None).await.unwrap();
        h.jobs.apply_to_job(&waiting, job.id, None, None).await.unwrap();
        h.jobs.accept_job(&acceptor, job.id).await.unwrap();

        let applications = h.db.get_job_applications(job.id).await.unwrap();
        for application in &applications {
            let expected = if application.provider_id == acceptor.id {
                ApplicationStatus::Selected
            } else {
                ApplicationStatus::Rejected
            };
            assert_eq!(application.status, expected);
            assert!(application.resolved_at.is_some());
        }
        assert_eq!(
            h.notification_types(&waiting).await,
            vec![NotificationType::ApplicationRejected]
        );
    }

    #[tokio::test]
    async fn cancelling_open_job_closes_pending_applications() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let applicant = h.db.add_user("Pako", UserRole::Provider).await;
        let job = h.post(&requester).await;
        h.jobs.apply_to_job(&applicant, job.id, None, None).await.unwrap();

        h.jobs
            .update_status(&requester, job.id, JobStatus::Cancelled, None)
            .await
            .unwrap();

        let applications = h.db.get_job_applications(job.id).await.unwrap();
        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0].status, ApplicationStatus::Rejected);
        assert_eq!(
            h.notification_types(&applicant).await,
            vec![NotificationType::JobCancelled]
        );
    }

    #[tokio::test]
    async fn applying_to_taken_job_conflicts() {
        let h = Harness::new();
        let requester = h.db.add_user("Kagiso", UserRole::Requester).await;
        let provider = h.db.add_user("Thato", UserRole::Provider).await;
        let late = h.db.add_user("Masego", UserRole::Provider).await;
        let job = h.post(&requester).await;
        h.jobs.accept_job(&provider, job.id).await.unwrap();

        let err = h
            .jobs
            .apply_to_job(&late, job.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::JobNotOpen(_)));
    }
}
