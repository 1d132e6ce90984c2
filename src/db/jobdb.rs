// db/jobdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::DBClient;
use crate::models::jobmodel::*;

#[async_trait]
pub trait JobExt {
    async fn create_job(&self, requester_id: Uuid, job: NewJob) -> Result<Job, Error>;

    async fn get_job_by_id(&self, job_id: Uuid) -> Result<Option<Job>, Error>;

    async fn get_jobs_by_ids(&self, job_ids: &[Uuid]) -> Result<Vec<Job>, Error>;

    async fn get_open_jobs(&self, limit: i64, offset: i64) -> Result<Vec<Job>, Error>;

    /// Conditional write: succeeds only while the job is open and unassigned.
    /// `None` means another writer got there first (or the job is gone).
    /// The acceptor's own pending application is selected and every other
    /// pending one rejected in the same transaction.
    async fn accept_job(
        &self,
        job_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<JobResolution>, Error>;

    /// Compare-and-swap to `cancelled` that also rejects every pending
    /// application.
    async fn cancel_job(
        &self,
        job_id: Uuid,
        expected: JobStatus,
    ) -> Result<Option<JobResolution>, Error>;

    /// Compare-and-swap on the status the caller observed.
    async fn update_job_status(
        &self,
        job_id: Uuid,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<Option<Job>, Error>;

    /// `None` when this provider already applied to the job.
    async fn create_job_application(
        &self,
        job_id: Uuid,
        provider_id: Uuid,
        cover_letter: Option<String>,
        proposed_rate: Option<f64>,
    ) -> Result<Option<JobApplication>, Error>;

    async fn get_job_applications(&self, job_id: Uuid) -> Result<Vec<JobApplication>, Error>;

    async fn get_job_application_by_id(
        &self,
        application_id: Uuid,
    ) -> Result<Option<JobApplication>, Error>;

    async fn has_applied(&self, job_id: Uuid, provider_id: Uuid) -> Result<bool, Error>;

    /// Selects one pending application, rejects the other pending ones and
    /// assigns the provider, all in one transaction. `None` when the job is no
    /// longer open or the application is no longer pending.
    async fn select_application(
        &self,
        job_id: Uuid,
        application_id: Uuid,
    ) -> Result<Option<ApplicationSelection>, Error>;
}

#[async_trait]
impl JobExt for DBClient {
    async fn create_job(&self, requester_id: Uuid, job: NewJob) -> Result<Job, Error> {
        sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (requester_id, title, description, category, location, budget)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, requester_id, provider_id, title, description, category,
                      location, budget, status, created_at, updated_at
            "#,
        )
        .bind(requester_id)
        .bind(job.title)
        .bind(job.description)
        .bind(job.category)
        .bind(job.location)
        .bind(job.budget)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_job_by_id(&self, job_id: Uuid) -> Result<Option<Job>, Error> {
        sqlx::query_as::<_, Job>(
            r#"
            SELECT id, requester_id, provider_id, title, description, category,
                   location, budget, status, created_at, updated_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_jobs_by_ids(&self, job_ids: &[Uuid]) -> Result<Vec<Job>, Error> {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Job>(
            r#"
            SELECT id, requester_id, provider_id, title, description, category,
                   location, budget, status, created_at, updated_at
            FROM jobs
            WHERE id = ANY($1)
            "#,
        )
        .bind(job_ids.to_vec())
        .fetch_all(&self.pool)
        .await
    }

    async fn get_open_jobs(&self, limit: i64, offset: i64) -> Result<Vec<Job>, Error> {
        sqlx::query_as::<_, Job>(
            r#"
            SELECT id, requester_id, provider_id, title, description, category,
                   location, budget, status, created_at, updated_at
            FROM jobs
            WHERE status = 'open'::job_status
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn accept_job(
        &self,
        job_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<JobResolution>, Error> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET provider_id = $2, status = 'accepted'::job_status, updated_at = NOW()
            WHERE id = $1
              AND status = 'open'::job_status
              AND provider_id IS NULL
            RETURNING id, requester_id, provider_id, title, description, category,
                      location, budget, status, created_at, updated_at
            "#,
        )
        .bind(job_id)
        .bind(provider_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE job_applications
            SET status = 'selected'::application_status, resolved_at = NOW()
            WHERE job_id = $1 AND provider_id = $2 AND status = 'pending'::application_status
            "#,
        )
        .bind(job_id)
        .bind(provider_id)
        .execute(&mut *tx)
        .await?;

        let rejected = sqlx::query_as::<_, JobApplication>(
            r#"
            UPDATE job_applications
            SET status = 'rejected'::application_status, resolved_at = NOW()
            WHERE job_id = $1 AND provider_id <> $2 AND status = 'pending'::application_status
            RETURNING id, job_id, provider_id, cover_letter, proposed_rate, status,
                      created_at, resolved_at
            "#,
        )
        .bind(job_id)
        .bind(provider_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(JobResolution { job, rejected }))
    }

    async fn cancel_job(
        &self,
        job_id: Uuid,
        expected: JobStatus,
    ) -> Result<Option<JobResolution>, Error> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'cancelled'::job_status, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING id, requester_id, provider_id, title, description, category,
                      location, budget, status, created_at, updated_at
            "#,
        )
        .bind(job_id)
        .bind(expected)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            return Ok(None);
        };

        let rejected = sqlx::query_as::<_, JobApplication>(
            r#"
            UPDATE job_applications
            SET status = 'rejected'::application_status, resolved_at = NOW()
            WHERE job_id = $1 AND status = 'pending'::application_status
            RETURNING id, job_id, provider_id, cover_letter, proposed_rate, status,
                      created_at, resolved_at
            "#,
        )
        .bind(job_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(JobResolution { job, rejected }))
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<Option<Job>, Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING id, requester_id, provider_id, title, description, category,
                      location, budget, status, created_at, updated_at
            "#,
        )
        .bind(job_id)
        .bind(expected)
        .bind(next)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_job_application(
        &self,
        job_id: Uuid,
        provider_id: Uuid,
        cover_letter: Option<String>,
        proposed_rate: Option<f64>,
    ) -> Result<Option<JobApplication>, Error> {
        sqlx::query_as::<_, JobApplication>(
            r#"
            INSERT INTO job_applications (job_id, provider_id, cover_letter, proposed_rate)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_id, provider_id) DO NOTHING
            RETURNING id, job_id, provider_id, cover_letter, proposed_rate, status,
                      created_at, resolved_at
            "#,
        )
        .bind(job_id)
        .bind(provider_id)
        .bind(cover_letter)
        .bind(proposed_rate)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_job_applications(&self, job_id: Uuid) -> Result<Vec<JobApplication>, Error> {
        sqlx::query_as::<_, JobApplication>(
            r#"
            SELECT id, job_id, provider_id, cover_letter, proposed_rate, status,
                   created_at, resolved_at
            FROM job_applications
            WHERE job_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_job_application_by_id(
        &self,
        application_id: Uuid,
    ) -> Result<Option<JobApplication>, Error> {
        sqlx::query_as::<_, JobApplication>(
            r#"
            SELECT id, job_id, provider_id, cover_letter, proposed_rate, status,
                   created_at, resolved_at
            FROM job_applications
            WHERE id = $1
            "#,
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn has_applied(&self, job_id: Uuid, provider_id: Uuid) -> Result<bool, Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM job_applications
                WHERE job_id = $1 AND provider_id = $2
            )
            "#,
        )
        .bind(job_id)
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn select_application(
        &self,
        job_id: Uuid,
        application_id: Uuid,
    ) -> Result<Option<ApplicationSelection>, Error> {
        let mut tx = self.pool.begin().await?;

        // Lock the job row so two selections (or a selection racing an
        // accept) serialize here.
        let open_job = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM jobs
            WHERE id = $1
              AND status = 'open'::job_status
              AND provider_id IS NULL
            FOR UPDATE
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        if open_job.is_none() {
            return Ok(None);
        }

        let selected = sqlx::query_as::<_, JobApplication>(
            r#"
            UPDATE job_applications
            SET status = 'selected'::application_status, resolved_at = NOW()
            WHERE id = $1 AND job_id = $2 AND status = 'pending'::application_status
            RETURNING id, job_id, provider_id, cover_letter, proposed_rate, status,
                      created_at, resolved_at
            "#,
        )
        .bind(application_id)
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(selected) = selected else {
            return Ok(None);
        };

        let rejected = sqlx::query_as::<_, JobApplication>(
            r#"
            UPDATE job_applications
            SET status = 'rejected'::application_status, resolved_at = NOW()
            WHERE job_id = $1 AND id <> $2 AND status = 'pending'::application_status
            RETURNING id, job_id, provider_id, cover_letter, proposed_rate, status,
                      created_at, resolved_at
            "#,
        )
        .bind(job_id)
        .bind(application_id)
        .fetch_all(&mut *tx)
        .await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET provider_id = $2, status = 'accepted'::job_status, updated_at = NOW()
            WHERE id = $1
            RETURNING id, requester_id, provider_id, title, description, category,
                      location, budget, status, created_at, updated_at
            "#,
        )
        .bind(job_id)
        .bind(selected.provider_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(ApplicationSelection {
            job,
            selected,
            rejected,
        }))
    }
}
