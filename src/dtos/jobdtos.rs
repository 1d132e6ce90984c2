use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::jobmodel::{JobStatus, NewJob};

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobDto {
    #[validate(length(min = 3, max = 150, message = "Title must be between 3 and 150 characters"))]
    pub title: String,

    #[validate(length(min = 10, max = 2000, message = "Description must be between 10 and 2000 characters"))]
    pub description: String,

    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,

    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,

    #[validate(range(min = 0.0, message = "Budget must be positive"))]
    pub budget: Option<f64>,
}

impl From<CreateJobDto> for NewJob {
    fn from(dto: CreateJobDto) -> Self {
        NewJob {
            title: dto.title.trim().to_string(),
            description: dto.description.trim().to_string(),
            category: dto.category.trim().to_lowercase(),
            location: dto.location.trim().to_string(),
            budget: dto.budget,
        }
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ApplyJobDto {
    #[validate(length(max = 2000, message = "Cover letter must be at most 2000 characters"))]
    pub cover_letter: Option<String>,

    #[validate(range(min = 0.0, message = "Proposed rate must be positive"))]
    pub proposed_rate: Option<f64>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct UpdateJobStatusDto {
    pub status: JobStatus,
    /// Status the caller last saw; the update fails with 409 if it moved on.
    pub expected_status: Option<JobStatus>,
}
