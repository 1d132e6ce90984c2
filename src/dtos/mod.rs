use serde::{Deserialize, Serialize};
use validator::Validate;

pub mod chatdtos;
pub mod jobdtos;

pub const MAX_PAGE: usize = 100_000;

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RequestQueryDto {
    #[validate(range(min = 1, max = 100000))]
    pub page: Option<usize>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

impl RequestQueryDto {
    /// `(limit, offset)` for the storage layer.
    pub fn limit_offset(&self, default_limit: usize) -> (i64, i64) {
        let page = self.page.unwrap_or(1).clamp(1, MAX_PAGE);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, 100);
        let offset = (page - 1).saturating_mul(limit);
        (limit as i64, i64::try_from(offset).unwrap_or(i64::MAX))
    }
}
