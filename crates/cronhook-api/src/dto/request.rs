//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Query parameters of the run-jobs webhook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunJobsQuery {
    /// Job to run regardless of its schedule.
    pub run: Option<String>,
}

/// JSON body a POST to the run-jobs webhook may carry instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunJobsBody {
    /// Job to run regardless of its schedule.
    pub run: Option<String>,
}

/// A validated run-jobs request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RunJobsRequest {
    /// Job to run; absent means run whatever is due now.
    #[validate(length(min = 1, max = 128, message = "Job name must be between 1 and 128 characters"))]
    pub run: Option<String>,
}

/// Token accepted as a query parameter by the webhook middleware.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenQuery {
    /// Webhook token.
    pub token: Option<String>,
}
