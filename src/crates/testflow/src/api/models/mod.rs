//! API request and response bodies

pub mod generation;
pub mod system;

pub use generation::{
    LaunchResponse, OneClickBody, RequirementAnalysisRequest, TestCaseDesignRequest,
    TestCaseOptimizationRequest, TestPointGenerationRequest,
};
pub use system::{ActiveOnlyQuery, CancelResponse, HealthResponse, LimitQuery, QueueStatus};
