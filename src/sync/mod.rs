pub mod assignee;
pub mod collector;
pub mod dedup;
pub mod labels;
pub mod markers;
pub mod observe;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
