pub mod agents;
pub mod coordinator;
pub mod lifecycle;
pub mod profiles;
pub mod retry;
pub mod scoring;
pub mod tracking;
