pub mod agent;
pub mod assignment;
pub mod event;
pub mod order;
pub mod profile;
