pub mod agent;
pub mod config;
pub mod discovery;
pub mod error;
pub mod event;
pub mod experiment;
pub mod orchestrator;
pub mod report;
pub mod rollback;
pub mod skill;
