pub mod access;
pub mod agent;
pub mod config;
pub mod discovery;
pub mod fis;
pub mod skills;
