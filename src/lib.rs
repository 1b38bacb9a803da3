pub mod attachment;
pub mod audit;
pub mod blob;
pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod permission;
pub mod policy;
pub mod query;
pub mod repository;
pub mod service;
pub mod state;
pub mod types;
pub mod utils;

pub use document::Document;
pub use error::{Result, WorkflowError};
pub use policy::{Actor, Capability};
pub use service::WorkflowService;
