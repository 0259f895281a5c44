pub mod config;
pub mod error;
pub mod page;
pub mod record;
pub mod registry;
pub mod session;
pub mod store;
pub mod tracker;
pub mod visitor;
