pub mod api;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod leave;
pub mod model;
pub mod routes;
pub mod state;
pub mod store;
pub mod workflow;
