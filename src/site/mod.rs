//! HTTP surface of the site: router, handlers, persistence and startup.

pub mod api;
pub mod db;
pub mod server;
