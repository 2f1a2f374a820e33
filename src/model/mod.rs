//! Types describing the election domain, as stored and as sent over the API.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
pub mod store;
