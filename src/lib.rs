//! Newsroom - role-based news publishing
//!
//! Journalists submit articles, editors approve or reject them, and readers
//! subscribe to publishers and journalists to be mailed when new work is
//! approved. The same operations are served as a JSON API under `/api` and
//! as server-rendered pages.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod web;
