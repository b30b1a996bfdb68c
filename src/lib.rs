//! Quire: a read-through post cache with a memory tier in front of Redis.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
