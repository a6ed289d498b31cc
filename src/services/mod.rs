// src/services/mod.rs
pub mod backend_client;
pub mod lifecycle;
pub mod memory_backend;
pub mod ordering;
pub mod package_board;
pub mod pickup_runs;
pub mod refresh;
