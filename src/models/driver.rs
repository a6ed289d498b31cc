// src/models/driver.rs
use serde::{Deserialize, Serialize};

/// Driver as listed by the backend for the reassignment picker.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub active: bool, // Inactive drivers stay listed but cannot take packages
}
