//! Lectern - A lightweight online course platform
//!
//! Instructors author courses made of ordered modules and typed content
//! items; students browse the catalog, enroll and follow their courses.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
