//! # Ports Layer
//!
//! - `app.rs` - The hosted state-transition application

pub mod app;
