//! # Rumor Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Storage driver and sequence throughput
//! └── src/integration/  # Cross-crate flows
//!     ├── catch_up.rs
//!     ├── crash_consistency.rs
//!     └── resolver_rounds.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p rumor-tests
//! cargo test -p rumor-tests integration::catch_up
//! cargo bench -p rumor-tests
//! ```

pub mod integration;
