//! # Pubsub Test Suite
//!
//! Unified test crate exercising the bus through its public API only.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── delivery.rs   # Completeness, ordering, fan-out, slow readers
//!     ├── cloning.rs    # try_clone inherits the undelivered buffer
//!     ├── shutdown.rs   # Cascading close, done ordering, rejection
//!     └── broker.rs     # BrokerBus over MemoryBroker, Transport seam
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p pubsub-tests
//!
//! # By category
//! cargo test -p pubsub-tests integration::shutdown::
//! ```

#![allow(dead_code)]
