//! Workflow events
//!
//! Broadcast pub/sub for progress reporting. Producers (workflow engine,
//! approval gateway) publish; dashboards, notifiers and tests subscribe.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Producer   │────▶│  Event Bus   │────▶│  Subscribers │
//! │  (publish)   │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

pub mod bus;
pub mod types;

pub use bus::{EventBus, SharedEventBus};
pub use types::WorkflowEvent;
