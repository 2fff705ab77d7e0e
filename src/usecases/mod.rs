//! Application use cases. Orchestrate domain logic via ports.

pub mod coordinator;
pub mod delivery_queue;
pub mod notification_sink;
pub mod permission_gate;
pub mod position_source;

pub use coordinator::{Coordinator, CoordinatorSnapshot, Phase};
pub use delivery_queue::{DeliveryQueue, RetryPolicy, StatusPolicy};
pub use notification_sink::NotificationSink;
pub use permission_gate::PermissionGate;
pub use position_source::{DistanceGate, PositionSource};
