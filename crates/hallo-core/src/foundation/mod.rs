//! Foundation layer - events, permission masks and shared errors.

pub mod error;
pub mod event;
pub mod permission;

pub use error::{ParseEventTypeError, SendError, SendResult};
pub use event::{Addressing, Direction, Event, EventKind, EventType, RawData, TextBody};
pub use permission::{GlobalRights, PermissionMask};
