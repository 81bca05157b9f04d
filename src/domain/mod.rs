//! Domain logic - pure version and promotion rules independent of git operations

pub mod channel;
pub mod message;
pub mod planner;
pub mod transition;
pub mod version;

pub use channel::{Channel, ChannelMap};
pub use planner::PromotionPlan;
pub use transition::BaseRelation;
pub use version::{Stage, StageKind, Version};
