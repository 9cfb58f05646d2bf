//! Event bus infrastructure - In-process publisher and dispatcher

mod channel;

pub use channel::{ChannelEventPublisher, EventDispatcher};
