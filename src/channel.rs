//! Pull interface of the two input channels.
//!
//! The engine never blocks on a channel. It peeks at the head item to decide
//! what to do, pops only what it has decided to consume, and reports
//! `NeedMore` when a channel is empty but not exhausted. Synchronization
//! between a producer thread and the engine is the channel's business; see
//! [`item_queue`](crate::queue::item_queue) for a thread-safe implementation.

use crate::item::{Item, ItemTiming};
use crate::segment::TimeSegment;

/// Identifies one of the two channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// The regular frame stream.
    Primary,
    /// The sparse stream merged onto frames.
    Auxiliary,
}

impl ChannelId {
    /// Returns the name of this channel.
    pub fn name(&self) -> &'static str {
        match self {
            ChannelId::Primary => "primary",
            ChannelId::Auxiliary => "auxiliary",
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered pull source of timestamped items.
pub trait Channel {
    /// Payload type of the items.
    type Payload;

    /// Timing of the head item, without consuming it.
    ///
    /// Segments queued ahead of the head item must be taken with
    /// [`take_segment`](Channel::take_segment) first; the engine always
    /// does so before peeking.
    fn peek(&self) -> Option<ItemTiming>;

    /// Consume the head item.
    fn pop(&mut self) -> Option<Item<Self::Payload>>;

    /// Whether end of stream has been signalled and nothing is left to
    /// take.
    ///
    /// Must be answered atomically with respect to the producer: a channel
    /// that still holds an item or a segment is never exhausted, so an
    /// empty `peek` followed by `is_exhausted() == true` means no item can
    /// follow.
    fn is_exhausted(&self) -> bool;

    /// Take a segment update serialized ahead of the head item.
    fn take_segment(&mut self) -> Option<TimeSegment> {
        None
    }
}
