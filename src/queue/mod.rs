//! Bounded outbound message queue

mod outbound;

pub use outbound::OutboundQueue;
