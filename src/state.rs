//! Lock-free channel state and metrics.
//!
//! The client task is the only writer; handles on other threads read these
//! atomics without locking.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle state of the event channel. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Disconnected = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
}

impl ChannelState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ChannelState::Connecting,
            2 => ChannelState::Open,
            3 => ChannelState::Closing,
            _ => ChannelState::Disconnected,
        }
    }
}

/// Atomic wrapper around [`ChannelState`]
#[derive(Debug)]
pub struct AtomicChannelState {
    inner: AtomicU8,
}

impl AtomicChannelState {
    pub fn new(state: ChannelState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ChannelState {
        ChannelState::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ChannelState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.get() == ChannelState::Open
    }

    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.get() == ChannelState::Disconnected
    }
}

/// Atomic counters updated by the client task
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    sent: AtomicU64,
    received: AtomicU64,
    reconnects: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}

/// Point-in-time metrics snapshot
#[derive(Debug, Clone)]
pub struct ChannelMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub state: ChannelState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_atomic() {
        let state = AtomicChannelState::new(ChannelState::Disconnected);
        assert!(state.is_disconnected());

        for s in [
            ChannelState::Connecting,
            ChannelState::Open,
            ChannelState::Closing,
            ChannelState::Disconnected,
        ] {
            state.set(s);
            assert_eq!(state.get(), s);
        }
    }

    #[test]
    fn is_open_only_for_open() {
        let state = AtomicChannelState::new(ChannelState::Connecting);
        assert!(!state.is_open());
        state.set(ChannelState::Open);
        assert!(state.is_open());
        state.set(ChannelState::Closing);
        assert!(!state.is_open());
    }
}
