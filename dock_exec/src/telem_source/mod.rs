//! # Telemetry Source
//!
//! Provides the docking mechanism's rail telemetry. Telemetry messages may carry any subset of the
//! rail angles and heights, so each field of the cached state is timestamped individually and the
//! state is only handed out when every field is recent.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex};

use comms_if::{eqpt::dock::TelemetryMsg, net::pubsub::Subscriber};
use log::trace;

use crate::bg_thread::{self, BgThread};
use util::time;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Freshness window used by the docking controller when reading telemetry.
pub const TELEMETRY_FRESHNESS_WINDOW_MS: u64 = 100;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait TelemetrySource: Send + Sync {
    /// Get the current telemetry, or `None` if any field is older than `window_nanos`.
    fn read_telemetry(&self, window_nanos: u64) -> Option<TelemetryState>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single telemetry value and the time it was measured.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryField {
    pub value: f32,
    pub timestamp_nanos: u64,
}

/// Rail telemetry of the docking mechanism.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryState {
    /// Left rail angle in radians.
    pub left_angle: TelemetryField,

    /// Right rail angle in radians.
    pub right_angle: TelemetryField,

    /// Left rail height in meters.
    pub left_height: TelemetryField,

    /// Right rail height in meters.
    pub right_height: TelemetryField,
}

/// Telemetry source listening for [`TelemetryMsg`]s.
pub struct RailTelemetrySource {
    state: Arc<Mutex<TelemetryState>>,
    _bg: BgThread,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TelemetryField {
    pub fn new(value: f32, timestamp_nanos: u64) -> Self {
        Self {
            value,
            timestamp_nanos,
        }
    }
}

impl TelemetryState {
    /// All fields zero, measured at `timestamp_nanos`.
    pub fn zeroed(timestamp_nanos: u64) -> Self {
        let field = TelemetryField::new(0.0, timestamp_nanos);

        Self {
            left_angle: field,
            right_angle: field,
            left_height: field,
            right_height: field,
        }
    }

    /// Update the fields present in `msg`, leaving the rest untouched.
    pub fn apply(&mut self, msg: &TelemetryMsg) {
        let ts = msg.timestamp_nanos;

        update_field(&mut self.left_angle, msg.left_angle, ts);
        update_field(&mut self.right_angle, msg.right_angle, ts);
        update_field(&mut self.left_height, msg.left_height, ts);
        update_field(&mut self.right_height, msg.right_height, ts);
    }

    /// Returns true if every field was measured within `window_nanos` of `now_nanos`.
    pub fn is_fresh(&self, now_nanos: u64, window_nanos: u64) -> bool {
        [
            self.left_angle,
            self.right_angle,
            self.left_height,
            self.right_height,
        ]
        .iter()
        .all(|f| time::is_fresh(f.timestamp_nanos, now_nanos, window_nanos))
    }
}

impl RailTelemetrySource {
    /// Start listening for telemetry on the given subscriber.
    pub fn new(mut subscriber: Box<dyn Subscriber<TelemetryMsg> + Send>) -> std::io::Result<Self> {
        let state = Arc::new(Mutex::new(TelemetryState::default()));
        let state_clone = state.clone();

        let bg = BgThread::spawn("rail_telem_source", move |run| {
            bg_thread::listen("Telemetry", subscriber.as_mut(), &run, |msg| {
                trace!("Received telemetry {:?}", msg);
                bg_thread::lock(&state_clone).apply(&msg);
            })
        })?;

        Ok(Self { state, _bg: bg })
    }
}

impl TelemetrySource for RailTelemetrySource {
    fn read_telemetry(&self, window_nanos: u64) -> Option<TelemetryState> {
        let state = *bg_thread::lock(&self.state);

        if state.is_fresh(time::now_nanos(), window_nanos) {
            Some(state)
        } else {
            trace!("Telemetry is stale: {:?}", state);
            None
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn update_field(field: &mut TelemetryField, value: Option<f32>, timestamp_nanos: u64) {
    if let Some(v) = value {
        *field = TelemetryField::new(v, timestamp_nanos);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::net::pubsub::ChannelSubscriber;
    use std::{
        sync::mpsc::channel,
        thread,
        time::{Duration, Instant},
    };
    use util::time::millis_to_nanos;

    #[test]
    fn test_partial_updates_keep_other_fields() {
        let mut state = TelemetryState::default();

        state.apply(&TelemetryMsg {
            timestamp_nanos: 10,
            left_angle: Some(0.1),
            right_angle: Some(0.2),
            ..Default::default()
        });
        state.apply(&TelemetryMsg {
            timestamp_nanos: 20,
            left_height: Some(0.3),
            ..Default::default()
        });

        assert_eq!(state.left_angle, TelemetryField::new(0.1, 10));
        assert_eq!(state.right_angle, TelemetryField::new(0.2, 10));
        assert_eq!(state.left_height, TelemetryField::new(0.3, 20));
        assert_eq!(state.right_height, TelemetryField::default());
    }

    #[test]
    fn test_fresh_only_when_all_fields_recent() {
        let now = 1_000_000_000_000;
        let window = millis_to_nanos(100);
        let mut state = TelemetryState::zeroed(now);
        assert!(state.is_fresh(now, window));

        state.right_height.timestamp_nanos = now - millis_to_nanos(150);
        assert!(!state.is_fresh(now, window));
    }

    #[test]
    fn test_source_requires_every_field() {
        let (tx, rx) = channel();
        let source =
            RailTelemetrySource::new(Box::new(ChannelSubscriber::new(rx, Duration::from_millis(1))))
                .unwrap();
        let window = millis_to_nanos(1000);

        tx.send(TelemetryMsg {
            timestamp_nanos: time::now_nanos(),
            left_angle: Some(0.1),
            right_angle: Some(0.2),
            ..Default::default()
        })
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(source.read_telemetry(window).is_none());

        tx.send(TelemetryMsg {
            timestamp_nanos: time::now_nanos(),
            left_height: Some(0.3),
            right_height: Some(0.4),
            ..Default::default()
        })
        .unwrap();

        let start = Instant::now();
        let mut telem = None;
        while telem.is_none() && start.elapsed() < Duration::from_secs(1) {
            telem = source.read_telemetry(window);
            thread::sleep(Duration::from_millis(1));
        }

        let telem = telem.unwrap();
        assert_eq!(telem.left_angle.value, 0.1);
        assert_eq!(telem.right_height.value, 0.4);
    }
}
