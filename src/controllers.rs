use std::collections::HashMap;
use std::f32::consts::TAU;

use tracing::debug;

use crate::config::{CONTROL_MAX, CONTROL_MIN, EngineConfig};

const CC_STATUS_MIN: u8 = 0xB0;
const CC_STATUS_MAX: u8 = 0xBF;
const DATA_MASK: u8 = 0x7F;

/// Which zone of the control range a raw value falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlZone {
    Left,
    Dead,
    Right,
}

/// Logical control channels owned by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlChannel {
    Morph,
    RotateX,
    RotateY,
    RotateZ,
}

impl ControlChannel {
    pub const VALUES: [ControlChannel; 4] = [
        ControlChannel::Morph,
        ControlChannel::RotateX,
        ControlChannel::RotateY,
        ControlChannel::RotateZ,
    ];

    pub const COUNT: usize = Self::VALUES.len();

    pub fn index(self) -> usize {
        match self {
            ControlChannel::Morph => 0,
            ControlChannel::RotateX => 1,
            ControlChannel::RotateY => 2,
            ControlChannel::RotateZ => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ControlChannel::Morph => "MORPH",
            ControlChannel::RotateX => "ROT X",
            ControlChannel::RotateY => "ROT Y",
            ControlChannel::RotateZ => "ROT Z",
        }
    }
}

/// Splits the 0..=127 range into left, dead and right zones.
#[derive(Clone, Copy, Debug)]
pub struct ZoneMap {
    left_max: i32,
    right_min: i32,
}

impl Default for ZoneMap {
    fn default() -> Self {
        Self {
            left_max: 52,
            right_min: 74,
        }
    }
}

impl ZoneMap {
    pub fn new(left_max: i32, right_min: i32) -> Self {
        Self {
            left_max,
            right_min,
        }
    }

    pub fn classify(&self, raw: i32) -> ControlZone {
        let raw = raw.clamp(CONTROL_MIN, CONTROL_MAX);
        if raw <= self.left_max {
            ControlZone::Left
        } else if raw >= self.right_min {
            ControlZone::Right
        } else {
            ControlZone::Dead
        }
    }

    /// Signed speed in [-1, 1]. Each live zone ramps linearly from one
    /// step's worth of speed at its inner edge to full speed at the outer
    /// extreme; only raw 0 and raw 127 saturate.
    pub fn speed(&self, raw: i32) -> f32 {
        let raw = raw.clamp(CONTROL_MIN, CONTROL_MAX);
        match self.classify(raw) {
            ControlZone::Dead => 0.0,
            ControlZone::Left => {
                let span = (self.left_max - CONTROL_MIN) as f32;
                let depth = (self.left_max - raw) as f32 / span;
                -ramp(1.0 / span, depth)
            }
            ControlZone::Right => {
                let span = (CONTROL_MAX - self.right_min) as f32;
                let depth = (raw - self.right_min) as f32 / span;
                ramp(1.0 / span, depth)
            }
        }
    }
}

/// `edge` at depth 0, exactly 1 at depth 1.
fn ramp(edge: f32, depth: f32) -> f32 {
    let depth = depth.clamp(0.0, 1.0);
    edge * (1.0 - depth) + depth
}

/// Domain of the quantity a controller drives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MotionDomain {
    /// Clamped into `[min, max]`, e.g. morph progress.
    Clamped { min: f32, max: f32 },
    /// Wrapped into `[0, period)`, e.g. a rotation angle.
    Wrapped { period: f32 },
}

impl MotionDomain {
    pub const UNIT: MotionDomain = MotionDomain::Clamped { min: 0.0, max: 1.0 };
    pub const ANGLE: MotionDomain = MotionDomain::Wrapped { period: TAU };

    pub fn apply(&self, value: f32) -> f32 {
        match *self {
            MotionDomain::Clamped { min, max } => value.clamp(min, max),
            MotionDomain::Wrapped { period } => value.rem_euclid(period),
        }
    }

    fn extreme_for(&self, raw: i32) -> Option<f32> {
        match *self {
            MotionDomain::Clamped { min, .. } if raw <= CONTROL_MIN => Some(min),
            MotionDomain::Clamped { max, .. } if raw >= CONTROL_MAX => Some(max),
            _ => None,
        }
    }
}

/// The single live accumulation loop of a controller.
///
/// Dropping the handle out of the controller is the cancellation: once
/// `MorphProgressController::stop` returns, no further tick moves the value.
#[derive(Debug, PartialEq)]
pub struct MotionHandle {
    id: u64,
    speed: f32,
}

impl MotionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }
}

/// What a control value did to the motion loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MotionTransition {
    Started { id: u64 },
    Retargeted { id: u64 },
    Stopped { id: u64 },
    Idle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlResponse {
    pub raw: i32,
    pub zone: ControlZone,
    pub speed: f32,
    pub transition: MotionTransition,
    /// Set when an extreme raw value snaps the driven quantity.
    pub snap_to: Option<f32>,
}

/// Dead-zone controller that turns a bounded control value into a
/// sustained velocity on a scalar quantity.
#[derive(Debug)]
pub struct MorphProgressController {
    zones: ZoneMap,
    domain: MotionDomain,
    rate: f32,
    snap_extremes: bool,
    motion: Option<MotionHandle>,
    next_id: u64,
    last_raw: i32,
}

impl MorphProgressController {
    /// `rate` is the domain distance covered per second at full speed.
    pub fn new(zones: ZoneMap, domain: MotionDomain, rate: f32) -> Self {
        Self {
            zones,
            domain,
            rate,
            snap_extremes: false,
            motion: None,
            next_id: 1,
            last_raw: (zones.left_max + zones.right_min) / 2,
        }
    }

    pub fn for_channel(channel: ControlChannel, config: &EngineConfig) -> Self {
        let zones = ZoneMap::new(config.left_zone_max, config.right_zone_min);
        let controller = match channel {
            ControlChannel::Morph => Self::new(zones, MotionDomain::UNIT, 1.0),
            _ => Self::new(zones, MotionDomain::ANGLE, config.rotation_rate),
        };
        controller.with_snap_extremes(config.snap_extremes)
    }

    pub fn with_snap_extremes(mut self, snap: bool) -> Self {
        self.snap_extremes = snap;
        self
    }

    pub fn on_control_value(&mut self, raw: i32) -> ControlResponse {
        let raw = raw.clamp(CONTROL_MIN, CONTROL_MAX);
        self.last_raw = raw;
        let zone = self.zones.classify(raw);
        let speed = self.zones.speed(raw);

        let transition = if zone == ControlZone::Dead {
            match self.stop() {
                Some(handle) => MotionTransition::Stopped { id: handle.id },
                None => MotionTransition::Idle,
            }
        } else if let Some(handle) = self.motion.as_mut() {
            handle.speed = speed;
            MotionTransition::Retargeted { id: handle.id }
        } else {
            MotionTransition::Started {
                id: self.start(speed),
            }
        };

        let snap_to = if self.snap_extremes {
            self.domain.extreme_for(raw)
        } else {
            None
        };

        debug!(raw, ?zone, speed, ?transition, "control value");
        ControlResponse {
            raw,
            zone,
            speed,
            transition,
            snap_to,
        }
    }

    fn start(&mut self, speed: f32) -> u64 {
        if let Some(previous) = self.stop() {
            debug!(id = previous.id, "replacing motion loop");
        }
        let id = self.next_id;
        self.next_id += 1;
        self.motion = Some(MotionHandle { id, speed });
        debug!(id, speed, "motion loop started");
        id
    }

    /// Cancels the running loop, if any, and hands back its handle.
    pub fn stop(&mut self) -> Option<MotionHandle> {
        let handle = self.motion.take();
        if let Some(handle) = &handle {
            debug!(id = handle.id, "motion loop stopped");
        }
        handle
    }

    /// Advances `value` by the loop speed over `dt` seconds of real time.
    /// Returns whether the loop is running.
    pub fn tick(&self, value: &mut f32, dt: f32) -> bool {
        let Some(handle) = &self.motion else {
            return false;
        };
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        *value = self.domain.apply(*value + handle.speed * self.rate * dt);
        true
    }

    pub fn is_running(&self) -> bool {
        self.motion.is_some()
    }

    pub fn motion(&self) -> Option<&MotionHandle> {
        self.motion.as_ref()
    }

    pub fn speed(&self) -> f32 {
        self.motion.as_ref().map(|handle| handle.speed).unwrap_or(0.0)
    }

    pub fn last_raw(&self) -> i32 {
        self.last_raw
    }
}

/// A decoded MIDI control-change message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlMessage {
    pub channel: u8,
    pub controller: u8,
    pub value: u8,
}

impl ControlMessage {
    /// Decodes a 3-byte control-change message; anything else is ignored.
    pub fn from_midi(bytes: &[u8]) -> Option<Self> {
        let [status, controller, value] = bytes else {
            return None;
        };
        if !(CC_STATUS_MIN..=CC_STATUS_MAX).contains(status) {
            return None;
        }
        Some(Self {
            channel: status - CC_STATUS_MIN,
            controller: controller & DATA_MASK,
            value: value & DATA_MASK,
        })
    }
}

/// Maps CC numbers onto the engine's control channels.
#[derive(Clone, Debug)]
pub struct ChannelMap {
    lookup: HashMap<u8, ControlChannel>,
}

impl Default for ChannelMap {
    fn default() -> Self {
        let mut lookup = HashMap::new();
        lookup.insert(1, ControlChannel::Morph);
        lookup.insert(16, ControlChannel::RotateX);
        lookup.insert(17, ControlChannel::RotateY);
        lookup.insert(18, ControlChannel::RotateZ);
        Self { lookup }
    }
}

impl ChannelMap {
    pub fn bind(&mut self, controller: u8, channel: ControlChannel) {
        self.lookup.insert(controller & DATA_MASK, channel);
    }

    pub fn route(&self, message: &ControlMessage) -> Option<(ControlChannel, i32)> {
        self.lookup
            .get(&message.controller)
            .map(|channel| (*channel, message.value as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn morph_controller() -> MorphProgressController {
        MorphProgressController::new(ZoneMap::default(), MotionDomain::UNIT, 1.0)
    }

    #[test]
    fn zone_edges() {
        let zones = ZoneMap::default();
        assert_eq!(zones.classify(52), ControlZone::Left);
        assert_eq!(zones.classify(53), ControlZone::Dead);
        assert_eq!(zones.classify(73), ControlZone::Dead);
        assert_eq!(zones.classify(74), ControlZone::Right);
        assert_eq!(zones.classify(-20), ControlZone::Left);
        assert_eq!(zones.classify(400), ControlZone::Right);
    }

    #[test]
    fn speed_saturates_at_extremes() {
        let zones = ZoneMap::default();
        assert_eq!(zones.speed(0), -1.0);
        assert_eq!(zones.speed(127), 1.0);
        assert!((zones.speed(52) + 1.0 / 52.0).abs() < 1e-6);
        assert!((zones.speed(74) - 1.0 / 53.0).abs() < 1e-6);
    }

    #[test]
    fn only_the_extremes_reach_full_speed() {
        let zones = ZoneMap::default();
        assert!(zones.speed(1) > -1.0);
        assert!(zones.speed(1) > zones.speed(0));
        assert!(zones.speed(126) < 1.0);
        assert!(zones.speed(126) < zones.speed(127));
    }

    #[test]
    fn retarget_keeps_handle() {
        let mut controller = morph_controller();
        let first = controller.on_control_value(100);
        let MotionTransition::Started { id } = first.transition else {
            panic!("expected start, got {:?}", first.transition);
        };
        let second = controller.on_control_value(120);
        assert_eq!(second.transition, MotionTransition::Retargeted { id });
        assert_eq!(controller.motion().map(MotionHandle::id), Some(id));
    }

    #[test]
    fn crossing_zones_without_dead_zone_keeps_loop() {
        let mut controller = morph_controller();
        controller.on_control_value(127);
        let response = controller.on_control_value(0);
        assert!(matches!(response.transition, MotionTransition::Retargeted { .. }));
        assert_eq!(controller.speed(), -1.0);
    }

    #[test]
    fn wrapped_domain_wraps() {
        let mut controller =
            MorphProgressController::new(ZoneMap::default(), MotionDomain::ANGLE, 1.0);
        controller.on_control_value(127);
        let mut angle = TAU - 0.25;
        controller.tick(&mut angle, 0.5);
        assert!((angle - 0.25).abs() < 1e-5);
    }

    #[test]
    fn snap_only_when_enabled() {
        let mut controller = morph_controller();
        assert_eq!(controller.on_control_value(0).snap_to, None);
        let mut controller = morph_controller().with_snap_extremes(true);
        assert_eq!(controller.on_control_value(0).snap_to, Some(0.0));
        assert_eq!(controller.on_control_value(127).snap_to, Some(1.0));
        assert_eq!(controller.on_control_value(100).snap_to, None);
    }

    #[test]
    fn decodes_control_change_only() {
        assert_eq!(
            ControlMessage::from_midi(&[0xB3, 1, 200]),
            Some(ControlMessage {
                channel: 3,
                controller: 1,
                value: 200 & 0x7F,
            })
        );
        assert_eq!(ControlMessage::from_midi(&[0x90, 60, 100]), None);
        assert_eq!(ControlMessage::from_midi(&[0xB0, 1]), None);
    }

    #[test]
    fn default_map_routes_mod_wheel() {
        let map = ChannelMap::default();
        let message = ControlMessage::from_midi(&[0xB0, 1, 90]).unwrap();
        assert_eq!(map.route(&message), Some((ControlChannel::Morph, 90)));
        let unbound = ControlMessage::from_midi(&[0xB0, 7, 90]).unwrap();
        assert_eq!(map.route(&unbound), None);
    }
}
