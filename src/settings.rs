//! Style parameters for the conversation
//!
//! Read by the turn builder and reveal engine, changed only through the
//! control surface. Every setter clamps to its documented range.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const SPEED_RANGE: RangeInclusive<u32> = 20..=220;
pub const COOLDOWN_RANGE: RangeInclusive<u64> = 0..=2500;
pub const MAX_TURNS_RANGE: RangeInclusive<u32> = 5..=200;
pub const VOLUME_RANGE: RangeInclusive<f32> = 0.0..=0.08;
pub const LEVEL_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// Tunable parameters of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleParams {
    /// Reveal rate in characters per second
    pub speed_cps: u32,
    /// Creativity, mapped to sampling temperature per backend
    pub tone: f32,
    /// Confrontation level, mapped to a style band in the system prompt
    pub aggression: f32,
    /// Pause between turns
    pub cooldown_ms: u64,
    pub max_turns: u32,
    pub sound_enabled: bool,
    pub volume: f32,
    pub auto_scroll: bool,
}

impl Default for StyleParams {
    fn default() -> Self {
        Self {
            speed_cps: 85,
            tone: 0.35,
            aggression: 0.7,
            cooldown_ms: 650,
            max_turns: 10,
            sound_enabled: true,
            volume: 0.03,
            auto_scroll: true,
        }
    }
}

/// Partial update from the control surface
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub speed_cps: Option<u32>,
    pub tone: Option<f32>,
    pub aggression: Option<f32>,
    pub cooldown_ms: Option<u64>,
    pub max_turns: Option<u32>,
    pub sound_enabled: Option<bool>,
    pub volume: Option<f32>,
    pub auto_scroll: Option<bool>,
}

impl StyleParams {
    pub fn set_speed(&mut self, cps: u32) {
        self.speed_cps = cps.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end());
    }

    pub fn set_tone(&mut self, tone: f32) {
        if let Some(v) = clamp_f32(tone, &LEVEL_RANGE) {
            self.tone = v;
        }
    }

    pub fn set_aggression(&mut self, aggression: f32) {
        if let Some(v) = clamp_f32(aggression, &LEVEL_RANGE) {
            self.aggression = v;
        }
    }

    pub fn set_cooldown(&mut self, ms: u64) {
        self.cooldown_ms = ms.clamp(*COOLDOWN_RANGE.start(), *COOLDOWN_RANGE.end());
    }

    pub fn set_max_turns(&mut self, max: u32) {
        self.max_turns = max.clamp(*MAX_TURNS_RANGE.start(), *MAX_TURNS_RANGE.end());
    }

    pub fn set_volume(&mut self, volume: f32) {
        if let Some(v) = clamp_f32(volume, &VOLUME_RANGE) {
            self.volume = v;
        }
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.sound_enabled = enabled;
    }

    pub fn set_auto_scroll(&mut self, enabled: bool) {
        self.auto_scroll = enabled;
    }

    /// Apply every present field of `update`, clamping each
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(v) = update.speed_cps {
            self.set_speed(v);
        }
        if let Some(v) = update.tone {
            self.set_tone(v);
        }
        if let Some(v) = update.aggression {
            self.set_aggression(v);
        }
        if let Some(v) = update.cooldown_ms {
            self.set_cooldown(v);
        }
        if let Some(v) = update.max_turns {
            self.set_max_turns(v);
        }
        if let Some(v) = update.sound_enabled {
            self.set_sound_enabled(v);
        }
        if let Some(v) = update.volume {
            self.set_volume(v);
        }
        if let Some(v) = update.auto_scroll {
            self.set_auto_scroll(v);
        }
    }
}

/// NaN is rejected rather than clamped
fn clamp_f32(value: f32, range: &RangeInclusive<f32>) -> Option<f32> {
    if value.is_nan() {
        None
    } else {
        Some(value.clamp(*range.start(), *range.end()))
    }
}
