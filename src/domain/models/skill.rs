//! Skill scheduling model.
//!
//! A skill is a named callable the agent loop may invoke autonomously on
//! a schedule. The callable itself lives in the ability registry; this
//! module models the schedule and the per-agent experience state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default multiplicative experience decay applied each loop iteration.
pub const DEFAULT_XP_DECAY: f64 = 0.999;
/// Experience reward for a successful invocation.
pub const XP_REWARD: f64 = 1.0;
/// Experience penalty for a failed invocation.
pub const XP_PENALTY: f64 = 2.0;

/// A registered skill: a name plus an invocation schedule.
///
/// A `schedule_secs` of 0 means the skill is on-demand only and the loop
/// never fires it by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub schedule_secs: u64,
}

impl Skill {
    pub fn new(name: impl Into<String>, schedule_secs: u64) -> Self {
        Self {
            name: name.into(),
            schedule_secs,
        }
    }

    /// Whether the loop should fire this skill at `now`.
    pub fn is_due(&self, last_exec: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        if self.schedule_secs == 0 {
            return false;
        }
        match last_exec {
            None => true,
            Some(last) => {
                let elapsed = now.signed_duration_since(last).num_seconds();
                elapsed >= 0 && elapsed as u64 >= self.schedule_secs
            }
        }
    }
}

/// Per-agent experience and execution state for one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillState {
    pub skill: Skill,
    /// Experience score. Decays each loop iteration, grows on success.
    pub xp: f64,
    pub last_exec: Option<DateTime<Utc>>,
}

impl SkillState {
    pub fn new(skill: Skill) -> Self {
        Self {
            skill,
            xp: 0.0,
            last_exec: None,
        }
    }

    /// Applies the per-iteration multiplicative decay.
    pub fn decay(&mut self, factor: f64) {
        self.xp *= factor;
    }

    /// Records a successful invocation at `now`.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.xp += XP_REWARD;
        self.last_exec = Some(now);
    }

    /// Records a failed invocation at `now`.
    ///
    /// `last_exec` advances regardless of outcome so a failing skill is
    /// not re-fired every iteration.
    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.xp -= XP_PENALTY;
        self.last_exec = Some(now);
    }
}
