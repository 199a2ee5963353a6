//! Deterministic plan generation from a day's recovery snapshot
//!
//! Everything here is pure: no clock reads, no I/O, no randomness. Callers
//! build a `DailySummary` (see `summary.rs`) and render the returned `Plan`
//! (see `telegram.rs`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ---------------------------------------------------------------------------
/// Thresholds and Fixed Copy
/// ---------------------------------------------------------------------------

/// HRV more than 10% below the 7-day baseline
const LOW_HRV_DELTA_PCT: f64 = -10.0;
/// Resting HR more than 5% above the 7-day baseline
const HIGH_RHR_DELTA_PCT: f64 = 5.0;
/// Under 6 hours asleep
const SLEEP_DEBT_MINUTES: i64 = 360;
/// Crude load ceiling on the Garmin training-load scale
const HIGH_LOAD_7D: f64 = 600.0;

const SHORT_WINDOW_MAX_MIN: i64 = 15;
const MEDIUM_WINDOW_MAX_MIN: i64 = 30;

pub const PHASE_FOLLICULAR: &str = "follicular";
pub const PHASE_OVULATORY: &str = "ovulatory";
pub const PHASE_LATE_LUTEAL: &str = "late_luteal";

const RENOVATION_TAG: &str = "renovation";

const SLEEP_DEBT_ADVICE: &str = "Aim 7h30–8h sleep tonight; cool room; wind-down 30 min.";
const ELECTROLYTES_ADVICE: &str = "+500 ml electrolytes after session";
const LATE_LUTEAL_ADVICE: &str = "Gentle p.m. mobility 10 min; prioritize sleep.";

const HIGH_PERFORMANCE_NOTE: &str =
  "You’re in a high-performance window—OK to push intensity if you feel fresh.";
const LATE_LUTEAL_NOTE: &str = "Late luteal—deload 15–25% and favor low-impact work.";

pub const PLAN_NOTES: &str = "Session adapted to time and context; avoid stacking two hard days.";

/// ---------------------------------------------------------------------------
/// Input
/// ---------------------------------------------------------------------------

/// One day of readings plus the rolling baselines they are judged against.
///
/// Only `date`, `context` and `time_min` are guaranteed; every reading may be
/// missing when a provider had nothing for the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
  pub date: NaiveDate,
  pub hrv_ms: Option<f64>,
  pub rhr_bpm: Option<f64>,
  /// Already resolved Whoop -> Garmin -> manual
  pub sleep_min: Option<i64>,
  pub temp_delta: Option<f64>,
  /// Garmin training load summed over the trailing 7 days
  pub load_7d: Option<f64>,
  pub avg7_hrv_ms: Option<f64>,
  pub avg7_rhr_bpm: Option<f64>,
  /// "follicular" | "ovulatory" | "early_luteal" | "late_luteal" | "menstruation"
  pub cycle_phase: Option<String>,
  /// Free-form tags, e.g. "renovation", "holiday"
  #[serde(default)]
  pub context: Vec<String>,
  pub time_min: i64,
}

/// ---------------------------------------------------------------------------
/// Flags
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
  /// HRV < -10% vs 7-day average
  pub low_hrv: bool,

  /// RHR > +5% vs 7-day average
  pub high_rhr: bool,

  /// Slept under 6h
  pub sleep_debt: bool,

  /// 7-day load > 600
  pub high_load: bool,

  pub late_luteal: bool,
}

impl Flags {
  pub fn any(&self) -> bool {
    self.low_hrv || self.high_rhr || self.sleep_debt || self.high_load || self.late_luteal
  }
}

/// Percent change of `value` against `baseline`, None if either is missing
/// or the baseline is zero
fn percent_delta(value: Option<f64>, baseline: Option<f64>) -> Option<f64> {
  match (value, baseline) {
    (Some(v), Some(b)) if b != 0.0 => Some((v - b) / b * 100.0),
    _ => None,
  }
}

pub fn compute_flags(summary: &DailySummary) -> Flags {
  let low_hrv = percent_delta(summary.hrv_ms, summary.avg7_hrv_ms)
    .map(|delta| delta < LOW_HRV_DELTA_PCT)
    .unwrap_or(false);

  let high_rhr = percent_delta(summary.rhr_bpm, summary.avg7_rhr_bpm)
    .map(|delta| delta > HIGH_RHR_DELTA_PCT)
    .unwrap_or(false);

  let sleep_debt = summary
    .sleep_min
    .map(|min| min < SLEEP_DEBT_MINUTES)
    .unwrap_or(false);

  let high_load = summary
    .load_7d
    .map(|load| load > HIGH_LOAD_7D)
    .unwrap_or(false);

  Flags {
    low_hrv,
    high_rhr,
    sleep_debt,
    high_load,
    late_luteal: summary.cycle_phase.as_deref() == Some(PHASE_LATE_LUTEAL),
  }
}

/// ---------------------------------------------------------------------------
/// Focus
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusCategory {
  #[serde(rename = "Recovery / Deload")]
  RecoveryDeload,
  #[serde(rename = "Speed / Strength")]
  SpeedStrength,
  #[serde(rename = "Aerobic Base / Skills")]
  AerobicBase,
}

impl FocusCategory {
  pub fn as_str(&self) -> &'static str {
    match self {
      FocusCategory::RecoveryDeload => "Recovery / Deload",
      FocusCategory::SpeedStrength => "Speed / Strength",
      FocusCategory::AerobicBase => "Aerobic Base / Skills",
    }
  }
}

impl fmt::Display for FocusCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

fn is_high_performance_phase(cycle_phase: Option<&str>) -> bool {
  matches!(cycle_phase, Some(PHASE_FOLLICULAR) | Some(PHASE_OVULATORY))
}

/// Any red flag (or late luteal) wins over everything else; the sprint
/// window only applies on a clean day.
pub fn pick_focus(flags: &Flags, cycle_phase: Option<&str>) -> FocusCategory {
  if flags.any() {
    FocusCategory::RecoveryDeload
  } else if is_high_performance_phase(cycle_phase) {
    FocusCategory::SpeedStrength
  } else {
    FocusCategory::AerobicBase
  }
}

/// ---------------------------------------------------------------------------
/// Session Blocks
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBlock {
  pub name: String,
  pub duration_min: i64,
  pub content: Vec<String>,
}

fn block(name: &str, duration_min: i64, content: &[&str]) -> SessionBlock {
  SessionBlock {
    name: name.to_string(),
    duration_min,
    content: content.iter().map(|c| c.to_string()).collect(),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeBand {
  /// <= 15 min
  Short,
  /// 16-30 min
  Medium,
  /// > 30 min, no upper split
  Long,
}

impl TimeBand {
  fn from_minutes(time_min: i64) -> Self {
    if time_min <= SHORT_WINDOW_MAX_MIN {
      TimeBand::Short
    } else if time_min <= MEDIUM_WINDOW_MAX_MIN {
      TimeBand::Medium
    } else {
      TimeBand::Long
    }
  }
}

/// Pick the blocks that fit today's window.
///
/// A renovation day means no heavy legs, so speed/strength content falls back
/// to the aerobic set for the same window. Recovery content is left alone.
pub fn compose_blocks(focus: FocusCategory, time_min: i64, context: &[String]) -> Vec<SessionBlock> {
  let reno = context.iter().any(|tag| tag == RENOVATION_TAG);
  let focus = match focus {
    FocusCategory::SpeedStrength if reno => FocusCategory::AerobicBase,
    other => other,
  };

  match (TimeBand::from_minutes(time_min), focus) {
    (TimeBand::Short, FocusCategory::RecoveryDeload) => vec![
      block("Mobility", 8, &["hips", "t-spine", "calves"]),
      block("Core", 5, &["side plank 2×30″ each", "dead-bug 2×8"]),
    ],
    (TimeBand::Short, FocusCategory::SpeedStrength) => vec![
      block("Accel", 10, &["boots: 3×20 m accel (full rec)", "2×20 m strides"]),
      block("Core", 5, &["pallof press 2×8 each"]),
    ],
    (TimeBand::Short, FocusCategory::AerobicBase) => vec![
      block("Z2 brisk walk", 12, &["RPE 3–4"]),
    ],

    (TimeBand::Medium, FocusCategory::RecoveryDeload) => vec![
      block("Mobility", 8, &["hips", "t-spine", "calves"]),
      block("Technique", 10, &["wall drill A/B", "4×20 m strides (boots)"]),
      block("Core", 5, &["side plank 3×30″ each"]),
    ],
    (TimeBand::Medium, FocusCategory::SpeedStrength) => vec![
      block("Accel + Plyo", 12, &["boots: 4×20 m accel", "broad jump 3×4"]),
      block("Strength (at-home)", 10, &["backpack split squat 3×8-e"]),
      block("Core", 5, &["dead-bug 3×8"]),
    ],
    (TimeBand::Medium, FocusCategory::AerobicBase) => vec![
      block("Z2 run / bike", 20, &["HR < 75% max"]),
      block("Mobility", 8, &["hips", "glutes"]),
    ],

    (TimeBand::Long, FocusCategory::RecoveryDeload) => vec![
      block("Z2 run / bike", 25, &["HR < 75% max"]),
      block("Mobility", 10, &["full lower + t-spine"]),
      block("Core", 10, &["side plank 3×30″", "dead-bug 3×10"]),
    ],
    (TimeBand::Long, FocusCategory::SpeedStrength) => vec![
      block("Accel + Plyo", 15, &["boots: 4×20 m accel", "fly 2×20 m", "broad jump 3×3"]),
      block("Strength (at-home)", 20, &["backpack front squat 4×6", "single-leg RDL 3×8-e"]),
      block("Core", 8, &["pallof press 3×8-e"]),
    ],
    (TimeBand::Long, FocusCategory::AerobicBase) => vec![
      block("Z2 long", 35, &["HR < 75% max"]),
      block("Technique", 10, &["passing / ball-handling (trainers)"]),
    ],
  }
}

/// ---------------------------------------------------------------------------
/// Plan
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
  pub day_focus: FocusCategory,
  pub sessions: Vec<SessionBlock>,
  pub recovery: Vec<String>,
  pub flags: Flags,
  pub cycle_note: Option<String>,
  pub notes: String,
}

fn recovery_guidance(flags: &Flags, cycle_phase: Option<&str>) -> Vec<String> {
  let mut recovery = Vec::new();
  if flags.sleep_debt {
    recovery.push(SLEEP_DEBT_ADVICE.to_string());
  }
  recovery.push(ELECTROLYTES_ADVICE.to_string());
  if cycle_phase == Some(PHASE_LATE_LUTEAL) {
    recovery.push(LATE_LUTEAL_ADVICE.to_string());
  }
  recovery
}

fn cycle_note(cycle_phase: Option<&str>) -> Option<String> {
  if is_high_performance_phase(cycle_phase) {
    Some(HIGH_PERFORMANCE_NOTE.to_string())
  } else if cycle_phase == Some(PHASE_LATE_LUTEAL) {
    Some(LATE_LUTEAL_NOTE.to_string())
  } else {
    None
  }
}

pub fn generate_plan(summary: &DailySummary) -> Plan {
  let cycle_phase = summary.cycle_phase.as_deref();

  let flags = compute_flags(summary);
  let focus = pick_focus(&flags, cycle_phase);
  let sessions = compose_blocks(focus, summary.time_min, &summary.context);

  Plan {
    day_focus: focus,
    sessions,
    recovery: recovery_guidance(&flags, cycle_phase),
    flags,
    cycle_note: cycle_note(cycle_phase),
    notes: PLAN_NOTES.to_string(),
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
