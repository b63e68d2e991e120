//! Operator controls.
//!
//! The UI layer (or the daemon's configuration) owns these values; the session
//! polls a read-only `Controls` snapshot once per tick.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SENSITIVITY: u8 = 32;
pub const DEFAULT_CAPTURE_DELAY: Duration = Duration::from_secs(5);

/// Which capture action motion triggers. The variants are mutually exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    #[default]
    None,
    #[serde(alias = "record")]
    ContinuousRecord,
    #[serde(alias = "snapshot")]
    IntervalSnapshot,
}

impl FromStr for TriggerMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(TriggerMode::None),
            "record" | "continuous_record" => Ok(TriggerMode::ContinuousRecord),
            "snapshot" | "interval_snapshot" => Ok(TriggerMode::IntervalSnapshot),
            other => Err(anyhow!(
                "unknown trigger mode '{}' (expected none, record or snapshot)",
                other
            )),
        }
    }
}

/// Diagnostic view shown on the display frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Input,
    FrameDiff,
    MotionHist,
    GradOrient,
}

impl View {
    pub const ALL: [View; 4] = [
        View::Input,
        View::FrameDiff,
        View::MotionHist,
        View::GradOrient,
    ];

    /// Label drawn on the display frame.
    pub fn name(self) -> &'static str {
        match self {
            View::Input => "input",
            View::FrameDiff => "frame_diff",
            View::MotionHist => "motion_hist",
            View::GradOrient => "grad_orient",
        }
    }
}

impl FromStr for View {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let wanted = value.trim().to_ascii_lowercase();
        View::ALL
            .into_iter()
            .find(|view| view.name() == wanted)
            .ok_or_else(|| {
                anyhow!(
                    "unknown view '{}' (expected input, frame_diff, motion_hist or grad_orient)",
                    value
                )
            })
    }
}

/// Per-tick control snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct Controls {
    pub monitoring: bool,
    pub trigger: TriggerMode,
    /// Per-pixel intensity change that counts as motion (strictly greater than).
    pub sensitivity: u8,
    /// Minimum spacing between motion-triggered snapshots.
    pub snapshot_interval: Duration,
    /// Quiet time after the last motion before a motion recording stops.
    pub record_min_duration: Duration,
    pub alert_enabled: bool,
    pub view: View,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            monitoring: false,
            trigger: TriggerMode::None,
            sensitivity: DEFAULT_SENSITIVITY,
            snapshot_interval: DEFAULT_CAPTURE_DELAY,
            record_min_duration: DEFAULT_CAPTURE_DELAY,
            alert_enabled: false,
            view: View::Input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trigger_aliases() -> Result<()> {
        assert_eq!("record".parse::<TriggerMode>()?, TriggerMode::ContinuousRecord);
        assert_eq!(
            "Interval_Snapshot".parse::<TriggerMode>()?,
            TriggerMode::IntervalSnapshot
        );
        assert_eq!("off".parse::<TriggerMode>()?, TriggerMode::None);
        assert!("burst".parse::<TriggerMode>().is_err());
        Ok(())
    }

    #[test]
    fn view_names_round_trip() -> Result<()> {
        for view in View::ALL {
            assert_eq!(view.name().parse::<View>()?, view);
        }
        assert!("thermal".parse::<View>().is_err());
        Ok(())
    }

    #[test]
    fn defaults_keep_delays_separate_but_equal() {
        let controls = Controls::default();
        assert_eq!(controls.sensitivity, 32);
        assert_eq!(controls.snapshot_interval, Duration::from_secs(5));
        assert_eq!(controls.record_min_duration, Duration::from_secs(5));
        assert_eq!(controls.trigger, TriggerMode::None);
    }
}
