use serde::Serialize;

/// Identity and availability fields common to every device kind.
///
/// `unique_id` is stable across refreshes; devices never disappear from a
/// snapshot mid-run, they go `available: false` instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub unique_id: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub firmware_version: String,
    pub available: bool,
}

/// Access to the common identity block of a per-kind state record.
pub trait DeviceRecord {
    fn info(&self) -> &DeviceInfo;
}

/// Device-side operating mode of a thermostat. This is the authoritative
/// field; the outward [`HvacMode`] is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PresetMode {
    Off,
    PermanentHold,
    FollowSchedule,
}

impl PresetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresetMode::Off => "Off",
            PresetMode::PermanentHold => "Permanent Hold",
            PresetMode::FollowSchedule => "Follow Schedule",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Off" => Some(PresetMode::Off),
            "Permanent Hold" => Some(PresetMode::PermanentHold),
            "Follow Schedule" => Some(PresetMode::FollowSchedule),
            _ => None,
        }
    }

    /// Outward collapse: anything that is not `Off` or `PermanentHold`
    /// reads as `auto`. Lossy on purpose.
    pub fn hvac_mode(self) -> HvacMode {
        match self {
            PresetMode::Off => HvacMode::Off,
            PresetMode::PermanentHold => HvacMode::Heat,
            _ => HvacMode::Auto,
        }
    }
}

/// Simplified outward operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HvacMode {
    Off,
    Heat,
    Auto,
}

impl HvacMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Heat => "heat",
            HvacMode::Auto => "auto",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "off" => Some(HvacMode::Off),
            "heat" => Some(HvacMode::Heat),
            "auto" => Some(HvacMode::Auto),
            _ => None,
        }
    }

    /// Reverse mapping for commands: any mode other than `off` or `heat`
    /// becomes `FollowSchedule`.
    pub fn preset(self) -> PresetMode {
        match self {
            HvacMode::Off => PresetMode::Off,
            HvacMode::Heat => PresetMode::PermanentHold,
            _ => PresetMode::FollowSchedule,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum HvacAction {
    Off,
    #[default]
    Idle,
    Heating,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateState {
    pub info: DeviceInfo,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub min_temp: f64,
    pub max_temp: f64,
    pub preset_mode: PresetMode,
    pub hvac_action: HvacAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverState {
    pub info: DeviceInfo,
    /// 0 is fully closed, 100 fully open.
    pub position: u8,
    pub is_opening: bool,
    pub is_closing: bool,
    pub is_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchState {
    pub info: DeviceInfo,
    pub is_on: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    pub info: DeviceInfo,
    pub state: String,
    pub unit: Option<String>,
    pub device_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinarySensorState {
    pub info: DeviceInfo,
    pub is_on: bool,
    pub device_class: Option<String>,
}

impl DeviceRecord for ClimateState {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

impl DeviceRecord for CoverState {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

impl DeviceRecord for SwitchState {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

impl DeviceRecord for SensorState {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

impl DeviceRecord for BinarySensorState {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }
}
