#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use salus_it600::{
    BinarySensorState, ClimateState, CoverState, DeviceInfo, DeviceRegistry, Error, GatewayClient,
    GatewayConfig, GatewayIdentity, HvacAction, PresetMode, Result, SensorState, Snapshot,
    SwitchState,
};

/// Route crate logs to the test output. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Scriptable in-process stand-in for the real gateway client. Fetches
/// clone the device tables at call time (before any configured delay), so a
/// fetch that started before a command observes pre-command state.
#[derive(Default)]
pub struct FakeGatewayState {
    pub climate: Snapshot<ClimateState>,
    pub covers: Snapshot<CoverState>,
    pub switches: Snapshot<SwitchState>,
    pub sensors: Snapshot<SensorState>,
    pub binary_sensors: Snapshot<BinarySensorState>,
    /// Every call in order, e.g. `"fetch_cover"` or `"set_cover_position c1 40"`.
    pub calls: Vec<String>,
    /// Errors returned by successive `connect` calls before succeeding.
    pub connect_failures: VecDeque<Error>,
    /// Next N fetches (any kind) fail with a connection error.
    pub fail_fetches: u32,
    /// When set, every command fails with this error.
    pub fail_commands: Option<Error>,
    pub fetch_delay: Option<Duration>,
    pub connect_count: u32,
    pub fetch_count: u32,
}

pub struct FakeGateway {
    identity: GatewayIdentity,
    state: Arc<Mutex<FakeGatewayState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        init_tracing();
        Self {
            identity: GatewayIdentity {
                unique_id: "001e5e0012345678".to_string(),
                name: "Salus iT600 Gateway".to_string(),
                manufacturer: "Salus".to_string(),
                model: "UGE600".to_string(),
                firmware_version: "2.11".to_string(),
            },
            state: Arc::new(Mutex::new(FakeGatewayState::default())),
        }
    }

    /// Handle kept by tests after the gateway itself moves into `setup`.
    pub fn state(&self) -> Arc<Mutex<FakeGatewayState>> {
        Arc::clone(&self.state)
    }

    pub fn identity(&self) -> GatewayIdentity {
        self.identity.clone()
    }

    async fn fetch<T: Clone>(
        &self,
        call: &str,
        select: fn(&FakeGatewayState) -> &Snapshot<T>,
    ) -> Result<Snapshot<T>> {
        let (snapshot, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call.to_string());
            state.fetch_count += 1;
            let delay = state.fetch_delay;
            if state.fail_fetches > 0 {
                state.fail_fetches -= 1;
                (Err(Error::Connection("gateway unreachable".to_string())), delay)
            } else {
                (Ok(select(&state).clone()), delay)
            }
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        snapshot
    }

    fn command(
        &self,
        call: String,
        apply: impl FnOnce(&mut FakeGatewayState) -> Result<()>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(e) = &state.fail_commands {
            return Err(e.clone());
        }
        apply(&mut state)
    }
}

fn unsupported(device_id: &str, command: &str) -> Error {
    Error::UnsupportedCommand {
        device_id: device_id.to_string(),
        command: command.to_string(),
    }
}

impl GatewayClient for FakeGateway {
    async fn connect(&self) -> Result<GatewayIdentity> {
        let mut state = self.state.lock().unwrap();
        state.connect_count += 1;
        if let Some(e) = state.connect_failures.pop_front() {
            return Err(e);
        }
        Ok(self.identity.clone())
    }

    async fn fetch_climate_devices(&self) -> Result<Snapshot<ClimateState>> {
        self.fetch("fetch_climate", |s| &s.climate).await
    }

    async fn fetch_cover_devices(&self) -> Result<Snapshot<CoverState>> {
        self.fetch("fetch_cover", |s| &s.covers).await
    }

    async fn fetch_switch_devices(&self) -> Result<Snapshot<SwitchState>> {
        self.fetch("fetch_switch", |s| &s.switches).await
    }

    async fn fetch_sensor_devices(&self) -> Result<Snapshot<SensorState>> {
        self.fetch("fetch_sensor", |s| &s.sensors).await
    }

    async fn fetch_binary_sensor_devices(&self) -> Result<Snapshot<BinarySensorState>> {
        self.fetch("fetch_binary_sensor", |s| &s.binary_sensors).await
    }

    async fn set_climate_temperature(&self, device_id: &str, target: f64) -> Result<()> {
        self.command(
            format!("set_climate_temperature {device_id} {target}"),
            |state| match state.climate.get_mut(device_id) {
                Some(device) => {
                    device.target_temperature = Some(target);
                    Ok(())
                }
                None => Err(unsupported(device_id, "set_climate_temperature")),
            },
        )
    }

    async fn set_climate_preset(&self, device_id: &str, preset: PresetMode) -> Result<()> {
        self.command(
            format!("set_climate_preset {device_id} {}", preset.as_str()),
            |state| match state.climate.get_mut(device_id) {
                Some(device) => {
                    device.preset_mode = preset;
                    Ok(())
                }
                None => Err(unsupported(device_id, "set_climate_preset")),
            },
        )
    }

    async fn open_cover(&self, device_id: &str) -> Result<()> {
        self.command(format!("open_cover {device_id}"), |state| {
            match state.covers.get_mut(device_id) {
                Some(device) => {
                    device.position = 100;
                    device.is_closed = false;
                    Ok(())
                }
                None => Err(unsupported(device_id, "open_cover")),
            }
        })
    }

    async fn close_cover(&self, device_id: &str) -> Result<()> {
        self.command(format!("close_cover {device_id}"), |state| {
            match state.covers.get_mut(device_id) {
                Some(device) => {
                    device.position = 0;
                    device.is_closed = true;
                    Ok(())
                }
                None => Err(unsupported(device_id, "close_cover")),
            }
        })
    }

    async fn set_cover_position(&self, device_id: &str, position: u8) -> Result<()> {
        self.command(
            format!("set_cover_position {device_id} {position}"),
            |state| match state.covers.get_mut(device_id) {
                Some(device) => {
                    device.position = position;
                    device.is_closed = position == 0;
                    Ok(())
                }
                None => Err(unsupported(device_id, "set_cover_position")),
            },
        )
    }

    async fn turn_on_switch(&self, device_id: &str) -> Result<()> {
        self.command(format!("turn_on_switch {device_id}"), |state| {
            match state.switches.get_mut(device_id) {
                Some(device) => {
                    device.is_on = true;
                    Ok(())
                }
                None => Err(unsupported(device_id, "turn_on_switch")),
            }
        })
    }

    async fn turn_off_switch(&self, device_id: &str) -> Result<()> {
        self.command(format!("turn_off_switch {device_id}"), |state| {
            match state.switches.get_mut(device_id) {
                Some(device) => {
                    device.is_on = false;
                    Ok(())
                }
                None => Err(unsupported(device_id, "turn_off_switch")),
            }
        })
    }
}

#[derive(Default)]
pub struct RecordingRegistry {
    pub registered: Mutex<Vec<GatewayIdentity>>,
}

impl DeviceRegistry for RecordingRegistry {
    fn register_gateway(&self, identity: &GatewayIdentity) {
        self.registered.lock().unwrap().push(identity.clone());
    }
}

pub fn valid_config() -> GatewayConfig {
    GatewayConfig::new("192.168.0.125", "0123456789abcdef")
}

pub fn device_info(id: &str, name: &str) -> DeviceInfo {
    DeviceInfo {
        unique_id: id.to_string(),
        name: name.to_string(),
        manufacturer: "Salus".to_string(),
        model: "iT600".to_string(),
        firmware_version: "1.0".to_string(),
        available: true,
    }
}

pub fn climate_state(id: &str) -> ClimateState {
    ClimateState {
        info: device_info(id, "Living Room"),
        current_temperature: Some(20.5),
        target_temperature: Some(21.0),
        min_temp: 5.0,
        max_temp: 35.0,
        preset_mode: PresetMode::FollowSchedule,
        hvac_action: HvacAction::Idle,
    }
}

pub fn cover_state(id: &str, position: u8) -> CoverState {
    CoverState {
        info: device_info(id, "Bedroom Blind"),
        position,
        is_opening: false,
        is_closing: false,
        is_closed: position == 0,
    }
}

pub fn switch_state(id: &str, is_on: bool) -> SwitchState {
    SwitchState {
        info: device_info(id, "Hall Plug"),
        is_on,
    }
}

pub fn sensor_state(id: &str, value: &str) -> SensorState {
    SensorState {
        info: device_info(id, "Kitchen Temperature"),
        state: value.to_string(),
        unit: Some("°C".to_string()),
        device_class: Some("temperature".to_string()),
    }
}

pub fn binary_sensor_state(id: &str, is_on: bool) -> BinarySensorState {
    BinarySensorState {
        info: device_info(id, "Window Contact"),
        is_on,
        device_class: Some("window".to_string()),
    }
}
