use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::warn;

use crate::coordinator::RefreshCoordinator;
use crate::gateway::GatewayClient;
use crate::types::{
    BinarySensorState, ClimateState, CoverState, DeviceInfo, DeviceRecord, HvacMode, PresetMode,
    SensorState, SwitchState,
};
use crate::{Error, Result};

/// Common half of every per-kind adapter: a device id, a read path into the
/// coordinator cache, and the post-command resync. Adapters never fetch on
/// their own.
pub struct EntityAdapter<T, G> {
    coordinator: RefreshCoordinator<T>,
    gateway: Arc<G>,
    device_id: String,
}

impl<T, G> EntityAdapter<T, G>
where
    T: Serialize + Clone + Send + Sync + 'static,
    G: GatewayClient,
{
    pub fn new(
        coordinator: RefreshCoordinator<T>,
        gateway: Arc<G>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            coordinator,
            gateway,
            device_id: device_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// State record from the latest snapshot. `UnknownDevice` if the id is
    /// absent; should not happen after bootstrap but the gateway may drop a
    /// device between refreshes.
    pub fn current_state(&self) -> Result<T> {
        self.coordinator
            .read()
            .get(&self.device_id)
            .cloned()
            .ok_or_else(|| Error::UnknownDevice(self.device_id.clone()))
    }

    pub fn info(&self) -> Result<DeviceInfo>
    where
        T: DeviceRecord,
    {
        Ok(self.current_state()?.info().clone())
    }

    pub fn available(&self) -> bool
    where
        T: DeviceRecord,
    {
        self.current_state()
            .map(|state| state.info().available)
            .unwrap_or(false)
    }

    /// Bring the cache in line with the gateway after a command. Joining an
    /// arbitrary in-flight fetch could observe pre-command state, so only a
    /// fetch started from this point on counts. Resync failures are logged,
    /// not returned; the command result is what the caller cares about.
    async fn resync(&self) {
        if let Err(e) = self.coordinator.refresh_completed_after(Instant::now()).await {
            warn!(device = %self.device_id, error = %e, "post-command refresh failed");
        }
    }

    fn log_command(&self, action: &str, body: &serde_json::Value) {
        self.coordinator.log_command(action, &self.device_id, body);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClimateCommand {
    SetTemperature(f64),
    SetHvacMode(HvacMode),
    SetPreset(PresetMode),
}

/// Thermostat adapter. The device-side preset is authoritative; the outward
/// operating mode is derived from it.
pub struct ClimateAdapter<G: GatewayClient> {
    entity: EntityAdapter<ClimateState, G>,
}

impl<G: GatewayClient> ClimateAdapter<G> {
    pub fn new(
        coordinator: RefreshCoordinator<ClimateState>,
        gateway: Arc<G>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            entity: EntityAdapter::new(coordinator, gateway, device_id),
        }
    }

    pub fn device_id(&self) -> &str {
        self.entity.device_id()
    }

    pub fn state(&self) -> Result<ClimateState> {
        self.entity.current_state()
    }

    pub fn info(&self) -> Result<DeviceInfo> {
        self.entity.info()
    }

    pub fn available(&self) -> bool {
        self.entity.available()
    }

    /// Outward mode collapsed from the stored preset: `Off` reads as `off`,
    /// `PermanentHold` as `heat`, everything else as `auto`.
    pub fn hvac_mode(&self) -> Result<HvacMode> {
        Ok(self.state()?.preset_mode.hvac_mode())
    }

    pub async fn execute(&self, command: ClimateCommand) -> Result<()> {
        let id = self.entity.device_id();
        let result = match command {
            ClimateCommand::SetTemperature(target) => {
                self.entity
                    .log_command("set_climate_temperature", &json!({ "temperature": target }));
                self.entity.gateway.set_climate_temperature(id, target).await
            }
            ClimateCommand::SetHvacMode(mode) => {
                let preset = mode.preset();
                self.entity
                    .log_command("set_climate_preset", &json!({ "preset": preset.as_str() }));
                self.entity.gateway.set_climate_preset(id, preset).await
            }
            ClimateCommand::SetPreset(preset) => {
                self.entity
                    .log_command("set_climate_preset", &json!({ "preset": preset.as_str() }));
                self.entity.gateway.set_climate_preset(id, preset).await
            }
        };
        self.entity.resync().await;
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoverCommand {
    Open,
    Close,
    SetPosition(u8),
}

pub struct CoverAdapter<G: GatewayClient> {
    entity: EntityAdapter<CoverState, G>,
}

impl<G: GatewayClient> CoverAdapter<G> {
    pub fn new(
        coordinator: RefreshCoordinator<CoverState>,
        gateway: Arc<G>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            entity: EntityAdapter::new(coordinator, gateway, device_id),
        }
    }

    pub fn device_id(&self) -> &str {
        self.entity.device_id()
    }

    pub fn state(&self) -> Result<CoverState> {
        self.entity.current_state()
    }

    pub fn info(&self) -> Result<DeviceInfo> {
        self.entity.info()
    }

    pub fn available(&self) -> bool {
        self.entity.available()
    }

    pub async fn execute(&self, command: CoverCommand) -> Result<()> {
        let id = self.entity.device_id();
        let result = match command {
            CoverCommand::Open => {
                self.entity.log_command("open_cover", &json!({}));
                self.entity.gateway.open_cover(id).await
            }
            CoverCommand::Close => {
                self.entity.log_command("close_cover", &json!({}));
                self.entity.gateway.close_cover(id).await
            }
            CoverCommand::SetPosition(position) => {
                self.entity
                    .log_command("set_cover_position", &json!({ "position": position }));
                self.entity.gateway.set_cover_position(id, position).await
            }
        };
        self.entity.resync().await;
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwitchCommand {
    TurnOn,
    TurnOff,
}

pub struct SwitchAdapter<G: GatewayClient> {
    entity: EntityAdapter<SwitchState, G>,
}

impl<G: GatewayClient> SwitchAdapter<G> {
    pub fn new(
        coordinator: RefreshCoordinator<SwitchState>,
        gateway: Arc<G>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            entity: EntityAdapter::new(coordinator, gateway, device_id),
        }
    }

    pub fn device_id(&self) -> &str {
        self.entity.device_id()
    }

    pub fn state(&self) -> Result<SwitchState> {
        self.entity.current_state()
    }

    pub fn info(&self) -> Result<DeviceInfo> {
        self.entity.info()
    }

    pub fn available(&self) -> bool {
        self.entity.available()
    }

    pub async fn execute(&self, command: SwitchCommand) -> Result<()> {
        let id = self.entity.device_id();
        let result = match command {
            SwitchCommand::TurnOn => {
                self.entity.log_command("turn_on_switch", &json!({}));
                self.entity.gateway.turn_on_switch(id).await
            }
            SwitchCommand::TurnOff => {
                self.entity.log_command("turn_off_switch", &json!({}));
                self.entity.gateway.turn_off_switch(id).await
            }
        };
        self.entity.resync().await;
        result
    }
}

/// Read-only adapter; sensors accept no commands.
pub struct SensorAdapter<G: GatewayClient> {
    entity: EntityAdapter<SensorState, G>,
}

impl<G: GatewayClient> SensorAdapter<G> {
    pub fn new(
        coordinator: RefreshCoordinator<SensorState>,
        gateway: Arc<G>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            entity: EntityAdapter::new(coordinator, gateway, device_id),
        }
    }

    pub fn device_id(&self) -> &str {
        self.entity.device_id()
    }

    pub fn state(&self) -> Result<SensorState> {
        self.entity.current_state()
    }

    pub fn info(&self) -> Result<DeviceInfo> {
        self.entity.info()
    }

    pub fn available(&self) -> bool {
        self.entity.available()
    }
}

/// Read-only adapter; binary sensors accept no commands.
pub struct BinarySensorAdapter<G: GatewayClient> {
    entity: EntityAdapter<BinarySensorState, G>,
}

impl<G: GatewayClient> BinarySensorAdapter<G> {
    pub fn new(
        coordinator: RefreshCoordinator<BinarySensorState>,
        gateway: Arc<G>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            entity: EntityAdapter::new(coordinator, gateway, device_id),
        }
    }

    pub fn device_id(&self) -> &str {
        self.entity.device_id()
    }

    pub fn state(&self) -> Result<BinarySensorState> {
        self.entity.current_state()
    }

    pub fn info(&self) -> Result<DeviceInfo> {
        self.entity.info()
    }

    pub fn available(&self) -> bool {
        self.entity.available()
    }
}
