use std::future::Future;

use serde::Serialize;

use crate::coordinator::Snapshot;
use crate::types::{
    BinarySensorState, ClimateState, CoverState, PresetMode, SensorState, SwitchState,
};
use crate::Result;

/// Identity of the physical gateway, reported by `connect`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayIdentity {
    /// MAC-like EUID, unique per gateway.
    pub unique_id: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub firmware_version: String,
}

/// Boundary to the iT600 gateway.
///
/// Implementations own the wire protocol; this crate only ever calls
/// `connect` once per setup, the per-kind fetches from its coordinators, and
/// the command methods from the adapters. Fetch and command errors are
/// `Error::Connection` or `Error::Authentication`.
///
/// Methods return named `Send` futures so coordinator fetches can be driven
/// from spawned tasks.
pub trait GatewayClient: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<GatewayIdentity>> + Send;

    fn fetch_climate_devices(&self) -> impl Future<Output = Result<Snapshot<ClimateState>>> + Send;
    fn fetch_cover_devices(&self) -> impl Future<Output = Result<Snapshot<CoverState>>> + Send;
    fn fetch_switch_devices(&self) -> impl Future<Output = Result<Snapshot<SwitchState>>> + Send;
    fn fetch_sensor_devices(&self) -> impl Future<Output = Result<Snapshot<SensorState>>> + Send;
    fn fetch_binary_sensor_devices(
        &self,
    ) -> impl Future<Output = Result<Snapshot<BinarySensorState>>> + Send;

    fn set_climate_temperature(
        &self,
        device_id: &str,
        target: f64,
    ) -> impl Future<Output = Result<()>> + Send;
    fn set_climate_preset(
        &self,
        device_id: &str,
        preset: PresetMode,
    ) -> impl Future<Output = Result<()>> + Send;

    fn open_cover(&self, device_id: &str) -> impl Future<Output = Result<()>> + Send;
    fn close_cover(&self, device_id: &str) -> impl Future<Output = Result<()>> + Send;
    fn set_cover_position(
        &self,
        device_id: &str,
        position: u8,
    ) -> impl Future<Output = Result<()>> + Send;

    fn turn_on_switch(&self, device_id: &str) -> impl Future<Output = Result<()>> + Send;
    fn turn_off_switch(&self, device_id: &str) -> impl Future<Output = Result<()>> + Send;
}
