use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::adapter::{
    BinarySensorAdapter, ClimateAdapter, CoverAdapter, SensorAdapter, SwitchAdapter,
};
use crate::config::GatewayConfig;
use crate::coordinator::{RefreshCoordinator, Snapshot};
use crate::gateway::{GatewayClient, GatewayIdentity};
use crate::logger::MessageLogger;
use crate::types::{BinarySensorState, ClimateState, CoverState, SensorState, SwitchState};
use crate::{Error, Result};

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Host-side registry the physical gateway is announced to, once, after a
/// successful connect.
pub trait DeviceRegistry {
    fn register_gateway(&self, identity: &GatewayIdentity);
}

/// Everything one configured gateway owns: the shared client and one
/// coordinator per device kind. Passed to whoever builds adapters instead
/// of living in ambient global state.
pub struct IntegrationContext<G: GatewayClient> {
    gateway: Arc<G>,
    pub identity: GatewayIdentity,
    pub climate: RefreshCoordinator<ClimateState>,
    pub covers: RefreshCoordinator<CoverState>,
    pub switches: RefreshCoordinator<SwitchState>,
    pub sensors: RefreshCoordinator<SensorState>,
    pub binary_sensors: RefreshCoordinator<BinarySensorState>,
}

/// Validate the configuration, connect with bounded retry, register the
/// gateway, and force one refresh per kind so no adapter is ever enumerated
/// from an empty cache.
pub async fn setup<G, R>(
    config: &GatewayConfig,
    gateway: G,
    registry: &R,
) -> Result<IntegrationContext<G>>
where
    G: GatewayClient,
    R: DeviceRegistry,
{
    config.validate()?;
    let gateway = Arc::new(gateway);
    let identity = connect_with_retry(gateway.as_ref(), &config.host).await?;
    registry.register_gateway(&identity);

    let logger = match &config.message_log {
        Some((mode, path)) => match MessageLogger::new(*mode, path) {
            Ok(logger) => Some(Arc::new(Mutex::new(logger))),
            Err(e) => {
                warn!(path = %path, error = %e, "could not open message log, continuing without");
                None
            }
        },
        None => None,
    };

    let climate = build_coordinator("climate", &logger, {
        let gateway = Arc::clone(&gateway);
        move || {
            let gateway = Arc::clone(&gateway);
            async move { gateway.fetch_climate_devices().await }
        }
    });
    let covers = build_coordinator("cover", &logger, {
        let gateway = Arc::clone(&gateway);
        move || {
            let gateway = Arc::clone(&gateway);
            async move { gateway.fetch_cover_devices().await }
        }
    });
    let switches = build_coordinator("switch", &logger, {
        let gateway = Arc::clone(&gateway);
        move || {
            let gateway = Arc::clone(&gateway);
            async move { gateway.fetch_switch_devices().await }
        }
    });
    let sensors = build_coordinator("sensor", &logger, {
        let gateway = Arc::clone(&gateway);
        move || {
            let gateway = Arc::clone(&gateway);
            async move { gateway.fetch_sensor_devices().await }
        }
    });
    let binary_sensors = build_coordinator("binary_sensor", &logger, {
        let gateway = Arc::clone(&gateway);
        move || {
            let gateway = Arc::clone(&gateway);
            async move { gateway.fetch_binary_sensor_devices().await }
        }
    });

    initial_refresh(&climate).await;
    initial_refresh(&covers).await;
    initial_refresh(&switches).await;
    initial_refresh(&sensors).await;
    initial_refresh(&binary_sensors).await;

    Ok(IntegrationContext {
        gateway,
        identity,
        climate,
        covers,
        switches,
        sensors,
        binary_sensors,
    })
}

async fn connect_with_retry<G: GatewayClient>(gateway: &G, host: &str) -> Result<GatewayIdentity> {
    let mut attempt = 1;
    loop {
        match gateway.connect().await {
            Ok(identity) => {
                debug!(host = %host, unique_id = %identity.unique_id, attempt, "connected to gateway");
                return Ok(identity);
            }
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                warn!(host = %host, attempt, error = %e, "gateway connect failed, retrying");
                attempt += 1;
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(Error::Authentication) => {
                error!(host = %host, "authentication failed: check the gateway token");
                return Err(Error::Authentication);
            }
            Err(e) => {
                error!(host = %host, error = %e, "could not reach gateway: check the configured host");
                return Err(e);
            }
        }
    }
}

fn build_coordinator<T, F, Fut>(
    name: &str,
    logger: &Option<Arc<Mutex<MessageLogger>>>,
    fetch: F,
) -> RefreshCoordinator<T>
where
    T: Serialize + Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Snapshot<T>>> + Send + 'static,
{
    let mut builder = RefreshCoordinator::builder(name, fetch);
    if let Some(logger) = logger {
        builder = builder.message_log(Arc::clone(logger));
    }
    builder.build()
}

/// Initial refresh failures are not fatal; that kind starts with an empty
/// snapshot and recovers on a later poll, as the stale-cache policy says.
async fn initial_refresh<T>(coordinator: &RefreshCoordinator<T>)
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    if let Err(e) = coordinator.request_refresh().await {
        warn!(coordinator = %coordinator.name(), error = %e, "initial refresh failed, starting empty");
    }
}

impl<G: GatewayClient> IntegrationContext<G> {
    pub fn gateway(&self) -> Arc<G> {
        Arc::clone(&self.gateway)
    }

    pub fn climate_adapters(&self) -> Vec<ClimateAdapter<G>> {
        self.climate
            .read()
            .keys()
            .map(|id| ClimateAdapter::new(self.climate.clone(), Arc::clone(&self.gateway), id.clone()))
            .collect()
    }

    pub fn climate_adapter(&self, device_id: &str) -> Result<ClimateAdapter<G>> {
        if !self.climate.read().contains_key(device_id) {
            return Err(Error::UnknownDevice(device_id.to_string()));
        }
        Ok(ClimateAdapter::new(
            self.climate.clone(),
            Arc::clone(&self.gateway),
            device_id,
        ))
    }

    pub fn cover_adapters(&self) -> Vec<CoverAdapter<G>> {
        self.covers
            .read()
            .keys()
            .map(|id| CoverAdapter::new(self.covers.clone(), Arc::clone(&self.gateway), id.clone()))
            .collect()
    }

    pub fn cover_adapter(&self, device_id: &str) -> Result<CoverAdapter<G>> {
        if !self.covers.read().contains_key(device_id) {
            return Err(Error::UnknownDevice(device_id.to_string()));
        }
        Ok(CoverAdapter::new(
            self.covers.clone(),
            Arc::clone(&self.gateway),
            device_id,
        ))
    }

    pub fn switch_adapters(&self) -> Vec<SwitchAdapter<G>> {
        self.switches
            .read()
            .keys()
            .map(|id| {
                SwitchAdapter::new(self.switches.clone(), Arc::clone(&self.gateway), id.clone())
            })
            .collect()
    }

    pub fn switch_adapter(&self, device_id: &str) -> Result<SwitchAdapter<G>> {
        if !self.switches.read().contains_key(device_id) {
            return Err(Error::UnknownDevice(device_id.to_string()));
        }
        Ok(SwitchAdapter::new(
            self.switches.clone(),
            Arc::clone(&self.gateway),
            device_id,
        ))
    }

    pub fn sensor_adapters(&self) -> Vec<SensorAdapter<G>> {
        self.sensors
            .read()
            .keys()
            .map(|id| {
                SensorAdapter::new(self.sensors.clone(), Arc::clone(&self.gateway), id.clone())
            })
            .collect()
    }

    pub fn sensor_adapter(&self, device_id: &str) -> Result<SensorAdapter<G>> {
        if !self.sensors.read().contains_key(device_id) {
            return Err(Error::UnknownDevice(device_id.to_string()));
        }
        Ok(SensorAdapter::new(
            self.sensors.clone(),
            Arc::clone(&self.gateway),
            device_id,
        ))
    }

    pub fn binary_sensor_adapters(&self) -> Vec<BinarySensorAdapter<G>> {
        self.binary_sensors
            .read()
            .keys()
            .map(|id| {
                BinarySensorAdapter::new(
                    self.binary_sensors.clone(),
                    Arc::clone(&self.gateway),
                    id.clone(),
                )
            })
            .collect()
    }

    pub fn binary_sensor_adapter(&self, device_id: &str) -> Result<BinarySensorAdapter<G>> {
        if !self.binary_sensors.read().contains_key(device_id) {
            return Err(Error::UnknownDevice(device_id.to_string()));
        }
        Ok(BinarySensorAdapter::new(
            self.binary_sensors.clone(),
            Arc::clone(&self.gateway),
            device_id,
        ))
    }
}
