mod adapter;
mod bootstrap;
mod config;
mod coordinator;
mod error;
mod gateway;
mod logger;
mod types;

pub use adapter::{
    BinarySensorAdapter, ClimateAdapter, ClimateCommand, CoverAdapter, CoverCommand,
    EntityAdapter, SensorAdapter, SwitchAdapter, SwitchCommand,
};
pub use bootstrap::{setup, DeviceRegistry, IntegrationContext};
pub use config::{GatewayConfig, DEFAULT_GATEWAY_NAME, TOKEN_LENGTH};
pub use coordinator::{
    RefreshCoordinator, RefreshCoordinatorBuilder, Snapshot, SubscriptionHandle,
    DEFAULT_FETCH_TIMEOUT, DEFAULT_SCAN_INTERVAL,
};
pub use error::{Error, Result};
pub use gateway::{GatewayClient, GatewayIdentity};
pub use logger::{MessageLogMode, MessageLogger};
pub use types::*;
