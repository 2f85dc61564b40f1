//! [`ControlFactory`] implementations for the built-in controller families.
//!
//! # Example Configuration
//!
//! ```toml
//! [[controls]]
//! tag = 1
//! type = "SimFEAdapter"
//!
//! [controls.config]
//! ip_address = "127.0.0.1"
//! ip_port = 44000
//! data_size = 256
//! daq_filters = { force = 1 }
//!
//! [[controls]]
//! tag = 2
//! type = "xPCtarget"
//!
//! [controls.config]
//! pc_type = 1
//! ip_address = "192.168.2.20"
//! ip_port = "22222"
//! app_name = "HybridControl"
//! app_path = "C:/xpc/apps"
//! mock = true
//! ```

use crate::confirm::{self, Confirm};
use crate::handshake::PollPolicy;
use crate::sim_fe_adapter::{self, SimFeAdapter};
use crate::xpc_target::{self, TargetType, XpcTarget, XpcTargetOptions};
use hsim_core::factory::{parse_config, resolve_filters};
use hsim_core::{
    ControlFactory, ExperimentalControl, FilterLookup, FilterTable, KindMap, RegistryError,
    ResponseKind, Tag,
};
use hsim_transport::mock::{ElasticPeer, SimulatedTarget};
use hsim_transport::protocol::DEFAULT_DATA_SIZE;
use hsim_transport::{SignalBus, TcpChannel, VectorChannel};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

// =============================================================================
// Configuration Types
// =============================================================================

/// Configuration for [`SimFeAdapter`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimFeAdapterConfig {
    /// Adapter element host
    #[serde(default = "default_host")]
    pub ip_address: String,

    /// Adapter element port
    #[serde(default)]
    pub ip_port: u16,

    /// Vector message length in doubles
    #[serde(default = "default_data_size")]
    pub data_size: usize,

    /// Outgoing filter tags per response kind
    #[serde(default)]
    pub ctrl_filters: KindMap<Option<Tag>>,

    /// Incoming filter tags per response kind
    #[serde(default)]
    pub daq_filters: KindMap<Option<Tag>>,

    /// Run against an in-process elastic adapter element instead of TCP
    #[serde(default)]
    pub mock: bool,

    /// Stiffness of the mock specimen
    #[serde(default = "default_stiffness")]
    pub mock_stiffness: f64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_data_size() -> usize {
    DEFAULT_DATA_SIZE
}

fn default_stiffness() -> f64 {
    1.0
}

/// Configuration for [`XpcTarget`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XpcTargetConfig {
    /// Accepted trial kinds: 1 = disp, 2 = disp+vel, 3 = disp+vel+accel
    pub pc_type: TargetType,

    /// Target host
    pub ip_address: String,

    /// Target port
    #[serde(default = "default_xpc_port")]
    pub ip_port: String,

    /// Application name
    pub app_name: String,

    /// Directory holding the application
    #[serde(default)]
    pub app_path: String,

    /// Pause after starting the application, in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Behaviour between handshake polls
    #[serde(default)]
    pub poll: PollPolicy,

    /// Outgoing filter tags per response kind
    #[serde(default)]
    pub ctrl_filters: KindMap<Option<Tag>>,

    /// Incoming filter tags per response kind
    #[serde(default)]
    pub daq_filters: KindMap<Option<Tag>>,

    /// Run against a simulated target instead of the vendor API
    #[serde(default)]
    pub mock: bool,

    /// Stiffness of the simulated specimen
    #[serde(default = "default_stiffness")]
    pub mock_stiffness: f64,
}

fn default_xpc_port() -> String {
    "22222".to_string()
}

fn default_settle_ms() -> u64 {
    1000
}

fn apply_filters(
    control: &mut dyn ExperimentalControl,
    ctrl: FilterTable,
    daq: FilterTable,
) {
    for kind in ResponseKind::ALL {
        control.set_ctrl_filter(kind, ctrl[kind].clone());
        control.set_daq_filter(kind, daq[kind].clone());
    }
}

// =============================================================================
// SimFeAdapter Factory
// =============================================================================

/// Factory for [`SimFeAdapter`] controllers.
#[derive(Debug, Default)]
pub struct SimFeAdapterFactory;

impl SimFeAdapterFactory {
    fn parse(config: &toml::Value) -> Result<SimFeAdapterConfig, RegistryError> {
        let cfg: SimFeAdapterConfig = parse_config(sim_fe_adapter::FAMILY, config.clone())?;
        if cfg.data_size < 2 {
            return Err(RegistryError::invalid_config(
                sim_fe_adapter::FAMILY,
                format!("data_size must be at least 2, got {}", cfg.data_size),
            ));
        }
        if !cfg.mock && cfg.ip_port == 0 {
            return Err(RegistryError::invalid_config(
                sim_fe_adapter::FAMILY,
                "ip_port is required unless mock = true",
            ));
        }
        Ok(cfg)
    }
}

impl ControlFactory for SimFeAdapterFactory {
    fn family(&self) -> &'static str {
        sim_fe_adapter::FAMILY
    }

    fn description(&self) -> &'static str {
        "Simulation adapter element over TCP"
    }

    fn validate(&self, config: &toml::Value) -> Result<(), RegistryError> {
        Self::parse(config).map(|_| ())
    }

    fn build(
        &self,
        tag: Tag,
        config: toml::Value,
        filters: &dyn FilterLookup,
    ) -> Result<Box<dyn ExperimentalControl>, RegistryError> {
        let cfg = Self::parse(&config)?;
        let ctrl = resolve_filters(&cfg.ctrl_filters, filters)?;
        let daq = resolve_filters(&cfg.daq_filters, filters)?;

        let channel: Box<dyn VectorChannel> = if cfg.mock {
            info!(tag, stiffness = cfg.mock_stiffness, "using mock adapter element");
            let (channel, _peer) = ElasticPeer::spawn(cfg.mock_stiffness).map_err(|e| {
                RegistryError::invalid_config(sim_fe_adapter::FAMILY, format!("failed to start mock peer: {e}"))
            })?;
            Box::new(channel)
        } else {
            let channel = TcpChannel::connect(&cfg.ip_address, cfg.ip_port).map_err(|source| {
                hsim_core::ControlError::Transport {
                    family: sim_fe_adapter::FAMILY,
                    operation: "connect",
                    source,
                }
            })?;
            Box::new(channel)
        };

        let mut control = SimFeAdapter::with_data_size(tag, channel, cfg.data_size);
        apply_filters(&mut control, ctrl, daq);
        debug!(tag, "built {}", sim_fe_adapter::FAMILY);
        Ok(Box::new(control))
    }
}

// =============================================================================
// XpcTarget Factory
// =============================================================================

/// Factory for [`XpcTarget`] controllers.
pub struct XpcTargetFactory {
    confirm: Confirm,
}

impl XpcTargetFactory {
    /// Factory whose controllers proceed through setup without asking.
    #[must_use]
    pub fn new() -> Self {
        Self {
            confirm: confirm::auto_proceed(),
        }
    }

    /// Factory whose controllers ask `confirm` during setup.
    #[must_use]
    pub fn with_confirm(confirm: Confirm) -> Self {
        Self { confirm }
    }

    fn parse(config: &toml::Value) -> Result<XpcTargetConfig, RegistryError> {
        let cfg: XpcTargetConfig = parse_config(xpc_target::FAMILY, config.clone())?;
        if cfg.app_name.is_empty() {
            return Err(RegistryError::invalid_config(xpc_target::FAMILY, "app_name must not be empty"));
        }
        if !cfg.mock && !cfg!(feature = "xpc-sdk") {
            return Err(RegistryError::invalid_config(
                xpc_target::FAMILY,
                "built without the `xpc-sdk` feature; set mock = true or rebuild with --features xpc-sdk",
            ));
        }
        Ok(cfg)
    }

    #[cfg(feature = "xpc-sdk")]
    fn open_bus(cfg: &XpcTargetConfig) -> Result<Box<dyn SignalBus>, RegistryError> {
        let bus = crate::xpc_api::XpcApiBus::open(&cfg.ip_address, &cfg.ip_port).map_err(|source| {
            hsim_core::ControlError::Transport {
                family: xpc_target::FAMILY,
                operation: "open_port",
                source,
            }
        })?;
        Ok(Box::new(bus))
    }

    #[cfg(not(feature = "xpc-sdk"))]
    fn open_bus(_cfg: &XpcTargetConfig) -> Result<Box<dyn SignalBus>, RegistryError> {
        Err(RegistryError::invalid_config(
            xpc_target::FAMILY,
            "xPC Target API not available (enable the `xpc-sdk` feature)",
        ))
    }
}

impl Default for XpcTargetFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for XpcTargetFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XpcTargetFactory").finish_non_exhaustive()
    }
}

impl ControlFactory for XpcTargetFactory {
    fn family(&self) -> &'static str {
        xpc_target::FAMILY
    }

    fn description(&self) -> &'static str {
        "xPC Target real-time hybrid controller"
    }

    fn validate(&self, config: &toml::Value) -> Result<(), RegistryError> {
        Self::parse(config).map(|_| ())
    }

    fn build(
        &self,
        tag: Tag,
        config: toml::Value,
        filters: &dyn FilterLookup,
    ) -> Result<Box<dyn ExperimentalControl>, RegistryError> {
        let cfg = Self::parse(&config)?;
        let ctrl = resolve_filters(&cfg.ctrl_filters, filters)?;
        let daq = resolve_filters(&cfg.daq_filters, filters)?;

        let bus: Box<dyn SignalBus> = if cfg.mock {
            info!(tag, app = %cfg.app_name, "using simulated xPC target");
            Box::new(SimulatedTarget::new(&cfg.app_name).with_stiffness(cfg.mock_stiffness))
        } else {
            Self::open_bus(&cfg)?
        };

        let options = XpcTargetOptions {
            target_type: cfg.pc_type,
            ip_address: cfg.ip_address,
            ip_port: cfg.ip_port,
            app_name: cfg.app_name,
            app_path: cfg.app_path,
            settle: Duration::from_millis(cfg.settle_ms),
            poll: cfg.poll,
            confirm: self.confirm.clone(),
        };
        let mut control = XpcTarget::connect(tag, options, bus)?;
        apply_filters(&mut control, ctrl, daq);
        debug!(tag, "built {}", xpc_target::FAMILY);
        Ok(Box::new(control))
    }
}
