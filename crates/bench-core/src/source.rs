//! [`VoltageSource`] adapters.
//!
//! The bench can feed the converter either from the SMU or from the bench
//! supply. Both are wrapped into a `VoltageSource` here and the caller injects
//! whichever one the setup uses; the stimulus scripts never branch on it.

use async_trait::async_trait;
use tracing::debug;

use crate::capabilities::{BenchSupply, DriverResult, Rail, SmuChannels, VoltageSource};

/// Current limit used when the SMU outputs are parked at 0 V.
const SMU_PARK_CURRENT_LIMIT: f64 = 0.1;

/// SMU-backed source. Every SMU channel is driven with the same setting and
/// the rail argument is ignored.
pub struct SmuSource<S> {
    smu: S,
}

impl<S: SmuChannels> SmuSource<S> {
    /// Wrap an SMU.
    pub fn new(smu: S) -> Self {
        Self { smu }
    }

    /// The wrapped SMU.
    pub fn inner(&self) -> &S {
        &self.smu
    }
}

#[async_trait]
impl<S: SmuChannels> VoltageSource for SmuSource<S> {
    async fn set_source_voltage(
        &self,
        rail: Rail,
        volts: f64,
        current_limit: f64,
    ) -> DriverResult<()> {
        debug!(%rail, volts, current_limit, "SMU source: programming all channels");
        self.smu.configure_all_vdc(volts, current_limit).await
    }

    async fn set_source_enabled(&self, enabled: bool) -> DriverResult<()> {
        if !enabled {
            // Outputs are brought to 0 V before they are released.
            self.smu
                .configure_all_vdc(0.0, SMU_PARK_CURRENT_LIMIT)
                .await?;
        }
        self.smu.set_all_enabled(enabled).await
    }
}

/// Bench-supply-backed source.
pub struct SupplySource<P> {
    supply: P,
}

impl<P: BenchSupply> SupplySource<P> {
    /// Wrap a bench supply.
    pub fn new(supply: P) -> Self {
        Self { supply }
    }

    /// The wrapped supply.
    pub fn inner(&self) -> &P {
        &self.supply
    }
}

#[async_trait]
impl<P: BenchSupply> VoltageSource for SupplySource<P> {
    async fn set_source_voltage(
        &self,
        rail: Rail,
        volts: f64,
        current_limit: f64,
    ) -> DriverResult<()> {
        self.supply.set_rail(rail, volts, current_limit).await
    }

    async fn set_source_enabled(&self, enabled: bool) -> DriverResult<()> {
        self.supply.enable_output(enabled).await
    }
}

#[async_trait]
impl<T: SmuChannels + ?Sized> SmuChannels for std::sync::Arc<T> {
    async fn configure_all_vdc(&self, volts: f64, current_limit: f64) -> DriverResult<()> {
        (**self).configure_all_vdc(volts, current_limit).await
    }

    async fn set_all_enabled(&self, enabled: bool) -> DriverResult<()> {
        (**self).set_all_enabled(enabled).await
    }
}

#[async_trait]
impl<T: BenchSupply + ?Sized> BenchSupply for std::sync::Arc<T> {
    async fn set_rail(&self, rail: Rail, volts: f64, current_limit: f64) -> DriverResult<()> {
        (**self).set_rail(rail, volts, current_limit).await
    }

    async fn enable_output(&self, enabled: bool) -> DriverResult<()> {
        (**self).enable_output(enabled).await
    }
}
