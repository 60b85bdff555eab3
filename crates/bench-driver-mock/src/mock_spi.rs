//! Mock SPI register bridge.

use async_trait::async_trait;
use bench_core::capabilities::{DriverResult, RegisterBus};
use std::sync::Mutex;

use crate::common::{harness_builders, lock, MockHarness, TimingConfig};

/// Register value a healthy converter reports at address 1.
pub const DEFAULT_ID_REGISTER: u8 = 0x05;

/// 256-byte register file behind an SPI bridge.
pub struct MockSpi {
    harness: MockHarness,
    registers: Mutex<[u8; 256]>,
}

impl MockSpi {
    pub fn new() -> Self {
        let mut registers = [0u8; 256];
        registers[1] = DEFAULT_ID_REGISTER;
        Self {
            harness: MockHarness::new("spi", "mock_spi", TimingConfig::gpio()),
            registers: Mutex::new(registers),
        }
    }

    /// Preload a register, bypassing the bus.
    pub fn with_register(self, address: u8, value: u8) -> Self {
        lock(&self.registers)[usize::from(address)] = value;
        self
    }

    pub fn peek(&self, address: u8) -> u8 {
        lock(&self.registers)[usize::from(address)]
    }
}

impl Default for MockSpi {
    fn default() -> Self {
        Self::new()
    }
}

harness_builders!(MockSpi);

#[async_trait]
impl RegisterBus for MockSpi {
    async fn read_register(&self, address: u8) -> DriverResult<u8> {
        self.harness
            .enter("read_register", format!("{address:#04x}"))
            .await?;
        Ok(self.peek(address))
    }

    async fn write_register(&self, address: u8, value: u8) -> DriverResult<()> {
        self.harness
            .enter("write_register", format!("{address:#04x} <- {value:#04x}"))
            .await?;
        lock(&self.registers)[usize::from(address)] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_id_register_defaults() {
        let spi = MockSpi::new();
        assert_eq!(spi.read_register(1).await.unwrap(), DEFAULT_ID_REGISTER);
        spi.write_register(1, 0x07).await.unwrap();
        assert_eq!(spi.peek(1), 0x07);
    }
}
