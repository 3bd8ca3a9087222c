use admission_processor::ProcessorConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostProcessorConfig {
    pub processor: ProcessorConfig,
    /// Balance given to wallets the manager creates on first sight.
    pub wallet_balance: u64,
}

impl Default for HostProcessorConfig {
    fn default() -> Self {
        Self {
            processor: ProcessorConfig::default(),
            wallet_balance: 100_000,
        }
    }
}
