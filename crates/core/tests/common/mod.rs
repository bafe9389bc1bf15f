#![allow(dead_code)]

use std::path::Path;

use cloudbackup_core::{BackendConfig, StorageConfig};
use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test harness. `RUST_LOG` overrides the
/// default `warn` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(false)
        .try_init();
}

pub fn local_config(root: &Path) -> StorageConfig {
    StorageConfig {
        backend: BackendConfig::Local {
            path: root.display().to_string(),
        },
    }
}

/// 2 KiB of text with a known 20-byte window at offset 456.
pub fn chunk_fixture() -> Vec<u8> {
    let mut data = vec![b'.'; 456];
    data.extend_from_slice(b"r f\xfcr Tabelle `analy");
    data.resize(2048, b'-');
    data
}
