//! Server configuration.

use padsync_crypto::KdfParams;
use std::net::SocketAddr;

/// Configuration for the padsync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Largest document frame accepted from a client, in bytes.
    ///
    /// Larger frames are dropped as malformed; the connection stays open.
    pub max_frame_bytes: usize,
    /// Largest request body (uploads, secure open/save), in bytes.
    pub max_upload_bytes: usize,
    /// Key derivation parameters for secure save.
    pub kdf: KdfParams,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_frame_bytes: 4 * 1024 * 1024,
            max_upload_bytes: 10 * 1024 * 1024,
            kdf: KdfParams::default(),
        }
    }

    /// Sets the maximum document frame size.
    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }

    /// Sets the maximum request body size.
    pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
        self.max_upload_bytes = max;
        self
    }

    /// Sets the key derivation parameters for secure save.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8000)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.max_frame_bytes, 4 * 1024 * 1024);
        assert_eq!(config.kdf, KdfParams::default());
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_max_frame_bytes(1024)
            .with_max_upload_bytes(2048)
            .with_kdf(KdfParams::new(5_000).unwrap());

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.max_frame_bytes, 1024);
        assert_eq!(config.max_upload_bytes, 2048);
        assert_eq!(config.kdf.iterations(), 5_000);
    }
}
