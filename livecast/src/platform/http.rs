use std::{sync::OnceLock, time::Duration};

use tracing::debug;

use super::PlatformError;

const USER_AGENT: &str = concat!("livecast/", env!("CARGO_PKG_VERSION"));

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the HTTP client used for platform and token endpoint calls.
pub fn build_client(request_timeout: Duration) -> Result<reqwest::Client, PlatformError> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10));
    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }

    builder
        .build()
        .map_err(|e| PlatformError::ConfigInvalid(format!("HTTP client: {e}")))
}
