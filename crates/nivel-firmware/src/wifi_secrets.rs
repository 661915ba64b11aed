//! Network credentials baked in by `build.rs`.

use nivel_core::config::WifiCredentials;

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

pub const fn credentials() -> WifiCredentials<'static> {
    WifiCredentials {
        ssid: WIFI_SSID,
        password: WIFI_PASSWORD,
    }
}
