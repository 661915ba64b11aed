//! Bakes the Wi-Fi credentials into the image.
//!
//! `WIFI_SSID` and `WIFI_PASSWORD` come from the environment or from a
//! `.env` file next to this crate (or any parent directory).

const CREDENTIAL_KEYS: [&str; 2] = ["WIFI_SSID", "WIFI_PASSWORD"];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for key in CREDENTIAL_KEYS {
        println!("cargo:rerun-if-env-changed={key}");
    }

    if let Ok(path) = dotenvy::dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    for key in CREDENTIAL_KEYS {
        match std::env::var(key) {
            Ok(value) => println!("cargo:rustc-env={key}={value}"),
            Err(_) => {
                println!("cargo:warning={key} is not set; the firmware will fail to join Wi-Fi");
                println!("cargo:rustc-env={key}=");
            }
        }
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
