fn main() {
    println!("cargo:rerun-if-env-changed=TANKWATCH_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=TANKWATCH_WIFI_PASSWORD");
    println!("cargo:rerun-if-env-changed=TANKWATCH_DEVICE_KEY_PEM");
    println!("cargo:rerun-if-env-changed=TANKWATCH_BOT_TOKEN");

    // Host builds (tests, fuzzing) have no ESP-IDF toolchain to describe.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
