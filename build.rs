fn main() {
    println!("cargo:rerun-if-env-changed=SOILSENSE_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=SOILSENSE_WIFI_PASS");
    println!("cargo:rerun-if-env-changed=SOILSENSE_BROKER_URL");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
