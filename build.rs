fn main() {
    // The ESP-IDF build system is only needed when cross-compiling for the
    // ESP32 (Xtensa). Build scripts run on the host, so check the TARGET
    // env var rather than cfg attributes.
    if let Ok(target) = std::env::var("TARGET") {
        if target.contains("xtensa") {
            embuild::espidf::sysenv::output();
        }
    }
}
