//! Secure HTTPS client firmware binary.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    // Initialize ESP-IDF logger for log crate integration
    esp_idf_svc::log::EspLogger::initialize_default();

    println!("=== Secure HTTPS client starting ===");

    if let Err(e) = esp32::run() {
        // Everything up to a working session is fatal; surface it and stop.
        log::error!("fatal: {}", e);
    }
}

#[cfg(feature = "esp32")]
mod esp32 {
    use std::io;

    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;

    use https_client_esp32::transport::esp::EspTransportFactory;
    use https_client_esp32::wifi::esp::EspJoin;
    use https_client_esp32::{
        ApCredentials, ClientConfig, CommandLoop, ConnectionManager, RequestDispatcher,
        SecurityPolicy, ServerEndpoint, TlsCredentials, TransportConfigurator,
    };

    // Network parameters are baked in at build time; override via env vars
    // when flashing a different setup.
    const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
        Some(ssid) => ssid,
        None => "MY_WIFI_SSID",
    };
    const WIFI_PASSWORD: &str = match option_env!("WIFI_PASSWORD") {
        Some(password) => password,
        None => "MY_WIFI_PASSWORD",
    };
    const SERVER_HOST: &str = match option_env!("HTTPS_SERVER_HOST") {
        Some(host) => host,
        None => "192.168.0.10",
    };
    const SERVER_PORT: u16 = 50007;

    // Demo credential material; replace with real PEMs before flashing.
    const CLIENT_CERT: &[u8] = include_bytes!("../certs/client_cert.pem");
    const CLIENT_KEY: &[u8] = include_bytes!("../certs/client_key.pem");
    const ROOT_CA: &[u8] = include_bytes!("../certs/root_ca.pem");

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let config = ClientConfig::default();
        config.validate()?;

        let ap_credentials =
            ApCredentials::new(WIFI_SSID, WIFI_PASSWORD, SecurityPolicy::Wpa2Personal)?;
        let tls_credentials = TlsCredentials::new(
            CLIENT_CERT.to_vec(),
            CLIENT_KEY.to_vec(),
            ROOT_CA.to_vec(),
        )?;
        let endpoint = ServerEndpoint::new(SERVER_HOST, SERVER_PORT)?;

        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;

        // Join the access point (fatal on exhaustion, no supervisor here).
        let mut driver = EspJoin::new(peripherals.modem, sysloop);
        let mut manager = ConnectionManager::from_config(&config);
        manager.connect(&mut driver, &ap_credentials, config.max_join_retries)?;

        // One-time secure transport configuration and handshake.
        let mut factory =
            EspTransportFactory::new(config.transport_timeout, config.buffer_capacity);
        let mut session =
            TransportConfigurator::configure(&mut factory, &tls_credentials, &endpoint)?;
        session.connect(config.transport_timeout)?;

        // Steady state: dispatch operator-selected requests forever.
        let mut dispatcher = RequestDispatcher::new(endpoint.host.clone(), config.buffer_capacity);
        let mut command_loop = CommandLoop::new(&config);
        let stdin = io::stdin();
        command_loop.run(stdin.lock(), &mut dispatcher, &mut session)?;

        Ok(())
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo test' for host testing.");
}
