//! ESP-IDF Wi-Fi driver adapter.
//!
//! Wraps `BlockingWifi<EspWifi>` behind the [`WifiJoin`] seam. Subsystem
//! bring-up happens in `init`; each `join` call reconfigures the driver and
//! performs one association attempt.

use std::net::IpAddr;

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::info;

use super::{JoinError, WifiJoin};
use crate::config::{ApCredentials, SecurityPolicy};

/// ESP32 wireless-join implementation.
pub struct EspJoin {
    modem: Option<Modem>,
    sysloop: EspSystemEventLoop,
    wifi: Option<BlockingWifi<EspWifi<'static>>>,
}

impl EspJoin {
    /// Create the adapter. The driver itself is not brought up until
    /// [`WifiJoin::init`] runs.
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Self {
        Self {
            modem: Some(modem),
            sysloop,
            wifi: None,
        }
    }
}

fn auth_method(policy: SecurityPolicy) -> AuthMethod {
    match policy {
        SecurityPolicy::Open => AuthMethod::None,
        SecurityPolicy::Wpa2Personal => AuthMethod::WPA2Personal,
        SecurityPolicy::Wpa3Personal => AuthMethod::WPA3Personal,
    }
}

impl WifiJoin for EspJoin {
    fn init(&mut self) -> Result<(), JoinError> {
        let modem = self
            .modem
            .take()
            .ok_or_else(|| JoinError::new("wireless subsystem already initialized"))?;

        let esp_wifi = EspWifi::new(modem, self.sysloop.clone(), None)
            .map_err(|e| JoinError::new(format!("EspWifi init: {e:?}")))?;
        let wifi = BlockingWifi::wrap(esp_wifi, self.sysloop.clone())
            .map_err(|e| JoinError::new(format!("BlockingWifi wrap: {e:?}")))?;

        self.wifi = Some(wifi);
        Ok(())
    }

    fn join(&mut self, credentials: &ApCredentials) -> Result<IpAddr, JoinError> {
        let wifi = self
            .wifi
            .as_mut()
            .ok_or_else(|| JoinError::new("wireless subsystem not initialized"))?;

        let wifi_config = Configuration::Client(ClientConfiguration {
            ssid: credentials
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| JoinError::new("SSID too long for driver"))?,
            password: credentials
                .password
                .as_str()
                .try_into()
                .map_err(|_| JoinError::new("password too long for driver"))?,
            auth_method: auth_method(credentials.security),
            ..Default::default()
        });

        wifi.set_configuration(&wifi_config)
            .map_err(|e| JoinError::new(format!("set_configuration: {e:?}")))?;

        if !wifi
            .is_started()
            .map_err(|e| JoinError::new(format!("is_started: {e:?}")))?
        {
            wifi.start()
                .map_err(|e| JoinError::new(format!("start: {e:?}")))?;
        }

        wifi.connect()
            .map_err(|e| JoinError::new(format!("connect: {e:?}")))?;

        // Wait for DHCP
        wifi.wait_netif_up()
            .map_err(|e| JoinError::new(format!("netif up: {e:?}")))?;

        let ip_info = wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .map_err(|e| JoinError::new(format!("ip info: {e:?}")))?;

        info!("Wi-Fi associated, IP: {}", ip_info.ip);
        ip_info
            .ip
            .to_string()
            .parse::<IpAddr>()
            .map_err(|e| JoinError::new(format!("unparseable IP: {e}")))
    }
}
