//! Command line and environment configuration

use crate::command::DispatcherConfig;
use crate::connection::ConnectionConfig;
use crate::link::radio::FrequencyBand;
use crate::link::NetworkParams;
use crate::supervisor::DEFAULT_RESTART_EXIT_CODE;
use clap::builder::BoolishValueParser;
use clap::Parser;
use rover_shared::timing;
use std::path::PathBuf;
use std::time::Duration;

/// Remotely operated rover: wireless link, backend channel and actuator control
#[derive(Debug, Parser)]
#[command(name = "rover-device", version)]
pub struct Args {
    /// Device ID reported to the backend
    #[arg(long, default_value = "rover-001", env = "ROVER_DEVICE_ID")]
    pub device_id: String,

    /// Access point SSID
    #[arg(long, default_value = "rover-net", env = "ROVER_SSID")]
    pub ssid: String,

    /// WPA2 passphrase; the network is treated as open without one
    #[arg(long, env = "ROVER_PASSPHRASE")]
    pub passphrase: Option<String>,

    /// Radio band of the access point
    #[arg(long, value_enum, default_value_t = FrequencyBand::Band2_4GHz, env = "ROVER_BAND")]
    pub band: FrequencyBand,

    /// Backend hostname
    #[arg(long, default_value = "localhost", env = "ROVER_BACKEND_HOST")]
    pub backend_host: String,

    /// Backend port, shared by the message channel and the events endpoint
    #[arg(long, default_value_t = 8080, env = "ROVER_BACKEND_PORT")]
    pub backend_port: u16,

    /// Message channel path
    #[arg(long, default_value = "/mcu/ws/", env = "ROVER_CHANNEL_PATH")]
    pub channel_path: String,

    /// Sensor events endpoint path
    #[arg(long, default_value = "/events/add", env = "ROVER_EVENTS_PATH")]
    pub events_path: String,

    /// Full connection sequences tried at boot
    #[arg(long, default_value_t = timing::BOOT_ATTEMPTS, env = "ROVER_BOOT_ATTEMPTS")]
    pub boot_attempts: u32,

    /// Sensor reads asserted while this file exists
    #[arg(long, env = "ROVER_SENSOR_FLAG")]
    pub sensor_flag: Option<PathBuf>,

    /// Do not push sensor events over the message channel
    #[arg(long, env = "ROVER_NO_RELAY", value_parser = BoolishValueParser::new())]
    pub no_relay: bool,

    /// Exit status used to request a restart
    #[arg(long, default_value_t = DEFAULT_RESTART_EXIT_CODE, env = "ROVER_RESTART_EXIT_CODE")]
    pub restart_exit_code: i32,
}

impl Args {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            device_id: self.device_id.clone(),
            network: NetworkParams {
                ssid: self.ssid.clone(),
                passphrase: self.passphrase.clone(),
                band: self.band,
                ..Default::default()
            },
            backend_host: self.backend_host.clone(),
            backend_port: self.backend_port,
            channel_path: self.channel_path.clone(),
            boot_attempts: self.boot_attempts,
            ..Default::default()
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            device_id: self.device_id.clone(),
            relay_sensor_events: !self.no_relay,
            notify_timeout: Duration::from_millis(timing::NOTIFY_TIMEOUT_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::radio::Security;
    use std::sync::Mutex;

    /// Serializes tests that read or write process environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let args = Args::try_parse_from(["rover-device"]).expect("parse");
        let conn = args.connection_config();

        assert_eq!(conn.backend_host, "localhost");
        assert_eq!(conn.backend_port, 8080);
        assert_eq!(conn.channel_path, "/mcu/ws/");
        assert_eq!(conn.boot_attempts, 3);
        assert_eq!(conn.max_message_len, 696);
        assert_eq!(conn.network.security(), Security::Open);
        assert_eq!(conn.network.band, FrequencyBand::Band2_4GHz);
        assert_eq!(args.events_path, "/events/add");
        assert_eq!(args.restart_exit_code, 75);
        assert!(args.dispatcher_config().relay_sensor_events);
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "rover-device",
            "--device-id",
            "rover-007",
            "--ssid",
            "field",
            "--passphrase",
            "secret123",
            "--backend-host",
            "backend.local",
            "--backend-port",
            "9000",
            "--boot-attempts",
            "5",
            "--band",
            "5",
            "--no-relay",
        ])
        .expect("parse");

        let conn = args.connection_config();
        assert_eq!(conn.device_id, "rover-007");
        assert_eq!(conn.network.ssid, "field");
        assert_eq!(conn.network.security(), Security::Psk);
        assert_eq!(conn.backend_host, "backend.local");
        assert_eq!(conn.backend_port, 9000);
        assert_eq!(conn.boot_attempts, 5);
        assert_eq!(conn.network.band, FrequencyBand::Band5GHz);

        let dispatch = args.dispatcher_config();
        assert_eq!(dispatch.device_id, "rover-007");
        assert!(!dispatch.relay_sensor_events);
    }

    #[test]
    fn test_no_relay_accepts_common_env_values() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let cases = [
            ("1", true),
            ("yes", true),
            ("on", true),
            ("true", true),
            ("0", false),
            ("no", false),
            ("off", false),
            ("false", false),
        ];

        for (value, expected) in cases {
            std::env::set_var("ROVER_NO_RELAY", value);
            let parsed = Args::try_parse_from(["rover-device"]);
            std::env::remove_var("ROVER_NO_RELAY");

            let args = parsed.unwrap_or_else(|e| panic!("ROVER_NO_RELAY={value}: {e}"));
            assert_eq!(args.no_relay, expected, "ROVER_NO_RELAY={value}");
            assert_eq!(args.dispatcher_config().relay_sensor_events, !expected);
        }
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Args::try_parse_from(["rover-device", "--backend-port", "http"]).is_err());
    }
}
