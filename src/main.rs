//! HMD Sensor Firmware: Main Entry Point
//!
//! Hexagonal architecture around a single cooperative loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter            UdpBroadcast      TlsConnector     │
//! │  (WiFi+Thermistor+SNTP)     (DatagramSink)    (SecureConnector)│
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │                  Node (pure logic)                     │    │
//! │  │  Scheduler · WallClock · Publisher · BatchUploader     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  PIR ISR ──▶ MotionMonitor (atomic state + edge queue)         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{error, info, warn};

use hmd_sensor::adapters::hardware::HardwareAdapter;
use hmd_sensor::adapters::time::{monotonic_now, uptime_ms, SystemEpoch};
use hmd_sensor::adapters::tls_client::TlsConnector;
use hmd_sensor::adapters::udp::UdpBroadcast;
use hmd_sensor::adapters::wifi::WifiLink;
use hmd_sensor::app::ports::ConnectivityPort;
use hmd_sensor::app::service::Node;
use hmd_sensor::batch::{BatchBuffer, BatchUploader, UploadSettings};
use hmd_sensor::config::NodeConfig;
use hmd_sensor::drivers::hw_init::{self, GpioInput, ADC1_CH_TEMP};
use hmd_sensor::pins;
use hmd_sensor::publish::UdpPublisher;
use hmd_sensor::sensors::motion::MotionMonitor;
use hmd_sensor::sensors::thermistor::NtcThermistor;

/// Shared between the PIR ISR and the main loop.
static MOTION: MotionMonitor = MotionMonitor::new();

/// Longest single sleep of the main loop, so queued motion edges are
/// picked up promptly.
const MAX_IDLE_MS: u32 = 10;

/// How long boot waits for the first SNTP answer before starting without
/// wall-clock time.  The node keeps retrying from the loop afterwards.
const SNTP_BOOT_WAIT_MS: u32 = 10_000;

fn load_config() -> Result<NodeConfig> {
    let config = match option_env!("HMD_NODE_CONFIG") {
        Some(json) => NodeConfig::from_json(json).context("embedded node config")?,
        None => {
            warn!("Build is missing its deployment config (HMD_NODE_CONFIG); defaults have no endpoint or fingerprint");
            NodeConfig::default()
        }
    };
    config.validate().context("node config")?;
    Ok(config)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  HMD Sensor v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = load_config()?;

    // ── 2. Peripherals + PIR interrupt ────────────────────────
    let report = hw_init::init_peripherals();
    if let Err(e) = report.adc {
        error!("{}, temperature will report the sentinel", e);
    }
    match report.pir {
        Ok(()) => {
            match MOTION.seed_from_pin(&mut GpioInput::new(pins::PIR_GPIO)) {
                Ok(level) => info!("PIR initial level: {}", if level { "HIGH" } else { "LOW" }),
                Err(e) => match e {},
            }
            if let Err(e) = hw_init::init_isr_service(&MOTION) {
                error!("ISR service init failed: {}, motion events disabled", e);
            }
        }
        Err(e) => error!("{}, motion events disabled", e),
    }

    // ── 3. WiFi + SNTP ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs))?,
        sys_loop,
    )?;
    let mut link = WifiLink::new(wifi);
    match link.set_credentials(&config.wifi_ssid, &config.wifi_password) {
        Ok(()) => {
            if let Err(e) = link.connect(uptime_ms()) {
                warn!("WiFi: first connect failed ({}), retrying in background", e);
            }
        }
        Err(e) => warn!("WiFi: credentials rejected: {}", e),
    }

    let mut epoch = SystemEpoch::new();
    match epoch.start_sntp() {
        Ok(()) if link.is_connected() => {
            let started = uptime_ms();
            while !epoch.sntp_completed() && uptime_ms().wrapping_sub(started) < SNTP_BOOT_WAIT_MS {
                FreeRtos::delay_ms(100);
            }
            if !epoch.sntp_completed() {
                warn!("SNTP: no answer within {}ms, starting unsynced", SNTP_BOOT_WAIT_MS);
            }
        }
        Ok(()) => {}
        Err(e) => warn!("SNTP start failed: {}", e),
    }

    let mut hw = HardwareAdapter::new(link, NtcThermistor::new(ADC1_CH_TEMP), epoch);

    // ── 4. Outputs ────────────────────────────────────────────
    let sink = UdpBroadcast::bind(&config.udp_destination, config.udp_port)?;
    let publisher = UdpPublisher::new(
        sink,
        config.udp_rate_per_sec,
        config.udp_burst,
        monotonic_now,
    );
    let uploader = BatchUploader::new(
        TlsConnector::new(),
        BatchBuffer::new(config.buffer_slots, config.slot_size),
        UploadSettings::from_config(&config)?,
    );

    // ── 5. Node ───────────────────────────────────────────────
    let mut node = Node::new(&config, &MOTION, publisher, uploader).with_uptime_source(uptime_ms);
    node.start(uptime_ms(), &mut hw);

    info!("Entering main loop");

    let mut reported_drops = 0u32;
    loop {
        let now = uptime_ms();
        hw.wifi_mut().poll(now);
        node.poll(now, &mut hw);

        let dropped = MOTION.dropped_edges();
        if dropped != reported_drops {
            warn!("Motion edge queue overflowed, {} edges dropped so far", dropped);
            reported_drops = dropped;
        }

        let idle = node.idle_budget_ms(uptime_ms()).clamp(1, MAX_IDLE_MS);
        FreeRtos::delay_ms(idle);
    }
}
