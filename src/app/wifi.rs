use embassy_net::{Runner, Stack, StackResources};
use esp_hal::rng::Rng;
use esp_println::println;
use esp_radio::wifi::{
    event::{self, EventExt},
    AuthMethod, ClientConfig, Config as WifiRuntimeConfig, ModeConfig, WifiController,
    WifiDevice, WifiError,
};
use static_cell::StaticCell;

use super::{
    config::{LINK_EVENTS, LINK_OUTCOME},
    link::LinkEngine,
    types::{CredentialError, LinkEvent, LinkOutcome, WifiCredentials},
};

const WIFI_RX_QUEUE_SIZE: usize = 3;
const WIFI_TX_QUEUE_SIZE: usize = 2;
const WIFI_STATIC_RX_BUF_NUM: u8 = 4;
const WIFI_DYNAMIC_RX_BUF_NUM: u16 = 8;
const WIFI_DYNAMIC_TX_BUF_NUM: u16 = 8;
const WIFI_RX_BA_WIN: u8 = 3;

pub(crate) struct WifiRuntime {
    pub(crate) controller: WifiController<'static>,
    pub(crate) net_runner: Runner<'static, WifiDevice<'static>>,
    pub(crate) stack: Stack<'static>,
}

pub(crate) fn setup(
    wifi: esp_hal::peripherals::WIFI<'static>,
) -> Result<WifiRuntime, &'static str> {
    static RADIO_CTRL: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

    let radio_ctrl = esp_radio::init().map_err(|err| {
        println!("link: esp_radio::init err={:?}", err);
        "radio init failed"
    })?;
    let radio_ctrl = RADIO_CTRL.init(radio_ctrl);
    let (controller, ifaces) = esp_radio::wifi::new(radio_ctrl, wifi, runtime_config())
        .map_err(|err| match err {
            WifiError::InvalidArguments => "wifi init failed: invalid_args",
            WifiError::Unsupported => "wifi init failed: unsupported",
            WifiError::NotInitialized => "wifi init failed: not_initialized",
            _ => "wifi init failed: other",
        })?;

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let (stack, net_runner) = embassy_net::new(
        ifaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        STACK_RESOURCES.init(StackResources::<3>::new()),
        seed,
    );

    Ok(WifiRuntime {
        controller,
        net_runner,
        stack,
    })
}

fn runtime_config() -> WifiRuntimeConfig {
    WifiRuntimeConfig::default()
        .with_rx_queue_size(WIFI_RX_QUEUE_SIZE)
        .with_tx_queue_size(WIFI_TX_QUEUE_SIZE)
        .with_static_rx_buf_num(WIFI_STATIC_RX_BUF_NUM)
        .with_dynamic_rx_buf_num(WIFI_DYNAMIC_RX_BUF_NUM)
        .with_dynamic_tx_buf_num(WIFI_DYNAMIC_TX_BUF_NUM)
        .with_ampdu_rx_enable(false)
        .with_ampdu_tx_enable(false)
        .with_rx_ba_win(WIFI_RX_BA_WIN)
}

pub(crate) fn compiled_credentials() -> Result<WifiCredentials, CredentialError> {
    let ssid = option_env!("SENSORCAST_WIFI_SSID")
        .or(option_env!("SSID"))
        .unwrap_or("");
    let password = option_env!("SENSORCAST_WIFI_PASSWORD")
        .or(option_env!("PASSWORD"))
        .unwrap_or("");
    WifiCredentials::from_parts(ssid, password)
}

/// The radio hooks only convert driver notifications into typed events and
/// enqueue them; all connection state lives in the link task's engine.
pub(crate) fn install_link_event_forwarders() {
    event::StaStart::update_handler(|_| {
        let _ = LINK_EVENTS.try_send(LinkEvent::AssociationStarted);
    });

    event::StaDisconnected::update_handler(|event| {
        println!(
            "link: disassociated reason={} rssi={}",
            event.reason(),
            event.rssi()
        );
        let _ = LINK_EVENTS.try_send(LinkEvent::Disassociated);
    });
}

/// Single consumer of `LINK_EVENTS`. Applies the station config, starts the
/// radio, then drives `LinkEngine` until a terminal outcome is latched into
/// `LINK_OUTCOME`. The loop keeps draining straggler events afterwards; the
/// engine absorbs them without further transitions.
#[embassy_executor::task]
pub(crate) async fn link_task(
    mut controller: WifiController<'static>,
    credentials: WifiCredentials,
) {
    let mode = mode_config_from_credentials(&credentials);
    if let Err(err) = controller.set_config(&mode) {
        println!("link: station config err={:?}", err);
        LINK_OUTCOME.signal(LinkOutcome::Failed);
        return;
    }

    if let Err(err) = controller.start_async().await {
        println!("link: radio start err={:?}", err);
        LINK_OUTCOME.signal(LinkOutcome::Failed);
        return;
    }

    let mut engine = LinkEngine::new();
    loop {
        let event = LINK_EVENTS.receive().await;
        println!("link: event {}", event.as_str());
        let step = engine.handle(event);

        if step.connect {
            if let Err(err) = controller.connect() {
                println!("link: connect err={:?}", err);
            } else if engine.retry_count() > 0 {
                println!("link: retrying connection, attempt {}", engine.retry_count());
            }
        }

        if let Some(outcome) = step.outcome {
            println!(
                "link: {} after {} retries",
                outcome.as_str(),
                engine.retry_count()
            );
            LINK_OUTCOME.signal(outcome);
        }
    }
}

/// Forwards the DHCP lease as the address-acquired notification, then exits.
#[embassy_executor::task]
pub(crate) async fn dhcp_watch_task(stack: Stack<'static>) {
    stack.wait_config_up().await;
    if let Some(cfg) = stack.config_v4() {
        println!("link: got address {}", cfg.address.address());
    }
    LINK_EVENTS.send(LinkEvent::AddressAcquired).await;
}

#[embassy_executor::task]
pub(crate) async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

fn mode_config_from_credentials(credentials: &WifiCredentials) -> ModeConfig {
    // Open authentication is the minimum acceptable threshold; the driver
    // still negotiates up when the network requires it.
    let client = ClientConfig::default()
        .with_ssid(credentials.ssid().into())
        .with_password(credentials.password().into())
        .with_auth_method(AuthMethod::None);
    ModeConfig::Client(client)
}
