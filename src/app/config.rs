use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, signal::Signal,
};

use super::types::{LinkEvent, LinkOutcome};

pub(crate) const MAX_RETRIES: u32 = 10;
pub(crate) const WIFI_SSID_MAX: usize = 32;
pub(crate) const WIFI_PASSWORD_MAX: usize = 64;

pub(crate) const STREAM_PORT: u16 = 80;
pub(crate) const STREAM_PATH: &str = "/ws";
pub(crate) const STREAM_INTERVAL_SECONDS: u64 = 1;
pub(crate) const HEARTBEAT_INTERVAL_SECONDS: u64 = 1;

const LINK_EVENT_QUEUE: usize = 4;

/// Radio lifecycle notifications, converted to typed events by the esp-radio
/// hooks and the DHCP watcher. `wifi::link_task` is the only consumer.
pub(crate) static LINK_EVENTS: Channel<CriticalSectionRawMutex, LinkEvent, LINK_EVENT_QUEUE> =
    Channel::new();

/// Latched terminal link outcome. Signalled at most once per boot by the link
/// task and waited on by the bootstrap task only; behavior of a second waiter
/// is left unspecified.
pub(crate) static LINK_OUTCOME: Signal<CriticalSectionRawMutex, LinkOutcome> = Signal::new();
