pub(crate) mod config;
mod link;
mod sensor;
mod store;
mod stream;
pub(crate) mod types;
mod wifi;

use embassy_executor::Spawner;
use embassy_net::Stack;
use embassy_time::{Duration, Ticker};
use esp_hal::{
    gpio::{Level, Output, OutputConfig},
    timer::timg::TimerGroup,
};
use esp_println::println;

use self::{
    config::{HEARTBEAT_INTERVAL_SECONDS, LINK_OUTCOME},
    store::BootStore,
    types::LinkOutcome,
};

// The radio firmware allocates from this heap.
const RADIO_HEAP_BYTES: usize = 64 * 1024;

/// Bootstrap sequence. Construction order matters: the outcome signal and the
/// event channel are statics and therefore exist before the radio is
/// initialized and before any event forwarder is registered, so no
/// notification can ever race primitive creation.
pub(crate) fn run() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);
    esp_alloc::heap_allocator!(size: RADIO_HEAP_BYTES);

    let mut boot_store = BootStore::new(peripherals.FLASH);
    match boot_store.open_and_bump() {
        Ok(count) => println!("boot: boot #{}", count),
        Err(err) => {
            // Storage is the one fatal startup dependency.
            println!("boot: {}", err);
            halt_forever();
        }
    }

    let runtime = match wifi::setup(peripherals.WIFI) {
        Ok(runtime) => runtime,
        Err(err) => {
            println!("boot: {}", err);
            halt_forever();
        }
    };

    wifi::install_link_event_forwarders();

    let led = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());

    let mut executor = esp_rtos::embassy::Executor::new();
    let executor = unsafe { make_static(&mut executor) };
    executor.run(move |spawner| {
        spawner.must_spawn(wifi::net_task(runtime.net_runner));
        spawner.must_spawn(wifi::dhcp_watch_task(runtime.stack));

        match wifi::compiled_credentials() {
            Ok(credentials) => {
                println!("boot: joining ssid={}", credentials.ssid());
                spawner.must_spawn(wifi::link_task(runtime.controller, credentials));
            }
            Err(err) => {
                println!("boot: wifi credentials rejected: {:?}", err);
                LINK_OUTCOME.signal(LinkOutcome::Failed);
            }
        }

        spawner.must_spawn(boot_task(spawner, runtime.stack, led));
    });
}

/// Blocks on the terminal link outcome, then hands off to the periodic tasks
/// and exits. Startup deliberately continues on a failed link: the local
/// services still run without network reachability.
#[embassy_executor::task]
async fn boot_task(spawner: Spawner, stack: Stack<'static>, led: Output<'static>) {
    match LINK_OUTCOME.wait().await {
        LinkOutcome::Connected => println!("boot: network link up"),
        LinkOutcome::Failed => println!("boot: network link failed; continuing offline"),
    }

    spawner.must_spawn(stream::stream_task(stack));
    spawner.must_spawn(heartbeat_task(led));
}

#[embassy_executor::task]
async fn heartbeat_task(mut led: Output<'static>) {
    let mut ticker = Ticker::every(Duration::from_secs(HEARTBEAT_INTERVAL_SECONDS));
    loop {
        ticker.next().await;
        led.toggle();
    }
}

unsafe fn make_static<T>(value: &mut T) -> &'static mut T {
    unsafe { core::mem::transmute(value) }
}

fn halt_forever() -> ! {
    loop {
        core::hint::spin_loop();
    }
}
