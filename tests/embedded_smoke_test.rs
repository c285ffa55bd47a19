//! Minimal async embedded-test harness for xtensa/ESP32.
//! Validates the esp-rtos embassy runtime wiring on target.

#![no_std]
#![no_main]

#[cfg(test)]
#[embedded_test::tests(executor = esp_rtos::embassy::Executor::new())]
mod tests {
    #[init]
    fn init() {
        let peripherals = esp_hal::init(esp_hal::Config::default());
        let timg0 = esp_hal::timer::timg::TimerGroup::new(peripherals.TIMG0);
        esp_rtos::start(timg0.timer0);
    }

    #[test]
    async fn harness_smoke_async() {
        embassy_time::Timer::after(embassy_time::Duration::from_millis(10)).await;
        assert_eq!(2 + 2, 4);
    }

    #[test]
    async fn ticker_fires_at_least_twice() {
        let mut ticker = embassy_time::Ticker::every(embassy_time::Duration::from_millis(5));
        let started = embassy_time::Instant::now();
        ticker.next().await;
        ticker.next().await;
        assert!(started.elapsed() >= embassy_time::Duration::from_millis(5));
    }
}
