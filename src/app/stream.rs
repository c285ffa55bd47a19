use embassy_net::{tcp::TcpSocket, IpListenEndpoint, Stack};
use embassy_time::{Duration, Ticker};
use embedded_io_async::Write;
use esp_println::println;
use static_cell::StaticCell;

mod protocol;

use protocol::{
    accept_key, encode_text_frame, find_header_end, is_websocket_upgrade, parse_request_line,
    sample_payload, websocket_key, FRAME_HEADER_LEN, SAMPLE_PAYLOAD_MAX,
};

use super::{
    config::{STREAM_INTERVAL_SECONDS, STREAM_PATH, STREAM_PORT},
    sensor,
};

const HTTP_HEADER_MAX: usize = 1024;
const STREAM_RW_BUF: usize = 1024;

/// Serves exactly one upgraded connection for the lifetime of the task:
/// accept, upgrade, then push one sample per interval until a send fails.
/// There is no re-accept; a dropped peer ends the task.
#[embassy_executor::task]
pub(crate) async fn stream_task(stack: Stack<'static>) {
    static RX_BUFFER: StaticCell<[u8; STREAM_RW_BUF]> = StaticCell::new();
    static TX_BUFFER: StaticCell<[u8; STREAM_RW_BUF]> = StaticCell::new();

    let rx_buffer = RX_BUFFER.init([0u8; STREAM_RW_BUF]);
    let tx_buffer = TX_BUFFER.init([0u8; STREAM_RW_BUF]);

    stack.wait_config_up().await;
    if let Some(cfg) = stack.config_v4() {
        println!(
            "stream: listening on {}:{}{}",
            cfg.address.address(),
            STREAM_PORT,
            STREAM_PATH
        );
    }

    let mut socket = TcpSocket::new(stack, &mut rx_buffer[..], &mut tx_buffer[..]);
    if let Err(err) = socket
        .accept(IpListenEndpoint {
            addr: None,
            port: STREAM_PORT,
        })
        .await
    {
        println!("stream: accept err={:?}", err);
        return;
    }

    match upgrade(&mut socket).await {
        Ok(()) => {
            println!("stream: websocket connection established");
            let pushed = push_samples(&mut socket).await;
            println!("stream: peer gone after {} samples", pushed);
        }
        Err(err) => {
            println!("stream: upgrade rejected: {}", err);
        }
    }
    socket.close();
}

async fn upgrade(socket: &mut TcpSocket<'_>) -> Result<(), &'static str> {
    let mut header_buf = [0u8; HTTP_HEADER_MAX];
    let mut filled = 0usize;
    let header_end = loop {
        if filled == header_buf.len() {
            write_error(socket, b"431 Request Header Fields Too Large").await;
            return Err("header too large");
        }

        let n = socket
            .read(&mut header_buf[filled..])
            .await
            .map_err(|_| "read")?;
        if n == 0 {
            return Err("eof");
        }
        filled += n;

        if let Some(end) = find_header_end(&header_buf[..filled]) {
            break end;
        }
    };

    let header = core::str::from_utf8(&header_buf[..header_end]).map_err(|_| "header utf8")?;
    let (method, target) = parse_request_line(header).ok_or("bad request line")?;
    if method != "GET" || target != STREAM_PATH {
        write_error(socket, b"404 Not Found").await;
        return Err("not a stream request");
    }
    if !is_websocket_upgrade(header) {
        write_error(socket, b"400 Bad Request").await;
        return Err("missing upgrade headers");
    }
    let Some(key) = websocket_key(header) else {
        write_error(socket, b"400 Bad Request").await;
        return Err("missing sec-websocket-key");
    };

    let accept = accept_key(key);
    socket
        .write_all(
            b"HTTP/1.1 101 Switching Protocols\r\n\
              Upgrade: websocket\r\n\
              Connection: Upgrade\r\n\
              Sec-WebSocket-Accept: ",
        )
        .await
        .map_err(|_| "write")?;
    socket.write_all(&accept).await.map_err(|_| "write")?;
    socket.write_all(b"\r\n\r\n").await.map_err(|_| "write")?;
    Ok(())
}

async fn push_samples(socket: &mut TcpSocket<'_>) -> u32 {
    let mut ticker = Ticker::every(Duration::from_secs(STREAM_INTERVAL_SECONDS));
    let mut pushed = 0u32;
    loop {
        ticker.next().await;
        if !send_sample(socket, sensor::next_sample()).await {
            break;
        }
        pushed += 1;
    }
    pushed
}

/// One framed push. A failed write or flush means the peer is gone; that is
/// the loop's sole exit condition.
async fn send_sample<W: Write>(sink: &mut W, value: i32) -> bool {
    let payload = sample_payload(value);
    let mut frame = [0u8; FRAME_HEADER_LEN + SAMPLE_PAYLOAD_MAX];
    let Some(frame_len) = encode_text_frame(&payload, &mut frame) else {
        return false;
    };
    sink.write_all(&frame[..frame_len]).await.is_ok() && sink.flush().await.is_ok()
}

async fn write_error(socket: &mut TcpSocket<'_>, status: &[u8]) {
    let _ = socket.write_all(b"HTTP/1.1 ").await;
    let _ = socket.write_all(status).await;
    let _ = socket
        .write_all(b"\r\nConnection: close\r\nContent-Length: 0\r\n\r\n")
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::future::Future;
    use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
    use embedded_io_async::{ErrorKind, ErrorType};

    fn block_on<F: Future>(mut future: F) -> F::Output {
        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(core::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);

        let waker = unsafe { Waker::from_raw(RawWaker::new(core::ptr::null(), &VTABLE)) };
        let mut context = Context::from_waker(&waker);
        let mut future = unsafe { core::pin::Pin::new_unchecked(&mut future) };
        loop {
            if let Poll::Ready(output) = future.as_mut().poll(&mut context) {
                return output;
            }
        }
    }

    /// Succeeds for a fixed number of writes, then reports the peer gone.
    struct FlakySink {
        writes_left: usize,
        written: std::vec::Vec<u8>,
    }

    impl FlakySink {
        fn new(writes_left: usize) -> Self {
            Self {
                writes_left,
                written: std::vec::Vec::new(),
            }
        }
    }

    impl ErrorType for FlakySink {
        type Error = ErrorKind;
    }

    impl Write for FlakySink {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            if self.writes_left == 0 {
                return Err(ErrorKind::BrokenPipe);
            }
            self.writes_left -= 1;
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        async fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn send_sample_writes_one_framed_payload() {
        let mut sink = FlakySink::new(usize::MAX);
        assert!(block_on(send_sample(&mut sink, 123)));
        assert_eq!(&sink.written[..2], &[0x81, 15]);
        assert_eq!(&sink.written[2..], b"{\"value\": 123}\n");
    }

    #[test]
    fn push_loop_stops_on_first_failed_send() {
        // Three pushes land, the fourth send fails, and the loop must end
        // after exactly three successes.
        let mut sink = FlakySink::new(3);
        let mut pushed = 0u32;
        let stopped = block_on(async {
            loop {
                if !send_sample(&mut sink, 123).await {
                    break true;
                }
                pushed += 1;
            }
        });
        assert!(stopped);
        assert_eq!(pushed, 3);
        assert_eq!(sink.written.len(), 3 * 17);
    }
}
