// SPDX-License-Identifier: Apache-2.0

use crate::bounded_channel::BoundedSender;
use crate::listener::{DatagramSocket, Listener};
use crate::receivers::syslog::config::SyslogReceiverConfig;
use crate::receivers::syslog::message::SyslogMessage;
use crate::receivers::syslog::parser;
use bytes::{Buf, BytesMut};
use tokio::net::{TcpStream, UdpSocket};
use tokio::select;
use tokio::task::JoinSet;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{debug, error, info};

/// Frame decoder for syslog over TCP. Both RFC 6587 framing styles are
/// detected per frame: octet counting (`LEN SP body`, first byte a nonzero
/// digit) and non-transparent newline-terminated records (everything else).
struct SyslogFrameDecoder {
    max_frame_size: usize,
}

/// Octet counts longer than this many digits are rejected outright
const MAX_OCTET_COUNT_DIGITS: usize = 10;

impl SyslogFrameDecoder {
    fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

fn invalid_data(msg: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg)
}

impl Decoder for SyslogFrameDecoder {
    type Item = BytesMut;
    type Error = std::io::Error;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if src[0].is_ascii_digit() && src[0] != b'0' {
            // Octet counting: digits, one space, then exactly that many bytes
            let mut i = 1;
            while i < src.len() && src[i].is_ascii_digit() {
                i += 1;
                if i > MAX_OCTET_COUNT_DIGITS {
                    return Err(invalid_data("octet count too long".to_string()));
                }
            }
            if i >= src.len() {
                return Ok(None); // count may still be incomplete
            }
            if src[i] != b' ' {
                return Err(invalid_data(
                    "expected space after octet count".to_string(),
                ));
            }

            let count: usize = std::str::from_utf8(&src[..i])
                .expect("octet count is ASCII digits")
                .parse()
                .map_err(|e| invalid_data(format!("invalid octet count: {}", e)))?;
            if count > self.max_frame_size {
                return Err(invalid_data(format!(
                    "frame size {} exceeds maximum {}",
                    count, self.max_frame_size
                )));
            }

            let frame_start = i + 1;
            if src.len() < frame_start + count {
                src.reserve(frame_start + count - src.len());
                return Ok(None);
            }

            src.advance(frame_start);
            Ok(Some(src.split_to(count)))
        } else {
            // Non-transparent framing, one record per line
            match src.iter().position(|b| *b == b'\n') {
                Some(pos) => Ok(Some(src.split_to(pos + 1))),
                None => {
                    if src.len() > self.max_frame_size {
                        return Err(invalid_data(format!(
                            "frame exceeds maximum size {}",
                            self.max_frame_size
                        )));
                    }
                    Ok(None)
                }
            }
        }
    }

    fn decode_eof(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            // A final record is allowed to omit its newline terminator
            None if !src.is_empty() => Ok(Some(src.split())),
            None => Ok(None),
        }
    }
}

pub struct SyslogReceiver {
    config: SyslogReceiverConfig,
    output: BoundedSender<SyslogMessage>,
}

#[derive(Clone)]
struct ConnectionHandler {
    output: BoundedSender<SyslogMessage>,
    max_message_size: usize,
    cancel_token: CancellationToken,
}

impl SyslogReceiver {
    pub fn new(config: SyslogReceiverConfig, output: BoundedSender<SyslogMessage>) -> Self {
        Self { config, output }
    }

    /// Spawn the TCP accept loop and the UDP datagram loop onto the task set.
    /// Both sockets must already be bound; see `init::misc::bind_endpoint`.
    pub async fn start(
        self,
        tcp: Listener,
        udp: DatagramSocket,
        task_set: &mut JoinSet<std::result::Result<(), BoxError>>,
        receivers_cancel: &CancellationToken,
    ) -> std::result::Result<(), BoxError> {
        let tcp_listener = tcp.into_async()?;
        let udp_socket = udp.into_async()?;

        info!(
            endpoint = self.config.endpoint.to_string(),
            "Syslog receiver listening on TCP and UDP"
        );

        let handler = ConnectionHandler {
            output: self.output.clone(),
            max_message_size: self.config.max_message_size,
            cancel_token: receivers_cancel.clone(),
        };
        let cancel = receivers_cancel.clone();

        task_set.spawn(async move {
            loop {
                select! {
                    result = tcp_listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                debug!("Accepted new TCP connection from {}", addr);

                                let handler_clone = handler.clone();
                                tokio::spawn(async move {
                                    handler_clone.handle_tcp_connection(stream).await;
                                });
                            }
                            Err(e) => {
                                error!("Error accepting TCP connection: {}", e);
                            }
                        }
                    }
                    _ = cancel.cancelled() => {
                        info!("TCP listener shutting down");
                        break;
                    }
                }
            }

            Ok(())
        });

        // A single UDP task keeps channel publication in datagram arrival order.
        let output = self.output;
        let max_message_size = self.config.max_message_size;
        let cancel = receivers_cancel.clone();

        task_set.spawn(async move {
            run_udp(udp_socket, output, max_message_size, cancel).await;
            Ok(())
        });

        Ok(())
    }
}

impl ConnectionHandler {
    async fn handle_tcp_connection(self, stream: TcpStream) {
        let decoder = SyslogFrameDecoder::new(self.max_message_size);
        let mut framed = FramedRead::new(stream, decoder);

        use tokio_stream::StreamExt as TokioStreamExt;

        loop {
            select! {
                frame_result = TokioStreamExt::next(&mut framed) => {
                    match frame_result {
                        Some(Ok(frame)) => {
                            if !self.publish(&frame).await {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            debug!("Error reading frame: {}", e);
                            break;
                        }
                        None => {
                            debug!("Connection closed by peer");
                            break;
                        }
                    }
                }

                _ = self.cancel_token.cancelled() => {
                    debug!("Connection handler cancelled");
                    break;
                }
            }
        }
    }

    // Returns false once the pipeline is gone and the connection should close
    async fn publish(&self, frame: &[u8]) -> bool {
        match parser::parse_message(frame) {
            Ok(msg) => {
                debug!(
                    facility = msg.facility.as_str(),
                    severity = msg.severity.as_str(),
                    "Received syslog message"
                );

                if self.output.send(msg).await.is_err() {
                    debug!("Output channel closed, dropping connection");
                    return false;
                }
                true
            }
            Err(e) => {
                debug!("Dropping malformed syslog message: {}", e);
                true
            }
        }
    }
}

async fn run_udp(
    socket: UdpSocket,
    output: BoundedSender<SyslogMessage>,
    max_message_size: usize,
    cancel: CancellationToken,
) {
    // One extra byte so truncated oversize datagrams are detectable
    let mut recv_buf = vec![0u8; max_message_size + 1];

    loop {
        select! {
            recv_result = socket.recv_from(&mut recv_buf) => {
                match recv_result {
                    Ok((len, peer_addr)) => {
                        if len > max_message_size {
                            debug!(
                                peer = peer_addr.to_string(),
                                size = len,
                                max = max_message_size,
                                "Syslog UDP packet too large, dropping"
                            );
                            continue;
                        }

                        match parser::parse_message(&recv_buf[..len]) {
                            Ok(msg) => {
                                if output.send(msg).await.is_err() {
                                    debug!("Output channel closed, stopping UDP listener");
                                    break;
                                }
                            }
                            Err(e) => {
                                debug!(
                                    peer = peer_addr.to_string(),
                                    "Dropping malformed syslog datagram: {}", e
                                );
                            }
                        }
                    }
                    Err(e) => {
                        error!("Error receiving UDP datagram: {}", e);
                    }
                }
            }

            _ = cancel.cancelled() => {
                info!("UDP listener shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded_channel::bounded;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_decode_newline_framing() {
        let mut decoder = SyslogFrameDecoder::new(8192);
        let mut buf = BytesMut::from(&b"<34>Jan  1 00:00:00 h a: one\n<34>Jan  1 00:00:00 h a: two\n"[..]);

        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"<34>Jan  1 00:00:00 h a: one\n");

        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"<34>Jan  1 00:00:00 h a: two\n");

        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_octet_counting() {
        let mut decoder = SyslogFrameDecoder::new(8192);
        let body = b"<34>Jan  1 00:00:00 h a: hi";
        let mut framed = BytesMut::new();
        framed.extend_from_slice(format!("{} ", body.len()).as_bytes());
        framed.extend_from_slice(body);

        let frame = decoder.decode(&mut framed).unwrap().unwrap();
        assert_eq!(&frame[..], &body[..]);
        assert!(framed.is_empty());
    }

    #[test]
    fn test_decode_octet_counting_partial() {
        let mut decoder = SyslogFrameDecoder::new(8192);
        let mut buf = BytesMut::from(&b"27 <34>Jan  1 00:00"[..]);

        // incomplete frame, needs more data
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b":00 h a: hi");
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"<34>Jan  1 00:00:00 h a: hi");
    }

    #[test]
    fn test_decode_eof_emits_unterminated_record() {
        let mut decoder = SyslogFrameDecoder::new(8192);
        let mut buf = BytesMut::from(&b"<34>Jan  1 00:00:00 h a: hi"[..]);

        assert!(decoder.decode(&mut buf).unwrap().is_none());

        let frame = decoder.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"<34>Jan  1 00:00:00 h a: hi");
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_oversized_frame_fails() {
        let mut decoder = SyslogFrameDecoder::new(8);
        let mut buf = BytesMut::from(&b"<34>this line never ends"[..]);

        assert!(decoder.decode(&mut buf).is_err());

        let mut decoder = SyslogFrameDecoder::new(8);
        let mut buf = BytesMut::from(&b"100 <34>"[..]);
        assert!(decoder.decode(&mut buf).is_err());
    }

    #[tokio::test]
    async fn test_receiver_udp_to_channel() {
        let endpoint: std::net::SocketAddr = "127.0.0.1:0".parse().unwrap();
        let tcp = Listener::listen_std(endpoint).unwrap();
        let udp = DatagramSocket::bind_std(endpoint).unwrap();
        let udp_addr = udp.bound_address().unwrap();

        let (tx, mut rx) = bounded::<SyslogMessage>(16);
        let receiver = SyslogReceiver::new(SyslogReceiverConfig::new(endpoint), tx);

        let mut tasks = JoinSet::new();
        let cancel_token = CancellationToken::new();
        receiver
            .start(tcp, udp, &mut tasks, &cancel_token)
            .await
            .unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(b"<34>Jan  1 00:00:00 myhost myapp[100]: hello world", udp_addr)
            .await
            .unwrap();

        let msg = rx.next().await.unwrap();
        assert_eq!(msg.hostname.as_deref(), Some("myhost"));
        assert_eq!(msg.app_name.as_deref(), Some("myapp"));
        assert_eq!(msg.pid.as_deref(), Some("100"));
        assert_eq!(msg.message.as_deref(), Some("hello world"));

        cancel_token.cancel();
        tasks.join_all().await;

        // all senders dropped with the listener tasks
        assert!(rx.next().await.is_none());
    }

    #[tokio::test]
    async fn test_receiver_tcp_to_channel() {
        let endpoint: std::net::SocketAddr = "127.0.0.1:0".parse().unwrap();
        let tcp = Listener::listen_std(endpoint).unwrap();
        let udp = DatagramSocket::bind_std(endpoint).unwrap();
        let tcp_addr = tcp.bound_address().unwrap();

        let (tx, mut rx) = bounded::<SyslogMessage>(16);
        let receiver = SyslogReceiver::new(SyslogReceiverConfig::new(endpoint), tx);

        let mut tasks = JoinSet::new();
        let cancel_token = CancellationToken::new();
        receiver
            .start(tcp, udp, &mut tasks, &cancel_token)
            .await
            .unwrap();

        let mut stream = TcpStream::connect(tcp_addr).await.unwrap();
        stream
            .write_all(b"<13>Oct 11 22:14:15 mymachine su: 'su root' failed\nnot a syslog line\n<13>Oct 11 22:14:16 mymachine su: second\n")
            .await
            .unwrap();
        stream.shutdown().await.unwrap();

        // the malformed middle line is dropped
        let first = rx.next().await.unwrap();
        assert_eq!(first.message.as_deref(), Some("'su root' failed"));

        let second = rx.next().await.unwrap();
        assert_eq!(second.message.as_deref(), Some("second"));

        cancel_token.cancel();
        tasks.join_all().await;
    }
}
