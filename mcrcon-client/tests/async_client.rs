use mcrcon_client::packet::{self, Decoded, Packet, PacketType};
use mcrcon_client::{connect_with, ConnectOptions, ErrorKind, AUTH_REJECTED_ID, SESSION_ID};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

async fn read_packet(stream: &mut TcpStream) -> Option<Packet> {
    let mut buf = Vec::new();
    loop {
        match packet::decode(&buf).unwrap() {
            Decoded::Complete { packet, .. } => return Some(packet),
            Decoded::Incomplete { needed } => {
                let filled = buf.len();
                buf.resize(needed, 0);
                match stream.read(&mut buf[filled..]).await.unwrap() {
                    0 => return None,
                    n => buf.truncate(filled + n),
                }
            }
        }
    }
}

async fn write_packet(stream: &mut TcpStream, packet: Packet) {
    let mut buf = Vec::new();
    packet.encode(&mut buf);
    stream.write_all(&buf).await.unwrap();
}

async fn serve(auth_id: i32, responses: Vec<Packet>) -> (u16, JoinHandle<Vec<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_packet(&mut stream).await.unwrap();
        write_packet(
            &mut stream,
            Packet::new(auth_id, PacketType::AUTH_RESPONSE, Vec::new()),
        )
        .await;

        let mut received = Vec::new();
        for response in responses {
            match read_packet(&mut stream).await {
                Some(request) => received.push(request.body),
                None => break,
            }
            write_packet(&mut stream, response).await;
        }
        received
    });

    (port, handle)
}

fn options() -> ConnectOptions {
    ConnectOptions {
        attempts: 1,
        read_timeout: Duration::from_millis(300),
        ..ConnectOptions::default()
    }
}

#[tokio::test]
async fn command_round_trip() {
    let (port, server) = serve(
        SESSION_ID,
        vec![
            Packet::new(SESSION_ID, PacketType::RESPONSE_VALUE, "Saved the game"),
            Packet::new(SESSION_ID, PacketType::RESPONSE_VALUE, Vec::new()),
        ],
    )
    .await;

    let mut client = connect_with("127.0.0.1", port, &options())
        .await
        .unwrap()
        .authenticate("secret")
        .await
        .unwrap();

    assert_eq!(client.exec_command("save-all").await.unwrap(), b"Saved the game");
    assert!(client.exec_command("say hi").await.unwrap().is_empty());
    client.close().await.unwrap();

    let received = server.await.unwrap();
    assert_eq!(received, vec![b"save-all".to_vec(), b"say hi".to_vec()]);
}

#[tokio::test]
async fn auth_rejected() {
    let (port, _server) = serve(AUTH_REJECTED_ID, Vec::new()).await;

    let err = connect_with("127.0.0.1", port, &options())
        .await
        .unwrap()
        .authenticate("wrong")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthRejected);
}

#[tokio::test]
async fn mismatched_response_id() {
    let (port, _server) = serve(
        SESSION_ID,
        vec![Packet::new(7, PacketType::RESPONSE_VALUE, "stray")],
    )
    .await;

    let mut client = connect_with("127.0.0.1", port, &options())
        .await
        .unwrap()
        .authenticate("secret")
        .await
        .unwrap();

    let err = client.exec_command("list").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResponseId);
}

#[tokio::test]
async fn command_too_long_sends_nothing() {
    let (port, server) = serve(
        SESSION_ID,
        vec![Packet::new(SESSION_ID, PacketType::RESPONSE_VALUE, "ok")],
    )
    .await;

    let mut client = connect_with("127.0.0.1", port, &options())
        .await
        .unwrap()
        .authenticate("secret")
        .await
        .unwrap();

    let err = client.exec_command(&"x".repeat(4096)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommandTooLong);
    assert_eq!(client.exec_command("list").await.unwrap(), b"ok");

    assert_eq!(server.await.unwrap(), vec![b"list".to_vec()]);
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        // Never answer.
        while read_packet(&mut stream).await.is_some() {}
    });

    let client = connect_with("127.0.0.1", port, &options()).await.unwrap();
    let started = Instant::now();
    let err = client.authenticate("secret").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn connect_fails_after_all_attempts() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let options = ConnectOptions {
        attempts: 3,
        retry_delay: Duration::from_millis(50),
        ..ConnectOptions::default()
    };
    let started = Instant::now();
    let err = connect_with("127.0.0.1", port, &options).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connect);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

/// Accept one connection, answer authentication, then hand the stream to `script`.
async fn serve_authenticated<F, Fut>(script: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let auth = read_packet(&mut stream).await.unwrap();
        assert_eq!(auth.kind, PacketType::AUTH);
        write_packet(
            &mut stream,
            Packet::new(auth.id, PacketType::AUTH_RESPONSE, Vec::new()),
        )
        .await;
        script(stream).await;
    });

    (port, handle)
}

async fn login(port: u16) -> mcrcon_client::Client {
    connect_with("127.0.0.1", port, &options())
        .await
        .unwrap()
        .authenticate("secret")
        .await
        .unwrap()
}

/// Answer the first command with `reply` as raw bytes, then hang up.
async fn reply_raw(reply: &'static [u8]) -> ErrorKind {
    let (port, server) = serve_authenticated(move |mut stream| async move {
        read_packet(&mut stream).await.unwrap();
        stream.write_all(reply).await.unwrap();
    })
    .await;

    let mut client = login(port).await;
    let err = client.exec_command("list").await.unwrap_err();
    server.await.unwrap();
    err.kind()
}

#[tokio::test]
async fn oversized_header() {
    assert_eq!(reply_raw(&[0x01, 0x10, 0, 0]).await, ErrorKind::InvalidSize);
}

#[tokio::test]
async fn truncated_header() {
    assert_eq!(reply_raw(&[20, 0]).await, ErrorKind::MalformedHeader);
}

#[tokio::test]
async fn truncated_payload() {
    assert_eq!(
        reply_raw(&[20, 0, 0, 0, 1, 2, 3, 4, 5]).await,
        ErrorKind::TruncatedPayload
    );
}

#[tokio::test]
async fn response_split_across_writes() {
    let (port, server) = serve_authenticated(|mut stream| async move {
        read_packet(&mut stream).await.unwrap();
        let mut buf = Vec::new();
        Packet::new(SESSION_ID, PacketType::RESPONSE_VALUE, "slow response").encode(&mut buf);

        for chunk in buf.chunks(3) {
            stream.write_all(chunk).await.unwrap();
            stream.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    let mut client = login(port).await;
    assert_eq!(client.exec_command("list").await.unwrap(), b"slow response");
    server.await.unwrap();
}

#[tokio::test]
async fn timed_out_command_leaves_session_usable() {
    let (port, server) = serve_authenticated(|mut stream| async move {
        let request = read_packet(&mut stream).await.unwrap();
        assert_eq!(request.body, b"first");

        // Reply only after the client has given up on this command.
        tokio::time::sleep(Duration::from_millis(450)).await;
        write_packet(
            &mut stream,
            Packet::new(SESSION_ID, PacketType::RESPONSE_VALUE, "late"),
        )
        .await;

        let request = read_packet(&mut stream).await.unwrap();
        assert_eq!(request.body, b"second");
    })
    .await;

    let mut client = login(port).await;
    let started = Instant::now();
    let err = client.exec_command("first").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(300));

    // The stale reply is what the next command reads, under a fresh deadline.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(client.exec_command("second").await.unwrap(), b"late");
    server.await.unwrap();
}

#[tokio::test]
async fn connect_succeeds_on_third_attempt() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    // Nothing listens for the first two attempts, at roughly 0s and 1s.
    let server = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let (mut stream, _) = listener.accept().await.unwrap();
        read_packet(&mut stream).await.unwrap();
        write_packet(
            &mut stream,
            Packet::new(SESSION_ID, PacketType::AUTH_RESPONSE, Vec::new()),
        )
        .await;
        read_packet(&mut stream).await.unwrap();
        write_packet(
            &mut stream,
            Packet::new(SESSION_ID, PacketType::RESPONSE_VALUE, "ready"),
        )
        .await;
    });

    let options = ConnectOptions {
        read_timeout: Duration::from_secs(2),
        ..ConnectOptions::default()
    };
    let started = Instant::now();
    let client = connect_with("127.0.0.1", port, &options).await.unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "elapsed {:?}", elapsed);

    let mut client = client.authenticate("secret").await.unwrap();
    assert_eq!(client.exec_command("list").await.unwrap(), b"ready");
    server.await.unwrap();
}
