use crate::packet::{self, Decoded, Packet};
use crate::{
    auth_packet, check_auth_response, check_command_response, command_packet, connection_closed,
    join_host_port, read_error, ConnectOptions, RconError,
};
use log::{debug, warn};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Asynchronously connect to an RCON server.
///
/// Up to three attempts are made, one second apart, each bounded by a ten second timeout. On
/// success a [`NotAuthenticatedClient`] is returned, which must be authenticated before commands
/// can be sent.
///
/// # Example
/// ```rust,no_run
/// use mcrcon_client::connect;
///
/// #[tokio::main]
/// async fn main() {
///     let client = connect("localhost", 25575).await.unwrap();
///
///     match client.authenticate("password123").await {
///         Ok(mut client) => {
///             let body = client.exec_command("list").await.unwrap();
///             println!("{}", String::from_utf8_lossy(&body));
///         }
///         Err(err) => panic!("Authentication failed: {}", err),
///     }
/// }
/// ```
pub async fn connect(host: &str, port: u16) -> crate::Result<NotAuthenticatedClient> {
    NotAuthenticatedClient::new(host, port, ConnectOptions::default()).await
}

/// Like [`connect`], with custom timing.
pub async fn connect_with(
    host: &str,
    port: u16,
    options: &ConnectOptions,
) -> crate::Result<NotAuthenticatedClient> {
    NotAuthenticatedClient::new(host, port, options.clone()).await
}

#[derive(Debug)]
pub struct NotAuthenticatedClient {
    conn: Connection,
}

#[derive(Debug)]
pub struct Client {
    conn: Connection,
}

#[derive(Debug)]
struct Connection {
    stream: TcpStream,
    buffer: Vec<u8>,
    read_timeout: Duration,
}

impl NotAuthenticatedClient {
    async fn new(host: &str, port: u16, options: ConnectOptions) -> crate::Result<Self> {
        let stream = connect_stream(host, port, &options).await?;

        if let Err(err) = stream.set_nodelay(true) {
            warn!("Could not disable Nagle's algorithm: {}", err);
        }

        Ok(NotAuthenticatedClient {
            conn: Connection {
                stream,
                buffer: Vec::new(),
                read_timeout: options.read_timeout,
            },
        })
    }

    /// Authenticate with the server's RCON password.
    ///
    /// On failure the connection is dropped; a rejected session cannot be reused.
    pub async fn authenticate(mut self, password: &str) -> crate::Result<Client> {
        self.conn.send(&auth_packet(password)).await?;
        let response = self.conn.receive().await?;
        check_auth_response(&response)?;

        debug!("Authenticated");
        Ok(Client { conn: self.conn })
    }
}

impl Client {
    /// Run a command and wait for its response body.
    pub async fn exec_command(&mut self, cmd: &str) -> crate::Result<Vec<u8>> {
        let request = command_packet(cmd)?;
        self.conn.send(&request).await?;
        let response = self.conn.receive().await?;
        check_command_response(response)
    }

    pub async fn close(mut self) -> crate::Result<()> {
        match self.conn.stream.shutdown().await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(RconError::Send(err).into()),
        }
    }
}

impl Connection {
    async fn send(&mut self, packet: &Packet) -> crate::Result<()> {
        let mut buf = Vec::new();
        packet.encode(&mut buf);

        self.stream.write_all(&buf).await.map_err(RconError::Send)?;
        debug!(
            "Sent packet id={} type={} size={}",
            packet.id,
            packet.kind.0,
            packet.size()
        );
        Ok(())
    }

    async fn receive(&mut self) -> crate::Result<Packet> {
        // The deadline covers the whole frame and ends with this call.
        match tokio::time::timeout(self.read_timeout, self.read_frame()).await {
            Ok(res) => res,
            Err(_) => Err(RconError::Timeout(self.read_timeout).into()),
        }
    }

    async fn read_frame(&mut self) -> crate::Result<Packet> {
        self.buffer.clear();

        loop {
            let needed = match packet::decode(&self.buffer)? {
                Decoded::Complete { packet, .. } => {
                    debug!(
                        "Received packet id={} type={} size={}",
                        packet.id,
                        packet.kind.0,
                        packet.size()
                    );
                    return Ok(packet);
                }
                Decoded::Incomplete { needed } => needed,
            };

            let filled = self.buffer.len();
            self.buffer.resize(needed, 0);
            let read_len = match self.stream.read(&mut self.buffer[filled..]).await {
                Ok(0) => return Err(read_error(filled, connection_closed()).into()),
                Ok(read_len) => read_len,
                Err(err) => return Err(read_error(filled, err).into()),
            };
            self.buffer.truncate(filled + read_len);
        }
    }
}

async fn connect_stream(
    host: &str,
    port: u16,
    options: &ConnectOptions,
) -> crate::Result<TcpStream> {
    let addr = join_host_port(host, port);
    let mut last_err = io::Error::new(io::ErrorKind::Other, "no connection attempts made");

    for attempt in 1..=options.attempts {
        let res = match tokio::time::timeout(
            options.attempt_timeout,
            TcpStream::connect((host, port)),
        )
        .await
        {
            Ok(res) => res,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("timed out after {:?}", options.attempt_timeout),
            )),
        };

        match res {
            Ok(stream) => {
                debug!("Connected to {} on attempt {}", addr, attempt);
                return Ok(stream);
            }
            Err(err) => {
                warn!(
                    "Connection attempt {}/{} to {} failed: {}",
                    attempt, options.attempts, addr, err
                );
                last_err = err;
            }
        }

        if attempt < options.attempts {
            tokio::time::sleep(options.retry_delay).await;
        }
    }

    Err(RconError::Connect {
        addr,
        source: last_err,
    }
    .into())
}
