//! Blocking client built on [`std::net::TcpStream`].

use crate::packet::{self, Decoded, Packet};
use crate::{
    auth_packet, check_auth_response, check_command_response, command_packet, connection_closed,
    join_host_port, read_error, ConnectOptions, RconError,
};
use log::{debug, warn};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Connect to `host:port` with the default [`ConnectOptions`].
pub fn connect(host: &str, port: u16) -> crate::Result<NotAuthenticatedClient> {
    NotAuthenticatedClient::new(host, port, ConnectOptions::default())
}

/// Connect to `host:port` with custom timing.
pub fn connect_with(
    host: &str,
    port: u16,
    options: &ConnectOptions,
) -> crate::Result<NotAuthenticatedClient> {
    NotAuthenticatedClient::new(host, port, options.clone())
}

/// A connected session that has not authenticated yet.
#[derive(Debug)]
pub struct NotAuthenticatedClient {
    conn: Connection,
}

/// An authenticated session, ready to run commands.
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

/// Clears the socket read timeout when dropped, so a deadline never outlives the read it was set
/// for.
struct ReadDeadline<'a> {
    stream: &'a TcpStream,
    deadline: Instant,
    timeout: Duration,
}

impl NotAuthenticatedClient {
    fn new(host: &str, port: u16, options: ConnectOptions) -> crate::Result<Self> {
        let stream = connect_stream(host, port, &options)?;

        // Commands are single small packets; don't let Nagle hold them back.
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
    /// On failure the connection is closed and a new session has to be created.
    pub fn authenticate(mut self, password: &str) -> crate::Result<Client> {
        self.conn.send(&auth_packet(password))?;
        let response = self.conn.receive()?;
        check_auth_response(&response)?;

        debug!("Authenticated");
        Ok(Client { conn: self.conn })
    }
}

impl Client {
    /// Run a command and return the raw response body, which may be empty.
    pub fn exec_command(&mut self, cmd: &str) -> crate::Result<Vec<u8>> {
        let request = command_packet(cmd)?;
        self.conn.send(&request)?;
        let response = self.conn.receive()?;
        check_command_response(response)
    }

    /// Shut the connection down.
    pub fn close(self) -> crate::Result<()> {
        match self.conn.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already closed by the peer.
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(RconError::Send(err).into()),
        }
    }
}

impl Connection {
    fn send(&mut self, packet: &Packet) -> crate::Result<()> {
        let mut buf = Vec::new();
        packet.encode(&mut buf);

        // Whole packet in one write.
        self.stream.write_all(&buf).map_err(RconError::Send)?;
        debug!(
            "Sent packet id={} type={} size={}",
            packet.id,
            packet.kind.0,
            packet.size()
        );
        Ok(())
    }

    fn receive(&mut self) -> crate::Result<Packet> {
        let mut deadline = ReadDeadline::new(&self.stream, self.read_timeout);
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

            // Only ask for what the current frame still needs.
            let filled = self.buffer.len();
            self.buffer.resize(needed, 0);
            let read_len = match deadline.read(&mut self.buffer[filled..]) {
                Ok(0) => return Err(read_error(filled, connection_closed()).into()),
                Ok(read_len) => read_len,
                Err(err) => {
                    return Err(match err.kind() {
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                            RconError::Timeout(self.read_timeout)
                        }
                        _ => read_error(filled, err),
                    }
                    .into())
                }
            };
            self.buffer.truncate(filled + read_len);
        }
    }
}

impl<'a> ReadDeadline<'a> {
    fn new(stream: &'a TcpStream, timeout: Duration) -> Self {
        ReadDeadline {
            stream,
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    /// Read with whatever is left of the deadline as the socket timeout.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no response within {:?}", self.timeout),
                ));
            }
            self.stream.set_read_timeout(Some(remaining))?;

            let mut stream = self.stream;
            match stream.read(buf) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                res => return res,
            }
        }
    }
}

impl Drop for ReadDeadline<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.stream.set_read_timeout(None) {
            warn!("Could not clear read timeout: {}", err);
        }
    }
}

fn connect_stream(host: &str, port: u16, options: &ConnectOptions) -> crate::Result<TcpStream> {
    let addr = join_host_port(host, port);
    let mut last_err = io::Error::new(io::ErrorKind::Other, "no connection attempts made");

    for attempt in 1..=options.attempts {
        match try_connect(host, port, options.attempt_timeout) {
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
            std::thread::sleep(options.retry_delay);
        }
    }

    Err(RconError::Connect {
        addr,
        source: last_err,
    }
    .into())
}

/// One attempt: every resolved address is tried in turn, all within the same `timeout`.
fn try_connect(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addrs = (host, port).to_socket_addrs()?;
    connect_any(addrs, timeout).map_err(|err| {
        err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} did not resolve to any address", host),
            )
        })
    })
}

/// `Err(None)` when there was no address to try.
fn connect_any<I>(addrs: I, timeout: Duration) -> Result<TcpStream, Option<io::Error>>
where
    I: IntoIterator<Item = SocketAddr>,
{
    let deadline = Instant::now() + timeout;
    let mut last_err = None;

    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Some(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("timed out after {:?}", timeout),
            )));
        }

        match TcpStream::connect_timeout(&addr, remaining) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err)
}
