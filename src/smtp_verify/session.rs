use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Longest reply line accepted from a server, terminator included.
pub(crate) const MAX_LINE_LEN: u64 = 4096;
/// Upper bound on continuation lines in a single reply.
const MAX_REPLY_LINES: usize = 128;

/// A line-oriented byte stream to an SMTP server. Dropping it closes the
/// connection.
pub trait Connection {
    /// Reads one line without its terminator. `Ok(None)` means the peer closed
    /// the connection.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Writes `line` followed by CRLF.
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// Opens [`Connection`]s to mail exchangers.
pub trait Connect {
    type Conn: Connection;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Self::Conn>;
}

impl<T: Connect + ?Sized> Connect for &T {
    type Conn = T::Conn;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Self::Conn> {
        (**self).connect(host, port, timeout)
    }
}

/// Plain TCP connector. The resolved addresses of the host are tried in turn
/// and all share one connect budget of `timeout`, which also bounds every
/// read and write afterwards.
///
/// Host name resolution goes through the system resolver and cannot be
/// interrupted; its duration is charged against the same budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connect for TcpConnector {
    type Conn = TcpConnection;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<TcpConnection> {
        let deadline = Instant::now() + timeout;
        let addrs = (host, port).to_socket_addrs()?;
        let stream = connect_before(addrs, deadline, |addr, budget| {
            let attempt = TcpStream::connect_timeout(addr, budget);
            match &attempt {
                Ok(_) => debug!(host, %addr, "connected"),
                Err(err) => debug!(host, %addr, error = %err, "connect attempt failed"),
            }
            attempt
        })?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(TcpConnection { stream, reader })
    }
}

/// Tries `addrs` in order, giving each attempt what is left until `deadline`.
fn connect_before<T, F>(
    addrs: impl IntoIterator<Item = SocketAddr>,
    deadline: Instant,
    mut attempt: F,
) -> io::Result<T>
where
    F: FnMut(&SocketAddr, Duration) -> io::Result<T>,
{
    let mut last_err = None;
    for addr in addrs {
        let budget = deadline.saturating_duration_since(Instant::now());
        if budget.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "connect timeout elapsed",
            ));
        }
        match attempt(&addr, budget) {
            Ok(conn) => return Ok(conn),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "no socket address available",
        )
    }))
}

pub struct TcpConnection {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Connection for TcpConnection {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        read_bounded_line(&mut self.reader)
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut data = line.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        self.stream.write_all(&data)?;
        self.stream.flush()
    }
}

/// Reads one line of at most [`MAX_LINE_LEN`] bytes. A longer line is an
/// `InvalidData` error: the rest of it must never be read as the next reply.
pub(crate) fn read_bounded_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut raw = Vec::new();
    let read = reader.take(MAX_LINE_LEN).read_until(b'\n', &mut raw)?;
    if read == 0 {
        return Ok(None);
    }
    if read as u64 == MAX_LINE_LEN && raw.last() != Some(&b'\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("reply line longer than {MAX_LINE_LEN} bytes"),
        ));
    }
    while matches!(raw.last(), Some(b'\n' | b'\r')) {
        raw.pop();
    }
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

/// A complete SMTP reply: status code, text of each line and the final line
/// exactly as received.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
    last_line: String,
}

impl SmtpReply {
    /// The last line of the reply, trimmed.
    pub fn raw(&self) -> &str {
        &self.last_line
    }
}

#[derive(Debug, Error)]
pub(crate) enum ReplyError {
    #[error("connection closed by server")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed reply: {0:?}")]
    Malformed(String),
}

/// One SMTP conversation with a single host.
pub(crate) struct SmtpSession<T> {
    host: String,
    conn: T,
}

impl<T: Connection> SmtpSession<T> {
    pub(crate) fn new(host: impl Into<String>, conn: T) -> Self {
        Self {
            host: host.into(),
            conn,
        }
    }

    pub(crate) fn read_reply(&mut self) -> Result<SmtpReply, ReplyError> {
        let mut code = None;
        let mut lines = Vec::new();
        loop {
            let raw = self.conn.read_line()?.ok_or(ReplyError::Closed)?;
            debug!(host = %self.host, "S: {raw}");
            let (line_code, continuation, text) = parse_line(&raw)?;
            if code.is_some_and(|existing| existing != line_code) {
                return Err(ReplyError::Malformed(raw));
            }
            code = Some(line_code);
            lines.push(text.to_string());
            if !continuation {
                return Ok(SmtpReply {
                    code: line_code,
                    lines,
                    last_line: raw.trim().to_string(),
                });
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(ReplyError::Malformed(raw));
            }
        }
    }

    pub(crate) fn command(&mut self, command: &str) -> Result<SmtpReply, ReplyError> {
        debug!(host = %self.host, "C: {command}");
        self.conn.write_line(command)?;
        self.read_reply()
    }

    /// Sends `QUIT` without waiting for the reply; failures are ignored.
    pub(crate) fn quit(mut self) {
        debug!(host = %self.host, "C: QUIT");
        if let Err(err) = self.conn.write_line("QUIT") {
            debug!(host = %self.host, error = %err, "QUIT not delivered");
        }
    }
}

/// Splits `250-text` / `250 text` / `250` into code, continuation flag and text.
fn parse_line(raw: &str) -> Result<(u16, bool, &str), ReplyError> {
    let malformed = || ReplyError::Malformed(raw.to_string());
    let digits = raw.get(..3).filter(|d| d.bytes().all(|b| b.is_ascii_digit()));
    let code = digits
        .and_then(|d| d.parse::<u16>().ok())
        .ok_or_else(malformed)?;
    match raw.as_bytes().get(3) {
        None => Ok((code, false, "")),
        Some(b'-') => Ok((code, true, &raw[4..])),
        Some(b' ') => Ok((code, false, raw[4..].trim_end())),
        Some(_) => Err(malformed()),
    }
}
