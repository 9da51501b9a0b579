use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;
use std::time::Duration;

use proptest::prelude::*;
use trust_dns_resolver::error::ResolveError;

use super::session::{MAX_LINE_LEN, read_bounded_line};
use super::{ConfigError, Connect, Connection, ReasonCode, Verifier, VerifierOptions};
use crate::mx::MxRecord;
use crate::mx::tests::StubResolver;

type Transcript = Rc<RefCell<Vec<(String, String)>>>;

#[derive(Clone)]
enum HostScript {
    Refuse,
    Replies(Vec<&'static str>),
}

/// Connector double: each host either refuses or plays back canned reply
/// lines, one per read. Every connect and every written line is recorded.
#[derive(Default)]
pub(crate) struct StubConnector {
    hosts: HashMap<String, HostScript>,
    connects: RefCell<Vec<String>>,
    sent: Transcript,
}

impl StubConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn refuse(mut self, host: &str) -> Self {
        self.hosts.insert(host.to_string(), HostScript::Refuse);
        self
    }

    pub(crate) fn replies(mut self, host: &str, lines: &[&'static str]) -> Self {
        self.hosts
            .insert(host.to_string(), HostScript::Replies(lines.to_vec()));
        self
    }

    pub(crate) fn connects(&self) -> Vec<String> {
        self.connects.borrow().clone()
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connects.borrow().len()
    }

    fn sent_to(&self, host: &str) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .filter(|(to, _)| to == host)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

pub(crate) struct ScriptedConnection {
    host: String,
    replies: VecDeque<&'static str>,
    sent: Transcript,
}

impl Connection for ScriptedConnection {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.replies.pop_front().map(str::to_string))
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.sent
            .borrow_mut()
            .push((self.host.clone(), line.to_string()));
        Ok(())
    }
}

impl Connect for StubConnector {
    type Conn = ScriptedConnection;

    fn connect(&self, host: &str, _port: u16, _timeout: Duration) -> io::Result<Self::Conn> {
        self.connects.borrow_mut().push(host.to_string());
        match self.hosts.get(host) {
            Some(HostScript::Replies(lines)) => Ok(ScriptedConnection {
                host: host.to_string(),
                replies: lines.iter().copied().collect(),
                sent: Rc::clone(&self.sent),
            }),
            Some(HostScript::Refuse) | None => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )),
        }
    }
}

const GREETING: &str = "220 mx.example.com ESMTP";
const HELO_OK: &str = "250 mx.example.com";
const MAIL_OK: &str = "250 2.1.0 Sender ok";

fn rcpt(reply: &'static str) -> [&'static str; 4] {
    [GREETING, HELO_OK, MAIL_OK, reply]
}

fn options() -> VerifierOptions {
    VerifierOptions::default()
        .with_helo_name("probe.example.org")
        .with_from_address("bounce@example.org")
}

fn verifier<'a>(
    resolver: &'a StubResolver,
    connector: &'a StubConnector,
    options: VerifierOptions,
) -> Verifier<&'a StubResolver, &'a StubConnector> {
    Verifier::new(options, resolver, connector).expect("valid options")
}

fn hosts(records: &[(u16, &str)]) -> StubResolver {
    StubResolver::with_records(
        records
            .iter()
            .map(|(pref, host)| MxRecord::new(*pref, *host))
            .collect(),
    )
}

#[test]
fn invalid_format_never_touches_network() {
    let resolver = hosts(&[(10, "mx.example.com")]);
    let connector = StubConnector::new();
    let verifier = verifier(&resolver, &connector, options());

    for input in ["", "plainaddress", "a@@example.com", "a b@example.com", "user@localhost"] {
        let verdict = verifier.verify(input);
        assert_eq!(verdict.reason(), &ReasonCode::InvalidFormat, "{input:?}");
        assert!(!verdict.is_valid());
        assert!(verdict.attempted_servers().is_empty());
    }
    assert_eq!(resolver.query_count(), 0);
    assert_eq!(connector.connect_count(), 0);
}

#[test]
fn no_mx_record_means_one_lookup_and_no_connection() {
    let resolver = hosts(&[]);
    let connector = StubConnector::new();
    let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");

    assert_eq!(verdict.reason(), &ReasonCode::NoMxRecord);
    assert_eq!(resolver.query_count(), 1);
    assert_eq!(connector.connect_count(), 0);
}

#[test]
fn lookup_error_maps_to_no_mx_record() {
    let resolver = StubResolver::new(|_| Err(ResolveError::from("request timed out")));
    let connector = StubConnector::new();
    let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");

    assert_eq!(verdict.reason(), &ReasonCode::NoMxRecord);
    assert_eq!(connector.connect_count(), 0);
}

#[test]
fn address_is_normalized_before_lookup() {
    let resolver = hosts(&[(10, "mx.example.com")]);
    let connector = StubConnector::new().replies("mx.example.com", &rcpt("250 2.1.5 Ok"));
    let verdict = verifier(&resolver, &connector, options()).verify("  John.Doe@EXAMPLE.com ");

    assert_eq!(verdict.email(), "john.doe@example.com");
    assert_eq!(resolver.queries.borrow().as_slice(), ["example.com"]);
    assert!(
        connector
            .sent_to("mx.example.com")
            .contains(&"RCPT TO:<john.doe@example.com>".to_string())
    );
}

#[test]
fn hosts_are_tried_in_preference_order() {
    let resolver = hosts(&[(10, "a"), (5, "b"), (20, "c")]);
    let connector = StubConnector::new();
    let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");

    assert_eq!(connector.connects(), ["b", "a", "c"]);
    assert_eq!(verdict.attempted_servers(), ["b", "a", "c"]);
    assert_eq!(
        verdict.reason(),
        &ReasonCode::ConnectionFailed("connection refused".to_string())
    );
    assert_eq!(verdict.used_server(), None);
    assert!(!verdict.is_valid());
}

#[test]
fn attempt_cap_limits_connections() {
    let resolver = hosts(&[(10, "a"), (20, "b"), (30, "c")]);
    let connector = StubConnector::new().refuse("a").refuse("b").refuse("c");
    let verdict = verifier(&resolver, &connector, options().with_max_mx_attempts(2))
        .verify("user@example.com");

    assert_eq!(connector.connect_count(), 2);
    assert_eq!(verdict.attempted_servers().len(), 2);
}

#[test]
fn zero_attempts_still_tries_one_host() {
    let resolver = hosts(&[(10, "a"), (20, "b")]);
    let connector = StubConnector::new();
    let raw = VerifierOptions {
        max_mx_attempts: 0,
        ..options()
    };
    let verdict = verifier(&resolver, &connector, raw).verify("user@example.com");

    assert_eq!(connector.connects(), ["a"]);
    assert_eq!(verdict.attempted_servers(), ["a"]);
}

#[test]
fn falls_back_to_next_host_after_connect_failure() {
    let resolver = hosts(&[(10, "mx1.example.com"), (20, "mx2.example.com")]);
    let connector = StubConnector::new()
        .refuse("mx1.example.com")
        .replies("mx2.example.com", &rcpt("250 2.1.5 Recipient ok"));
    let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");

    assert!(verdict.is_valid());
    assert_eq!(verdict.reason(), &ReasonCode::Valid);
    assert_eq!(verdict.used_server(), Some("mx2.example.com"));
    assert_eq!(
        verdict.attempted_servers(),
        ["mx1.example.com", "mx2.example.com"]
    );
    assert_eq!(verdict.response(), Some("250 2.1.5 Recipient ok"));
}

#[test]
fn dialog_sends_expected_commands() {
    let resolver = hosts(&[(10, "mx.example.com")]);
    let connector = StubConnector::new().replies("mx.example.com", &rcpt("251 forwarded"));
    let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");

    assert!(verdict.is_valid());
    assert_eq!(
        connector.sent_to("mx.example.com"),
        [
            "HELO probe.example.org",
            "MAIL FROM:<bounce@example.org>",
            "RCPT TO:<user@example.com>",
            "QUIT",
        ]
    );
}

#[test]
fn rejected_mailbox_is_conclusive() {
    for code in ["550", "551", "553", "554", "540"] {
        let line: &'static str = Box::leak(format!("{code} 5.1.1 No such user").into_boxed_str());
        let resolver = hosts(&[(10, "mx1"), (20, "mx2")]);
        let connector = StubConnector::new()
            .replies("mx1", &rcpt(line))
            .replies("mx2", &rcpt("250 ok"));
        let verdict = verifier(&resolver, &connector, options()).verify("ghost@example.com");

        assert_eq!(verdict.reason(), &ReasonCode::UserUnknown, "{code}");
        assert!(!verdict.is_valid());
        assert_eq!(verdict.used_server(), Some("mx1"));
        assert_eq!(verdict.response(), Some(line));
        assert_eq!(connector.connects(), ["mx1"], "{code} must stop iteration");
        assert_eq!(connector.sent_to("mx1").last().map(String::as_str), Some("QUIT"));
    }
}

/// Connector handing out raw byte streams framed by the production line
/// reader, so line-length handling is exercised end to end.
struct ByteConnector(HashMap<String, Vec<u8>>);

struct ByteConnection(io::Cursor<Vec<u8>>);

impl Connection for ByteConnection {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        read_bounded_line(&mut self.0)
    }

    fn write_line(&mut self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

impl Connect for ByteConnector {
    type Conn = ByteConnection;

    fn connect(&self, host: &str, _port: u16, _timeout: Duration) -> io::Result<ByteConnection> {
        self.0
            .get(host)
            .map(|bytes| ByteConnection(io::Cursor::new(bytes.clone())))
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"))
    }
}

#[test]
fn overlong_reply_line_never_shifts_replies() {
    let pad = "a".repeat(MAX_LINE_LEN as usize - 4);
    let mail_from = format!(
        "220 mx1 ESMTP\r\n250 mx1\r\n250 {pad}550 5.1.1 nope\r\n250 2.1.5 Ok\r\n"
    );
    let greeting = format!(
        "220 {}\r\n250 ok\r\n250 ok\r\n250 ok\r\n",
        "x".repeat(5_000)
    );
    let resolver = hosts(&[(10, "mx1"), (20, "mx2")]);
    let connector = ByteConnector(HashMap::from([
        ("mx1".to_string(), mail_from.into_bytes()),
        ("mx2".to_string(), greeting.into_bytes()),
    ]));
    let verdict = Verifier::new(options(), &resolver, &connector)
        .expect("valid options")
        .verify("user@example.com");

    assert!(!verdict.is_conclusive());
    assert_eq!(verdict.attempted_servers(), ["mx1", "mx2"]);
    assert_eq!(verdict.reason(), &ReasonCode::ConnectionDropped);
    assert_eq!(verdict.response(), None);
}

#[test]
fn unrecognized_rcpt_status_moves_on() {
    let resolver = hosts(&[(10, "mx1"), (20, "mx2")]);
    let connector = StubConnector::new()
        .replies("mx1", &rcpt("450 4.2.0 Mailbox busy"))
        .replies("mx2", &rcpt("250 ok"));
    let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");

    assert_eq!(connector.connects(), ["mx1", "mx2"]);
    assert!(verdict.is_valid());
    assert_eq!(verdict.used_server(), Some("mx2"));
}

#[test]
fn exhausted_hosts_report_last_failure() {
    let resolver = hosts(&[(10, "mx1"), (20, "mx2")]);
    let connector = StubConnector::new()
        .replies("mx1", &rcpt("450 4.2.0 Mailbox busy"))
        .refuse("mx2");
    let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");
    assert_eq!(
        verdict.reason(),
        &ReasonCode::ConnectionFailed("connection refused".into())
    );
    assert_eq!(verdict.response(), None);

    let connector = StubConnector::new()
        .refuse("mx1")
        .replies("mx2", &rcpt("452 4.3.1 Insufficient storage"));
    let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");
    assert_eq!(verdict.reason(), &ReasonCode::UnknownError);
    assert_eq!(verdict.response(), Some("452 4.3.1 Insufficient storage"));
    assert_eq!(verdict.attempted_servers(), ["mx1", "mx2"]);
    assert_eq!(verdict.used_server(), None);
}

#[test]
fn refused_stages_map_to_protocol_reasons() {
    let cases: [(&[&'static str], ReasonCode, &str); 3] = [
        (&["554 go away"], ReasonCode::SmtpError, "554 go away"),
        (
            &[GREETING, "501 bad HELO"],
            ReasonCode::HeloFailed,
            "501 bad HELO",
        ),
        (
            &[GREETING, HELO_OK, "553 sender rejected"],
            ReasonCode::MailFromFailed,
            "553 sender rejected",
        ),
    ];

    for (script, expected, response) in cases {
        let resolver = hosts(&[(10, "mx")]);
        let connector = StubConnector::new().replies("mx", script);
        let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");

        assert_eq!(verdict.reason(), &expected);
        assert_eq!(verdict.response(), Some(response));
        assert!(!verdict.is_conclusive());
        assert_eq!(
            connector.sent_to("mx").last().map(String::as_str),
            Some("QUIT"),
            "{expected} still ends the session"
        );
    }
}

#[test]
fn drops_map_to_connection_reasons_without_quit() {
    let cases: [(&[&'static str], ReasonCode); 4] = [
        (&[], ReasonCode::ConnectionDropped),
        (&[GREETING], ReasonCode::ConnectionDroppedHelo),
        (&[GREETING, HELO_OK], ReasonCode::ConnectionDroppedMailFrom),
        (&[GREETING, HELO_OK, MAIL_OK], ReasonCode::ConnectionDroppedRcpt),
    ];

    for (script, expected) in cases {
        let resolver = hosts(&[(10, "mx")]);
        let connector = StubConnector::new().replies("mx", script);
        let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");

        assert_eq!(verdict.reason(), &expected);
        assert!(verdict.reason().is_connection_class());
        assert!(!connector.sent_to("mx").contains(&"QUIT".to_string()));
    }
}

#[test]
fn multi_line_replies_are_read_whole() {
    let resolver = hosts(&[(10, "mx")]);
    let connector = StubConnector::new().replies(
        "mx",
        &[
            "220-mx.example.com ESMTP",
            "220 no UCE",
            "250-mx.example.com",
            "250 PIPELINING",
            MAIL_OK,
            "250 2.1.5 Ok",
        ],
    );
    let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");
    assert!(verdict.is_valid());
}

#[test]
fn malformed_greeting_is_smtp_error() {
    let resolver = hosts(&[(10, "mx")]);
    let connector = StubConnector::new().replies("mx", &["HTTP/1.1 400 Bad Request"]);
    let verdict = verifier(&resolver, &connector, options()).verify("user@example.com");

    assert_eq!(verdict.reason(), &ReasonCode::SmtpError);
    assert_eq!(verdict.response(), Some("HTTP/1.1 400 Bad Request"));
}

#[test]
fn repeated_verification_is_identical() {
    let resolver = hosts(&[(10, "mx1"), (20, "mx2")]);
    let connector = StubConnector::new()
        .refuse("mx1")
        .replies("mx2", &rcpt("550 5.1.1 unknown"));
    let verifier = verifier(&resolver, &connector, options());

    let first = verifier.verify("user@example.com");
    let second = verifier.verify("user@example.com");
    assert_eq!(first, second);
}

#[test]
fn construction_rejects_bad_options() {
    let resolver = hosts(&[]);
    let connector = StubConnector::new();
    let result = Verifier::new(
        options().with_from_address("nobody"),
        &resolver,
        &connector,
    );
    assert!(matches!(result, Err(ConfigError::InvalidFromAddress { .. })));
}

proptest! {
    #[test]
    fn inputs_without_at_sign_are_invalid_format(input in "[^@]{0,40}") {
        let resolver = hosts(&[(10, "mx.example.com")]);
        let connector = StubConnector::new();
        let verdict = verifier(&resolver, &connector, options()).verify(&input);

        prop_assert_eq!(verdict.reason(), &ReasonCode::InvalidFormat);
        prop_assert!(!verdict.is_valid());
        prop_assert_eq!(resolver.query_count(), 0);
        prop_assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn local_parts_with_spaces_are_invalid_format(
        left in "[a-z]{1,8}",
        right in "[a-z]{1,8}",
    ) {
        let resolver = hosts(&[(10, "mx.example.com")]);
        let connector = StubConnector::new();
        let email = format!("{left} {right}@example.com");
        let verdict = verifier(&resolver, &connector, options()).verify(&email);

        prop_assert_eq!(verdict.reason(), &ReasonCode::InvalidFormat);
        prop_assert_eq!(connector.connect_count(), 0);
    }
}

#[test]
#[ignore = "requires loopback TCP binding"]
fn verifies_against_loopback_server() {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::TcpConnector;

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let port = listener.local_addr().expect("addr").port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        stream.write_all(b"220 mock.smtp.test ESMTP\r\n").expect("greeting");
        for (expected, response) in [
            ("HELO", "250 mock.smtp.test\r\n"),
            ("MAIL FROM:", "250 2.1.0 Ok\r\n"),
            ("RCPT TO:", "550 5.1.1 User unknown\r\n"),
            ("QUIT", ""),
        ] {
            let mut line = String::new();
            reader.read_line(&mut line).expect("command");
            assert!(line.starts_with(expected), "expected {expected}, got {line}");
            stream.write_all(response.as_bytes()).expect("reply");
        }
    });

    let resolver = hosts(&[(10, "127.0.0.1")]);
    let verifier = Verifier::new(
        options()
            .with_port(port)
            .with_timeout(Duration::from_secs(2)),
        &resolver,
        TcpConnector,
    )
    .expect("valid options");
    let verdict = verifier.verify("user@example.com");

    assert_eq!(verdict.reason(), &ReasonCode::UserUnknown);
    assert_eq!(verdict.used_server(), Some("127.0.0.1"));
    handle.join().expect("server thread");
}
