//! End-to-end tests against a fake IRC server on a loopback TCP socket.

use std::time::Duration;

use tirc::irc::{builders, Client, ClientError, ClientOptions, ConnectionState, Prefix};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    async fn accept(listener: &TcpListener) -> Peer {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, writer) = stream.into_split();
        Peer {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }
}

fn client(timeout: Duration) -> Client {
    Client::new(Prefix::new("botn", "localhost", "botu"), "cool guy").with_options(ClientOptions {
        handshake_timeout: timeout,
        ..ClientOptions::default()
    })
}

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

#[tokio::test]
async fn full_session_over_tcp() {
    let (listener, addr) = listen().await;
    let (tx, mut rx) = mpsc::channel(16);
    let mut client = client(Duration::from_secs(3));

    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        assert_eq!(peer.line().await, "PASS :letmein\r\n");
        assert_eq!(peer.line().await, "NICK :botn\r\n");
        assert_eq!(peer.line().await, "USER botu 0 * :cool guy\r\n");
        peer.send(":irc.example.net 001 botn :Welcome\r\n").await;

        assert_eq!(peer.line().await, "JOIN :#general\r\n");
        // PING goes first so its PONG is queued before the client's next send.
        peer.send("PING :irc.example.net\r\n").await;
        peer.send(":botn!~botu@localhost JOIN :#general\r\n").await;
        assert_eq!(peer.line().await, "PONG :irc.example.net\r\n");

        assert_eq!(peer.line().await, "PRIVMSG #general :hello #general\r\n");
        assert_eq!(peer.line().await, "QUIT :bye\r\n");
        peer.send("ERROR :Closing link: botn (Quit: bye)\r\n").await;
        // Client closes its end once the session is over.
        assert_eq!(peer.line().await, "");
    });

    client.connect(&addr, "letmein", tx).await.unwrap();
    assert!(client.is_connected());

    client
        .send(builders::join(Prefix::default(), &["#general"], &[]).unwrap())
        .await
        .unwrap();
    let joined = rx.recv().await.unwrap();
    assert_eq!(joined.command(), "JOIN");
    assert_eq!(joined.prefix().nick, "botn");

    client
        .send(builders::privmsg(Prefix::default(), "#general", "hello #general"))
        .await
        .unwrap();
    client.quit("bye").await.unwrap();

    // ERROR after QUIT ends the session and closes the sink.
    assert!(rx.recv().await.is_none());
    let mut state = client.watch_state();
    state
        .wait_for(|s| *s == ConnectionState::Disconnected)
        .await
        .unwrap();
    client.disconnect().await.unwrap();

    server.await.unwrap();
}

#[tokio::test]
async fn dial_failure_is_surfaced() {
    let (listener, addr) = listen().await;
    drop(listener);

    let (tx, _rx) = mpsc::channel(1);
    let mut client = client(Duration::from_secs(3));
    let err = client.connect(&addr, "", tx).await.unwrap_err();
    assert!(matches!(err, ClientError::Io(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn silent_server_times_out() {
    let (listener, addr) = listen().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        assert_eq!(peer.line().await, "NICK :botn\r\n");
        assert_eq!(peer.line().await, "USER botu 0 * :cool guy\r\n");
        // Never welcome; wait for the client to hang up.
        assert_eq!(peer.line().await, "");
    });

    let (tx, _rx) = mpsc::channel(1);
    let mut client = client(Duration::from_millis(300));
    let err = client.connect(&addr, "", tx).await.unwrap_err();
    assert!(matches!(err, ClientError::HandshakeTimeout(_)));
    assert_eq!(err.to_string(), "handshake received no reply within 300ms");
    assert!(!client.is_connected());

    server.await.unwrap();
}

#[tokio::test]
async fn server_hangup_ends_session() {
    let (listener, addr) = listen().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.line().await;
        peer.line().await;
        peer.send(":irc.example.net 001 botn :Welcome\r\n").await;
        peer.send(":irc.example.net NOTICE botn :going down\r\n").await;
    });

    let (tx, mut rx) = mpsc::channel(16);
    let mut client = client(Duration::from_secs(3));
    client.connect(&addr, "", tx).await.unwrap();
    server.await.unwrap();

    let notice = rx.recv().await.unwrap();
    assert_eq!(notice.command(), "NOTICE");
    assert!(rx.recv().await.is_none());
    assert!(!client.is_connected());
    client.disconnect().await.unwrap();
}
