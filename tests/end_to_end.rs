//! End-to-end tests over real TCP connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use chat_hub::{ChatServer, HubConfig, RoutingPolicy, ServerConfig};

struct Client {
    stream: BufReader<TcpStream>,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            stream: BufReader::new(stream),
        }
    }

    async fn send(&mut self, data: &[u8]) {
        self.stream.get_mut().write_all(data).await.unwrap();
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(2), self.stream.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .unwrap();
        line
    }

    /// Send a command and return the first reply line
    async fn request(&mut self, data: &[u8]) -> String {
        self.send(data).await;
        self.line().await
    }

    /// Assert nothing arrives within a short window
    async fn assert_silent(&mut self) {
        let mut buf = [0u8; 64];
        let read = tokio::time::timeout(Duration::from_millis(100), self.stream.read(&mut buf)).await;
        assert!(read.is_err(), "unexpected output: {:?}", read);
    }
}

async fn start(config: ServerConfig) -> (Arc<ChatServer>, SocketAddr) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("chat_hub=debug")
        .with_test_writer()
        .try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(ChatServer::new(config));

    let serving = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = serving.serve(listener, std::future::pending()).await;
    });

    (server, addr)
}

#[tokio::test]
async fn channel_conversation() {
    let (_server, addr) = start(ServerConfig::default()).await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;

    assert_eq!(alice.request(b"REG @alice\r\n").await, "OK\n");
    assert_eq!(alice.request(b"JOIN #general\r\n").await, "OK\n");
    assert_eq!(bob.request(b"REG @bob\r\n").await, "OK\n");
    assert_eq!(bob.request(b"JOIN #general\r\n").await, "OK\n");

    bob.send(b"MSG #general 5\r\nHello").await;

    assert_eq!(alice.line().await, "@bob: Hello\n");
    assert_eq!(bob.line().await, "@bob: Hello\n");
}

#[tokio::test]
async fn username_taken() {
    let (_server, addr) = start(ServerConfig::default()).await;
    let mut first = Client::connect(addr).await;
    let mut second = Client::connect(addr).await;

    assert_eq!(first.request(b"REG @alice\n").await, "OK\n");
    assert_eq!(second.request(b"REG @alice\n").await, "ERR username taken\n");
}

#[tokio::test]
async fn direct_message_with_embedded_newline() {
    let (_server, addr) = start(ServerConfig::default()).await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;

    assert_eq!(alice.request(b"REG @alice\n").await, "OK\n");
    assert_eq!(bob.request(b"REG @bob\n").await, "OK\n");

    alice.send(b"MSG @bob 9\r\nHey!\nBob?").await;

    assert_eq!(bob.line().await, "Hey!\n");
    assert_eq!(bob.line().await, "Bob?\n");
    alice.assert_silent().await;
}

#[tokio::test]
async fn message_split_across_writes() {
    let (_server, addr) = start(ServerConfig::default()).await;
    let mut alice = Client::connect(addr).await;

    assert_eq!(alice.request(b"REG @alice\nJOIN #general\n").await, "OK\n");
    assert_eq!(alice.line().await, "OK\n");

    alice.send(b"MSG #gen").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    alice.send(b"eral 11\r\nhello").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    alice.send(b" world").await;

    assert_eq!(alice.line().await, "@alice: hello world\n");
}

#[tokio::test]
async fn unroutable_commands_are_silent_by_default() {
    let (_server, addr) = start(ServerConfig::default()).await;
    let mut alice = Client::connect(addr).await;

    alice.send(b"JOIN #general\n").await;
    alice.assert_silent().await;

    assert_eq!(alice.request(b"REG @alice\n").await, "OK\n");
    alice.send(b"MSG #general 2\r\nhi").await;
    alice.send(b"MSG @ghost 2\r\nhi").await;
    alice.assert_silent().await;
}

#[tokio::test]
async fn unroutable_commands_with_notify_policy() {
    let hub = HubConfig::default().routing_policy(RoutingPolicy::Notify);
    let (_server, addr) = start(ServerConfig::default().hub(hub)).await;
    let mut alice = Client::connect(addr).await;

    assert_eq!(alice.request(b"JOIN #general\n").await, "ERR not registered\n");
    assert_eq!(alice.request(b"REG @alice\n").await, "OK\n");
    assert_eq!(
        alice.request(b"MSG #general 2\r\nhi").await,
        "ERR no such channel #general\n"
    );
    assert_eq!(
        alice.request(b"MSG @ghost 2\r\nhi").await,
        "ERR no such user @ghost\n"
    );
}

#[tokio::test]
async fn join_announcement() {
    let hub = HubConfig::default().announce_joins(true);
    let (_server, addr) = start(ServerConfig::default().hub(hub)).await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;

    assert_eq!(alice.request(b"REG @alice\nJOIN #general\n").await, "OK\n");
    assert_eq!(alice.line().await, "OK\n");
    assert_eq!(bob.request(b"REG @bob\nJOIN #general\n").await, "OK\n");
    assert_eq!(bob.line().await, "OK\n");

    assert_eq!(alice.line().await, "@bob has joined the channel\n");
    bob.assert_silent().await;
}

#[tokio::test]
async fn disconnect_releases_identity_and_membership() {
    let (server, addr) = start(ServerConfig::default()).await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;

    assert_eq!(alice.request(b"REG @alice\nJOIN #general\n").await, "OK\n");
    assert_eq!(alice.line().await, "OK\n");
    assert_eq!(bob.request(b"REG @bob\nJOIN #general\n").await, "OK\n");
    assert_eq!(bob.line().await, "OK\n");

    drop(alice);

    let mut released = false;
    for _ in 0..100 {
        if server.hub().stats().users == 1 {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(released, "hub still holds the disconnected user");

    // Channel survives and no longer delivers to the departed member
    assert_eq!(bob.request(b"MSG #general 3\r\nbye").await, "@bob: bye\n");
    assert_eq!(server.hub().stats().transport_failures, 0);

    let mut again = Client::connect(addr).await;
    assert_eq!(again.request(b"REG @alice\n").await, "OK\n");
}

#[tokio::test]
async fn malformed_frames_keep_connection_open() {
    let (_server, addr) = start(ServerConfig::default()).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(
        client.request(b"SHOUT hello\n").await,
        "ERR unknown command SHOUT\n"
    );
    assert_eq!(
        client.request(b"JOIN general\n").await,
        "ERR channel name must start with # and must not be empty\n"
    );
    assert_eq!(
        client.request(b"MSG general 2 hi\n").await,
        "ERR recipient must start with # or @\n"
    );
    assert_eq!(client.request(b"REG @alice\n").await, "OK\n");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let config = ServerConfig::default().max_body_length(16);
    let (_server, addr) = start(config).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(
        client.request(b"MSG #general 17\r\n").await,
        "ERR body length 17 exceeds limit of 16\n"
    );
}
