extern crate imap_wire;

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use imap_wire::{
    ClientBuilder, Config, ConnectionMode, ConnectionState, Connector, Credentials, Store,
    Transport,
};

type Session = Vec<(&'static str, &'static str)>;

/// Accept one client per entry of `sessions` on a loopback port. Each client is sent `greeting`,
/// then every command is answered with the reply scripted for its verb, with `{tag}` replaced by
/// the command's tag. The server hangs up after any reply that carries a `BYE`.
fn serve(greeting: &'static str, sessions: Vec<Session>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for replies in sessions {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            writer.write_all(greeting.as_bytes()).unwrap();
            for line in BufReader::new(stream).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => break,
                };
                let mut parts = line.splitn(3, ' ');
                let tag = parts.next().unwrap_or_default().to_string();
                let verb = parts.next().unwrap_or_default().to_ascii_uppercase();
                let reply = replies
                    .iter()
                    .find(|(v, _)| *v == verb)
                    .map(|(_, r)| r.replace("{tag}", &tag))
                    .unwrap_or_else(|| format!("{} BAD unknown command\r\n", tag));
                if writer.write_all(reply.as_bytes()).is_err() || reply.contains("* BYE") {
                    break;
                }
            }
        }
    });
    port
}

fn serve_once(greeting: &'static str, replies: Session) -> u16 {
    serve(greeting, vec![replies])
}

fn login_store(port: u16) -> Store<ClientBuilder<String>> {
    let builder = ClientBuilder::new("127.0.0.1".to_string(), port).mode(ConnectionMode::Plaintext);
    let credentials = Credentials::Login {
        username: "user".into(),
        password: "pass".into(),
    };
    let config = Config::default().read_timeout(Duration::from_secs(5));
    Store::new(builder, credentials, config)
}

#[test]
fn plaintext_session() {
    let port = serve_once(
        "* OK [CAPABILITY IMAP4rev1] test server ready\r\n",
        vec![
            ("LOGIN", "{tag} OK Logged in\r\n"),
            ("LOGOUT", "* BYE Logging out\r\n{tag} OK Logout completed\r\n"),
        ],
    );
    let mut connection = ClientBuilder::new("127.0.0.1", port)
        .mode(ConnectionMode::Plaintext)
        .connect(Config::default().spool())
        .unwrap();
    assert_eq!(connection.state(), ConnectionState::Connected);
    assert!(connection.capabilities().unwrap().has("IMAP4rev1"));

    connection.login("user", "pass").unwrap();
    assert!(connection.is_alive());
    assert!(connection.get_ref().is_open());

    connection.logout().unwrap();
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[test]
fn unknown_command_is_data() {
    let port = serve_once("* PREAUTH ready\r\n", vec![]);
    let mut connection = ClientBuilder::new("127.0.0.1", port)
        .mode(ConnectionMode::Plaintext)
        .connect(Config::default().spool())
        .unwrap();
    assert_eq!(connection.state(), ConnectionState::Authenticated);
    let responses = connection.execute_command("XYZZY").unwrap();
    assert!(responses.completion().unwrap().is_bad());
    assert!(connection.is_alive());
}

#[test]
fn store_over_plaintext() {
    let port = serve_once(
        "* OK test server ready\r\n",
        vec![
            ("LOGIN", "{tag} OK [CAPABILITY IMAP4rev1] Logged in\r\n"),
            (
                "LIST",
                "* LIST (\\HasNoChildren) \"/\" INBOX\r\n\
                 * LIST (\\HasChildren) \"/\" Drafts\r\n\
                 * LIST (\\HasNoChildren) \"/\" Drafts/Old\r\n\
                 {tag} OK LIST completed\r\n",
            ),
        ],
    );
    let store = login_store(port);

    let folders = store.update_folders().unwrap();
    let ids: Vec<&str> = folders.iter().map(|f| f.server_id.as_str()).collect();
    assert_eq!(ids, ["INBOX", "Drafts", "Drafts/Old"]);
    assert_eq!(folders[2].parent_server_id.as_deref(), Some("Drafts"));
    assert_eq!(store.idle_connections(), 1);
    assert_eq!(store.close_all(), 1);
}

#[test]
fn pooled_connection_closed_by_server_is_replaced() {
    let login = ("LOGIN", "{tag} OK [CAPABILITY IMAP4rev1] Logged in\r\n");
    let port = serve(
        "* OK test server ready\r\n",
        vec![
            vec![
                login,
                (
                    "NOOP",
                    "{tag} OK NOOP completed\r\n* BYE Autologout; idle for too long\r\n",
                ),
            ],
            vec![login, ("NOOP", "{tag} OK NOOP completed\r\n")],
        ],
    );
    let store = login_store(port);

    store.execute_command("NOOP").unwrap().release();
    assert_eq!(store.idle_connections(), 1);

    let mut responses = store.execute_command("NOOP").unwrap();
    assert!(responses.completion().unwrap().is_ok());
    responses.release();
    assert_eq!(store.idle_connections(), 1);
    assert_eq!(store.close_all(), 1);
}
