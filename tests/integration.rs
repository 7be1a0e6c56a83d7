//! End-to-end tests driving a server instance over real sockets.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use ferroftpd::config::Config;
use ferroftpd::core_log::xferlog::Xferlog;
use ferroftpd::core_network::{network, ServerCtx};
use ferroftpd::core_timeout::timeout::TimeoutScheduler;
use ferroftpd::session::null_broker;

fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.server.ftp_root = root.to_string_lossy().into_owned();
    config
}

async fn spawn_server(config: Config) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx = ServerCtx {
        config: Arc::new(config),
        scheduler: TimeoutScheduler::new(),
        broker: null_broker(),
        xferlog: Arc::new(Xferlog::open("").await),
    };
    let shutdown = Arc::new(Notify::new());
    tokio::spawn(network::start_server(ctx, listener, shutdown));
    addr
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Client {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .unwrap();
    }

    async fn line(&mut self) -> Option<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await.unwrap();
        if n == 0 {
            return None;
        }
        Some(line.trim_end().to_string())
    }

    /// Read up to and including the final reply line for `code`, skipping
    /// `code-` continuation lines. Returns the final line.
    async fn expect(&mut self, code: &str) -> String {
        let cont = format!("{}-", code);
        loop {
            let line = self.line().await.unwrap_or_else(|| {
                panic!("connection closed while waiting for {}", code)
            });
            if line.starts_with(&cont) {
                continue;
            }
            assert!(
                line.starts_with(code),
                "expected {} reply, got {:?}",
                code,
                line
            );
            return line;
        }
    }

    async fn cmd(&mut self, line: &str, code: &str) -> String {
        self.send(line).await;
        self.expect(code).await
    }
}

async fn login(client: &mut Client) {
    client.expect("220").await;
    client.cmd("USER anonymous", "331").await;
    client.cmd("PASS test@example.org", "230").await;
}

fn parse_pasv(line: &str) -> SocketAddr {
    let open = line.find('(').unwrap();
    let close = line.rfind(')').unwrap();
    let fields: Vec<u16> = line[open + 1..close]
        .split(',')
        .map(|f| f.parse().unwrap())
        .collect();
    assert_eq!(fields.len(), 6);
    let ip = format!("{}.{}.{}.{}", fields[0], fields[1], fields[2], fields[3]);
    let port = fields[4] << 8 | fields[5];
    format!("{}:{}", ip, port).parse().unwrap()
}

fn parse_epsv(line: &str) -> u16 {
    let open = line.find("(|||").unwrap();
    let close = line.rfind("|)").unwrap();
    line[open + 4..close].parse().unwrap()
}

#[tokio::test]
async fn login_and_session_basics() {
    let root = tempfile::tempdir().unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;

    let greeting = client.expect("220").await;
    assert!(greeting.contains("FTP server"), "greeting: {:?}", greeting);
    client.cmd("USER anonymous", "331").await;
    client.cmd("PASS test@example.org", "230").await;
    client.cmd("SYST", "215").await;
    let pwd = client.cmd("PWD", "257").await;
    assert!(pwd.contains("\"/\""), "pwd: {:?}", pwd);
    client.cmd("TYPE I", "200").await;
    client.cmd("TYPE A", "200").await;
    client.cmd("STRU F", "200").await;
    client.cmd("MODE S", "200").await;
    client.cmd("STRU R", "504").await;
    client.cmd("NOOP", "200").await;
    client.cmd("QUIT", "221").await;
    assert!(client.line().await.is_none());
}

#[tokio::test]
async fn commands_refused_before_login() {
    let root = tempfile::tempdir().unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    client.cmd("RETR file.txt", "530").await;
    client.cmd("CWD /", "530").await;
    client.cmd("SYST", "530").await;
    let reply = client.cmd("USER someone", "530").await;
    assert_eq!(reply, "530 Login incorrect.");
    client.cmd("PASS whatever", "530").await;
    client.cmd("RETR file.txt", "530").await;
}

#[tokio::test]
async fn repeated_real_account_logins_trip_the_error_cap() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.server.max_errors = 2;
    let addr = spawn_server(config).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    client.cmd("USER root", "530").await;
    client.cmd("USER root", "530").await;
    client.cmd("USER root", "530").await;
    let last = client.expect("500").await;
    assert_eq!(last, "500 Too many errors");
    assert!(client.line().await.is_none());
}

#[tokio::test]
async fn cwd_clamps_at_root() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("pub")).unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    client.cmd("CWD pub", "250").await;
    let pwd = client.cmd("PWD", "257").await;
    assert!(pwd.contains("\"/pub\""), "pwd: {:?}", pwd);
    client.cmd("CWD ../../../..", "250").await;
    let pwd = client.cmd("PWD", "257").await;
    assert!(pwd.contains("\"/\""), "pwd: {:?}", pwd);
    client.cmd("CDUP", "250").await;
    let pwd = client.cmd("PWD", "257").await;
    assert!(pwd.contains("\"/\""), "pwd: {:?}", pwd);
    client.cmd("CWD missing", "550").await;
}

#[tokio::test]
async fn passive_binary_retrieval() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("hello.bin"), b"hello\nworld\n").unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    client.cmd("TYPE I", "200").await;
    let pasv = client.cmd("PASV", "227").await;
    let data_addr = parse_pasv(&pasv);
    let mut data = TcpStream::connect(data_addr).await.unwrap();

    client.cmd("RETR hello.bin", "150").await;
    let mut body = Vec::new();
    data.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"hello\nworld\n");
    client.expect("226").await;
}

#[tokio::test]
async fn passive_ascii_retrieval_expands_line_endings() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("hello.txt"), b"a\nb\n").unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    client.cmd("TYPE A", "200").await;
    let pasv = client.cmd("PASV", "227").await;
    let mut data = TcpStream::connect(parse_pasv(&pasv)).await.unwrap();

    client.cmd("RETR hello.txt", "150").await;
    let mut body = Vec::new();
    data.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"a\r\nb\r\n");
    client.expect("226").await;
}

#[tokio::test]
async fn epsv_retrieval() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("f"), b"data").unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    client.cmd("TYPE I", "200").await;
    let epsv = client.cmd("EPSV", "229").await;
    let port = parse_epsv(&epsv);
    let mut data = TcpStream::connect((addr.ip(), port)).await.unwrap();

    client.cmd("RETR f", "150").await;
    let mut body = Vec::new();
    data.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"data");
    client.expect("226").await;
}

#[tokio::test]
async fn active_retrieval_connects_back() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("f"), b"active").unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = data_listener.local_addr().unwrap().port();
    client.cmd("TYPE I", "200").await;
    client
        .cmd(&format!("PORT 127,0,0,1,{},{}", port >> 8, port & 0xff), "200")
        .await;

    client.cmd("RETR f", "150").await;
    let (mut data, _) = data_listener.accept().await.unwrap();
    let mut body = Vec::new();
    data.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"active");
    client.expect("226").await;
}

#[tokio::test]
async fn second_transfer_while_live_is_refused_without_side_effects() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("f"), b"payload").unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    client.cmd("TYPE I", "200").await;
    let pasv = client.cmd("PASV", "227").await;
    let data_addr = parse_pasv(&pasv);

    // No data connection yet, so the first transfer sits awaiting its peer.
    client.cmd("RETR f", "150").await;
    let refused = client.cmd("RETR f", "425").await;
    assert_eq!(refused, "425 Can not build data connection.");

    // The first transfer is untouched and still completes.
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    let mut body = Vec::new();
    data.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"payload");
    client.expect("226").await;
}

#[tokio::test]
async fn idle_session_gets_421_and_is_closed() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.server.idle_timeout_secs = 1;
    let addr = spawn_server(config).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    let notice = client.expect("421").await;
    assert_eq!(
        notice,
        "421 Service not available, closing control connection."
    );
    assert!(client.line().await.is_none());
}

#[tokio::test]
async fn port_to_foreign_host_refused() {
    let root = tempfile::tempdir().unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    let reply = client.cmd("PORT 1,2,3,4,7,208", "504").await;
    assert!(reply.contains("security"), "reply: {:?}", reply);
    // Port zero is just as unacceptable.
    client.cmd("PORT 127,0,0,1,0,0", "504").await;
    client.cmd("PORT nonsense", "501").await;
}

#[tokio::test]
async fn stor_refused_when_read_only() {
    let root = tempfile::tempdir().unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    client.cmd("STOR up.bin", "502").await;
    client.cmd("APPE up.bin", "502").await;
    client.cmd("DELE f", "502").await;
    client.cmd("MKD d", "502").await;
}

#[tokio::test]
async fn stor_roundtrip_in_read_write_mode() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.server.read_write = true;
    let addr = spawn_server(config).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    client.cmd("TYPE I", "200").await;
    let pasv = client.cmd("PASV", "227").await;
    let mut data = TcpStream::connect(parse_pasv(&pasv)).await.unwrap();

    client.cmd("STOR up.bin", "150").await;
    data.write_all(b"uploaded bytes").await.unwrap();
    drop(data);
    client.expect("226").await;

    let stored = std::fs::read(root.path().join("up.bin")).unwrap();
    assert_eq!(stored, b"uploaded bytes");
}

#[tokio::test]
async fn rest_resumes_binary_retrieval() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("f"), b"0123456789").unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    client.cmd("TYPE I", "200").await;
    client.cmd("REST 6", "350").await;
    let pasv = client.cmd("PASV", "227").await;
    let mut data = TcpStream::connect(parse_pasv(&pasv)).await.unwrap();

    client.cmd("RETR f", "150").await;
    let mut body = Vec::new();
    data.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"6789");
    client.expect("226").await;

    client.cmd("REST notanumber", "501").await;
}

#[tokio::test]
async fn size_and_mdtm() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("f.txt"), b"one\ntwo\n").unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    client.cmd("TYPE I", "200").await;
    let size = client.cmd("SIZE f.txt", "213").await;
    assert_eq!(size, "213 8");
    // In ASCII type every LF counts for two.
    client.cmd("TYPE A", "200").await;
    let size = client.cmd("SIZE f.txt", "213").await;
    assert_eq!(size, "213 10");

    let mdtm = client.cmd("MDTM f.txt", "213").await;
    let stamp = mdtm.trim_start_matches("213 ");
    assert_eq!(stamp.len(), 14, "mdtm: {:?}", mdtm);
    assert!(stamp.chars().all(|c| c.is_ascii_digit()));

    client.cmd("SIZE missing", "550").await;
}

#[tokio::test]
async fn nlst_lists_file_names() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("a.txt"), b"a").unwrap();
    std::fs::write(root.path().join("b.txt"), b"b").unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    let pasv = client.cmd("PASV", "227").await;
    let mut data = TcpStream::connect(parse_pasv(&pasv)).await.unwrap();

    client.cmd("NLST", "150").await;
    let mut body = String::new();
    data.read_to_string(&mut body).await.unwrap();
    let mut names: Vec<&str> = body.lines().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    client.expect("226").await;
}

#[tokio::test]
async fn mkd_rename_delete_cycle() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.server.read_write = true;
    let addr = spawn_server(config).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    let reply = client.cmd("MKD stash", "257").await;
    assert!(reply.contains("\"/stash\""), "reply: {:?}", reply);
    assert!(root.path().join("stash").is_dir());

    let pasv = client.cmd("PASV", "227").await;
    let mut data = TcpStream::connect(parse_pasv(&pasv)).await.unwrap();
    client.cmd("STOR stash/one.txt", "150").await;
    data.write_all(b"x").await.unwrap();
    drop(data);
    client.expect("226").await;

    client.cmd("RNFR stash/one.txt", "350").await;
    client.cmd("RNTO stash/two.txt", "250").await;
    assert!(root.path().join("stash/two.txt").is_file());
    // RNTO without a pending RNFR is out of order.
    client.cmd("RNTO stash/three.txt", "503").await;

    client.cmd("DELE stash/two.txt", "250").await;
    client.cmd("RMD stash", "250").await;
    assert!(!root.path().join("stash").exists());
}

#[tokio::test]
async fn help_and_stat() {
    let root = tempfile::tempdir().unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    let help = client.cmd("HELP", "214").await;
    assert!(help.contains("comments"), "help: {:?}", help);
    client.cmd("STAT", "211").await;
    client.cmd("SITE HELP", "214").await;
    let umask = client.cmd("SITE UMASK", "200").await;
    assert!(umask.contains("022"), "umask: {:?}", umask);
}

#[tokio::test]
async fn stat_of_a_file_lists_that_entry_inline() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("notes.txt"), b"n").unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    client.send("STAT notes.txt").await;
    let mut body = Vec::new();
    loop {
        let line = client.line().await.unwrap();
        if line.starts_with("213 ") {
            assert_eq!(line, "213 End of status.");
            break;
        }
        body.push(line);
    }
    assert!(
        body.iter().any(|l| l.contains("notes.txt") && l.starts_with('-')),
        "status body: {:?}",
        body
    );
}

#[tokio::test]
async fn too_many_errors_closes_session() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.server.max_errors = 2;
    let addr = spawn_server(config).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    client.cmd("BLAH", "500").await;
    client.cmd("BLAH", "500").await;
    client.cmd("BLAH", "500").await;
    let last = client.expect("500").await;
    assert_eq!(last, "500 Too many errors");
    assert!(client.line().await.is_none());
}

#[tokio::test]
async fn unknown_and_aliased_verbs() {
    let root = tempfile::tempdir().unwrap();
    let addr = spawn_server(test_config(root.path())).await;
    let mut client = Client::connect(addr).await;
    login(&mut client).await;

    let reply = client.cmd("FROB", "500").await;
    assert_eq!(reply, "500 Command not understood");
    let pwd = client.cmd("XPWD", "257").await;
    assert!(pwd.contains("\"/\""), "pwd: {:?}", pwd);
    client.cmd("XCUP", "250").await;
}
