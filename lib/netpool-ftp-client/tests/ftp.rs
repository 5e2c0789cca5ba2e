/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use netpool_codec::block::{BlockDecodeReader, BlockEncodeWriter};
use netpool_ftp_client::{
    FtpClient, FtpClientBuilder, FtpClientConfig, FtpClientError, FtpFileError,
    FtpSessionOpenError, FtpTransferMode,
};
use netpool_resource::ResourcePoolError;
use netpool_types::auth::{
    AuthProtocol, AuthScope, Authenticate, Credentials, MemoryAuthenticator, Password, Username,
};
use netpool_types::net::UpstreamAddr;

const HOME: &str = "/home";

#[derive(Default)]
struct FakeServer {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    /// Any login is accepted if empty.
    users: HashMap<String, String>,
    block_mode: bool,
    deny_store: bool,
    commands: Vec<String>,
}

type Shared = Arc<Mutex<FakeServer>>;

fn parent(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((p, _)) => p,
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn resolve(cwd: &str, arg: &str) -> String {
    let path = if arg.starts_with('/') {
        arg.to_string()
    } else {
        format!("{}/{arg}", cwd.trim_end_matches('/'))
    };
    if path.len() > 1 {
        path.trim_end_matches('/').to_string()
    } else {
        path
    }
}

impl FakeServer {
    fn new() -> Self {
        let mut server = FakeServer::default();
        server.dirs.insert("/".to_string());
        server.dirs.insert(HOME.to_string());
        server
    }

    fn with_dir(mut self, path: &str) -> Self {
        self.dirs.insert(path.to_string());
        self
    }

    fn with_file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.insert(path.to_string(), content.to_vec());
        self
    }

    fn with_user(mut self, user: &str, pass: &str) -> Self {
        self.users.insert(user.to_string(), pass.to_string());
        self
    }

    fn exists(&self, path: &str) -> bool {
        self.dirs.contains(path) || self.files.contains_key(path)
    }

    /// Entries of `dir` as (name, is_dir, size).
    fn children(&self, dir: &str) -> Vec<(String, bool, usize)> {
        let mut entries: Vec<(String, bool, usize)> = self
            .dirs
            .iter()
            .filter(|d| d.as_str() != "/" && parent(d) == dir)
            .map(|d| (basename(d).to_string(), true, 0))
            .collect();
        for (f, content) in &self.files {
            if parent(f) == dir {
                entries.push((basename(f).to_string(), false, content.len()));
            }
        }
        entries
    }
}

async fn spawn_server(server: FakeServer) -> (Shared, UpstreamAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state: Shared = Arc::new(Mutex::new(server));
    let shared = state.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream, shared.clone()));
        }
    });
    (state, UpstreamAddr::from(addr))
}

fn count(state: &Shared, prefix: &str) -> usize {
    state
        .lock()
        .unwrap()
        .commands
        .iter()
        .filter(|c| c.starts_with(prefix))
        .count()
}

fn url(server: &UpstreamAddr, path: &str) -> Url {
    Url::parse(&format!("ftp://{server}/{path}")).unwrap()
}

async fn reply(reader: &mut BufReader<TcpStream>, line: &str) {
    let msg = format!("{line}\r\n");
    reader.get_mut().write_all(msg.as_bytes()).await.unwrap();
}

async fn send_data(listener: TcpListener, block: bool, data: &[u8]) {
    let (stream, _) = listener.accept().await.unwrap();
    if block {
        let mut writer = BlockEncodeWriter::new(stream);
        writer.write_all(data).await.unwrap();
        writer.shutdown().await.unwrap();
    } else {
        let mut stream = stream;
        stream.write_all(data).await.unwrap();
        stream.shutdown().await.unwrap();
    }
}

async fn recv_data(listener: TcpListener, block: bool) -> Vec<u8> {
    let (stream, _) = listener.accept().await.unwrap();
    let mut data = Vec::new();
    if block {
        let mut reader = BlockDecodeReader::new(BufReader::new(stream));
        reader.read_to_end(&mut data).await.unwrap();
    } else {
        let mut stream = stream;
        stream.read_to_end(&mut data).await.unwrap();
    }
    data
}

async fn serve(stream: TcpStream, state: Shared) {
    let mut reader = BufReader::new(stream);
    let mut cwd = HOME.to_string();
    let mut user = String::new();
    let mut block = false;
    let mut pasv: Option<TcpListener> = None;
    let mut rename_from: Option<String> = None;

    reply(&mut reader, "220 fake ftp server ready").await;
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end().to_string();
        let (cmd, arg) = match line.split_once(' ') {
            Some((c, a)) => (c.to_string(), a.to_string()),
            None => (line.clone(), String::new()),
        };
        state.lock().unwrap().commands.push(line.clone());
        let path = resolve(&cwd, &arg);

        let rsp = match cmd.as_str() {
            "USER" => {
                user = arg;
                "331 password please".to_string()
            }
            "PASS" => {
                let s = state.lock().unwrap();
                if s.users.is_empty() || s.users.get(&user) == Some(&arg) {
                    "230 logged in".to_string()
                } else {
                    "530 login incorrect".to_string()
                }
            }
            "MODE" => {
                let supported = state.lock().unwrap().block_mode;
                match arg.as_str() {
                    "B" if supported => {
                        block = true;
                        "200 mode set to B".to_string()
                    }
                    "S" => {
                        block = false;
                        "200 mode set to S".to_string()
                    }
                    _ => "504 unsupported mode".to_string(),
                }
            }
            "TYPE" => "200 type set".to_string(),
            "PWD" => format!("257 \"{cwd}\" is the current directory"),
            "CWD" => {
                if state.lock().unwrap().dirs.contains(&path) {
                    cwd = path;
                    "250 directory changed".to_string()
                } else {
                    "550 no such directory".to_string()
                }
            }
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = listener.local_addr().unwrap().port();
                pasv = Some(listener);
                format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})",
                    port >> 8,
                    port & 0xff
                )
            }
            "NLST" | "LIST" => {
                let listing = {
                    let s = state.lock().unwrap();
                    if s.dirs.contains(&path) {
                        let mut listing = String::new();
                        for (name, is_dir, size) in s.children(&path) {
                            if cmd == "NLST" {
                                listing.push_str(&format!("{name}\r\n"));
                            } else {
                                let perm = if is_dir { "drwxr-xr-x" } else { "-rw-r--r--" };
                                listing.push_str(&format!(
                                    "{perm} 1 ftp ftp {size:>8} Jan 01 00:00 {name}\r\n"
                                ));
                            }
                        }
                        Some(listing)
                    } else if s.files.contains_key(&path) {
                        Some(format!("{}\r\n", basename(&path)))
                    } else {
                        None
                    }
                };
                let Some(listing) = listing else {
                    reply(&mut reader, "550 no such file or directory").await;
                    continue;
                };
                let Some(listener) = pasv.take() else {
                    reply(&mut reader, "425 use PASV first").await;
                    continue;
                };
                reply(&mut reader, "150 here comes the listing").await;
                send_data(listener, block, listing.as_bytes()).await;
                "226 transfer complete".to_string()
            }
            "RETR" => {
                let content = state.lock().unwrap().files.get(&path).cloned();
                let Some(content) = content else {
                    reply(&mut reader, "550 no such file").await;
                    continue;
                };
                let Some(listener) = pasv.take() else {
                    reply(&mut reader, "425 use PASV first").await;
                    continue;
                };
                reply(&mut reader, "150 opening data connection").await;
                send_data(listener, block, &content).await;
                "226 transfer complete".to_string()
            }
            "STOR" => {
                let allowed = {
                    let s = state.lock().unwrap();
                    !s.deny_store && s.dirs.contains(parent(&path))
                };
                if !allowed {
                    reply(&mut reader, "550 permission denied").await;
                    continue;
                }
                let Some(listener) = pasv.take() else {
                    reply(&mut reader, "425 use PASV first").await;
                    continue;
                };
                reply(&mut reader, "150 ok to send data").await;
                let data = recv_data(listener, block).await;
                state.lock().unwrap().files.insert(path, data);
                "226 transfer complete".to_string()
            }
            "SIZE" => {
                let size = state.lock().unwrap().files.get(&path).map(|c| c.len());
                match size {
                    Some(size) => format!("213 {size}"),
                    None => "550 could not get file size".to_string(),
                }
            }
            "DELE" => {
                if state.lock().unwrap().files.remove(&path).is_some() {
                    "250 file deleted".to_string()
                } else {
                    "550 no such file".to_string()
                }
            }
            "MKD" => {
                let mut s = state.lock().unwrap();
                if !s.exists(&path) && s.dirs.contains(parent(&path)) {
                    s.dirs.insert(path.clone());
                    format!("257 \"{path}\" created")
                } else {
                    "550 create directory operation failed".to_string()
                }
            }
            "RMD" => {
                let mut s = state.lock().unwrap();
                if s.dirs.contains(&path) && s.children(&path).is_empty() {
                    s.dirs.remove(&path);
                    "250 directory removed".to_string()
                } else {
                    "550 remove directory operation failed".to_string()
                }
            }
            "RNFR" => {
                if state.lock().unwrap().files.contains_key(&path) {
                    rename_from = Some(path);
                    "350 ready for RNTO".to_string()
                } else {
                    "550 no such file".to_string()
                }
            }
            "RNTO" => match rename_from.take() {
                Some(from) => {
                    let mut s = state.lock().unwrap();
                    if let Some(content) = s.files.remove(&from) {
                        s.files.insert(path, content);
                    }
                    "250 rename successful".to_string()
                }
                None => "503 RNFR required first".to_string(),
            },
            "QUIT" => {
                reply(&mut reader, "221 goodbye").await;
                return;
            }
            _ => "502 command not implemented".to_string(),
        };
        reply(&mut reader, &rsp).await;
    }
}

fn sample_server() -> FakeServer {
    FakeServer::new()
        .with_dir("/home/pub")
        .with_dir("/home/pub/sub")
        .with_file("/home/pub/a.txt", b"hello")
}

#[tokio::test]
async fn list_and_retrieve() {
    let (state, server) = spawn_server(sample_server()).await;
    let client = FtpClient::default();

    let names = client.list(&url(&server, "pub")).await.unwrap();
    assert_eq!(names, vec!["sub".to_string(), "a.txt".to_string()]);

    let mut content = Vec::new();
    let n = client
        .retrieve(&url(&server, "pub/a.txt"), &mut content)
        .await
        .unwrap();
    assert_eq!(n, 5);
    assert_eq!(content, b"hello");

    // the listing told the entry types
    assert!(client.is_directory(&url(&server, "pub/sub")).await.unwrap());
    assert!(!client.is_directory(&url(&server, "pub/a.txt")).await.unwrap());
    assert_eq!(count(&state, "CWD"), 0);

    assert_eq!(count(&state, "USER anonymous"), 1);
    assert_eq!(count(&state, "MODE B"), 1);
    assert_eq!(client.pool().total_count(), 1);
    assert_eq!(client.pool().idle_count(), 1);
}

#[tokio::test]
async fn cached_probes() {
    let (state, server) = spawn_server(sample_server()).await;
    let client = FtpClient::default();

    assert!(client.exists(&url(&server, "pub/a.txt")).await.unwrap());
    assert!(client.exists(&url(&server, "pub/a.txt")).await.unwrap());
    assert_eq!(count(&state, "NLST"), 1);

    assert!(client.is_directory(&url(&server, "pub")).await.unwrap());
    assert!(client.is_directory(&url(&server, "pub")).await.unwrap());
    assert_eq!(count(&state, "CWD /home/pub"), 1);
    assert_eq!(count(&state, "CWD /home"), 2);

    // empty directory
    assert!(client.exists(&url(&server, "pub/sub")).await.unwrap());

    assert!(!client.exists(&url(&server, "pub/none")).await.unwrap());
    assert!(!client.exists(&url(&server, "pub/none")).await.unwrap());
    assert_eq!(count(&state, "NLST /home/pub/none"), 1);

    // the 550 replies to that query dropped everything cached before it
    assert!(client.exists(&url(&server, "pub/a.txt")).await.unwrap());
    assert_eq!(count(&state, "NLST /home/pub/a.txt"), 2);
    assert_eq!(count(&state, "USER"), 1);
}

#[tokio::test]
async fn negative_answer_flushes_cache() {
    let (state, server) = spawn_server(sample_server()).await;
    let client = FtpClient::default();

    assert!(client.exists(&url(&server, "pub/a.txt")).await.unwrap());
    state.lock().unwrap().files.remove("/home/pub/a.txt");

    assert!(!client.is_directory(&url(&server, "pub/none")).await.unwrap());
    assert!(!client.exists(&url(&server, "pub/a.txt")).await.unwrap());
    assert_eq!(count(&state, "NLST /home/pub/a.txt"), 2);

    // the negative answer itself stays cached
    assert!(!client.exists(&url(&server, "pub/a.txt")).await.unwrap());
    assert_eq!(count(&state, "NLST /home/pub/a.txt"), 2);
    assert_eq!(count(&state, "USER"), 1);
    assert_eq!(client.pool().total_count(), 1);
}

#[tokio::test]
async fn reply_550_flushes_cache() {
    let (state, server) = spawn_server(sample_server()).await;
    let client = FtpClient::default();

    assert!(client.exists(&url(&server, "pub/a.txt")).await.unwrap());
    state.lock().unwrap().files.remove("/home/pub/a.txt");
    assert!(client.exists(&url(&server, "pub/a.txt")).await.unwrap());

    assert_eq!(client.size(&url(&server, "pub/b.txt")).await.unwrap(), None);
    assert!(!client.exists(&url(&server, "pub/a.txt")).await.unwrap());
    assert_eq!(count(&state, "NLST /home/pub/a.txt"), 2);

    assert_eq!(count(&state, "USER"), 1);
    assert_eq!(client.pool().total_count(), 1);
}

#[tokio::test]
async fn rejected_store_closes_session() {
    let (state, server) = spawn_server(sample_server()).await;
    let client = FtpClient::default();

    let mut data: &[u8] = b"data";
    let n = client
        .store(&url(&server, "pub/new.txt"), &mut data)
        .await
        .unwrap();
    assert_eq!(n, 4);
    assert_eq!(
        state.lock().unwrap().files.get("/home/pub/new.txt").unwrap(),
        b"data"
    );
    assert_eq!(client.pool().total_count(), 1);

    state.lock().unwrap().deny_store = true;
    let mut data: &[u8] = b"more";
    let r = client.store(&url(&server, "pub/other.txt"), &mut data).await;
    assert!(matches!(
        r,
        Err(FtpClientError::File(FtpFileError::FileUnavailable(_)))
    ));
    assert_eq!(client.pool().total_count(), 0);

    assert!(client.exists(&url(&server, "pub/new.txt")).await.unwrap());
    assert_eq!(count(&state, "USER"), 2);
}

#[tokio::test]
async fn login_retry() {
    let (state, server) = spawn_server(sample_server().with_user("alice", "secret")).await;

    let client = FtpClient::default();
    let target = Url::parse(&format!("ftp://alice:wrong@{server}/pub")).unwrap();
    let r = client.list(&target).await;
    assert!(matches!(
        r,
        Err(FtpClientError::Pool(ResourcePoolError::FactoryFailed(
            FtpSessionOpenError::NotLoggedIn
        )))
    ));
    assert_eq!(client.pool().total_count(), 0);

    let auth = Arc::new(MemoryAuthenticator::default());
    let scope = AuthScope::new(AuthProtocol::Ftp, server.clone());
    auth.store(
        &scope,
        Credentials::new(
            Username::from_original("alice").unwrap(),
            Password::from_original("secret").unwrap(),
        ),
    );
    let client = FtpClientBuilder::new(FtpClientConfig::default())
        .with_authenticator(auth.clone())
        .build();
    let names = client.list(&target).await.unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(count(&state, "PASS"), 3);

    // no replacement credentials left to try
    let target = Url::parse(&format!("ftp://alice:secret2@{server}/pub")).unwrap();
    auth.store(
        &scope,
        Credentials::new(
            Username::from_original("alice").unwrap(),
            Password::from_original("secret2").unwrap(),
        ),
    );
    assert!(client.list(&target).await.is_err());
    assert!(auth.lookup(&scope).is_none());
}

#[tokio::test]
async fn block_mode_transfer() {
    let content: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    let mut server = sample_server().with_file("/home/pub/large.bin", &content);
    server.block_mode = true;
    let (state, server) = spawn_server(server).await;
    let client = FtpClient::default();

    let mut received = Vec::new();
    let n = client
        .retrieve(&url(&server, "pub/large.bin"), &mut received)
        .await
        .unwrap();
    assert_eq!(n, content.len() as u64);
    assert_eq!(received, content);

    let mut data = content.as_slice();
    client
        .store(&url(&server, "pub/copy.bin"), &mut data)
        .await
        .unwrap();
    assert_eq!(
        state.lock().unwrap().files.get("/home/pub/copy.bin"),
        Some(&content)
    );

    let names = client.list(&url(&server, "pub")).await.unwrap();
    assert_eq!(names.len(), 4);

    let (key, _) = client.target(&url(&server, "pub")).unwrap();
    let session = client.session(&key).await.unwrap();
    assert_eq!(session.transfer_mode(), FtpTransferMode::Block);
    assert_eq!(count(&state, "USER"), 1);
}

#[tokio::test]
async fn path_operations() {
    let (state, server) = spawn_server(sample_server()).await;
    let client = FtpClient::default();

    client.make_dir(&url(&server, "pub/new")).await.unwrap();
    assert!(client.is_directory(&url(&server, "pub/new")).await.unwrap());
    assert_eq!(count(&state, "CWD"), 0);

    client
        .rename(&url(&server, "pub/a.txt"), "pub/b.txt")
        .await
        .unwrap();
    assert_eq!(count(&state, "RNTO /home/pub/b.txt"), 1);
    assert_eq!(
        client.size(&url(&server, "pub/b.txt")).await.unwrap(),
        Some(5)
    );

    client.delete(&url(&server, "pub/b.txt")).await.unwrap();
    assert!(!client.exists(&url(&server, "pub/b.txt")).await.unwrap());
    assert_eq!(count(&state, "NLST"), 0);

    client.remove_dir(&url(&server, "pub/new")).await.unwrap();
    assert!(!state.lock().unwrap().dirs.contains("/home/pub/new"));

    let r = client.delete(&url(&server, "pub/none")).await;
    assert!(matches!(
        r,
        Err(FtpClientError::File(FtpFileError::FileUnavailable(_)))
    ));
    assert_eq!(client.pool().total_count(), 1);
    assert_eq!(count(&state, "USER"), 1);
}

#[tokio::test]
async fn absolute_path() {
    let (state, server) = spawn_server(sample_server()).await;
    let client = FtpClient::default();

    let mut content = Vec::new();
    client
        .retrieve(&url(&server, "%2Fhome/pub/a.txt"), &mut content)
        .await
        .unwrap();
    assert_eq!(content, b"hello");
    assert_eq!(count(&state, "RETR /home/pub/a.txt"), 1);

    let r = client
        .retrieve(&url(&server, "%2Fpub/a.txt"), &mut Vec::<u8>::new())
        .await;
    assert!(matches!(
        r,
        Err(FtpClientError::File(FtpFileError::FileUnavailable(_)))
    ));
}
