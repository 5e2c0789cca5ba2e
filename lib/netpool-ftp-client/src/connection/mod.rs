/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::poll_fn;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

use netpool_io_ext::TimeoutStream;
use netpool_resource::ResourceAdapter;
use netpool_types::net::UpstreamAddr;

use crate::FtpClientConfig;
use crate::cache::{FtpPathCache, canonical_path, parent_path};
use crate::control::{FtpCommand, FtpControlChannel, FtpTransferStart};
use crate::error::{FtpCommandError, FtpFileError, FtpTransferError};
use crate::transfer::{
    FtpDataReader, FtpDataStream, FtpDataWriter, FtpLineDataReceiver, FtpLineDataTransfer,
    FtpTransferMode,
};

mod factory;
pub use factory::{FtpConnectionFactory, FtpPoolKey};

mod list;
use list::{DirectoryList, NameList};

/// Reply codes after which the session state is unknown.
const MUST_CLOSE_REPLY_CODES: [u16; 9] = [332, 421, 425, 426, 500, 501, 503, 530, 532];

const COPY_BUFFER_SIZE: usize = 16 * 1024;

fn rejected_error(code: u16, path: &str) -> FtpFileError {
    match code {
        452 | 552 => FtpFileError::InsufficientStorageSpace,
        553 => FtpFileError::FileNameNotAllowed(path.to_string()),
        _ => FtpFileError::FileUnavailable(path.to_string()),
    }
}

/// One logged in FTP session.
///
/// Paths given to the operations are resolved against the login directory.
pub struct FtpConnection {
    control: FtpControlChannel<FtpDataStream>,
    config: Arc<FtpClientConfig>,
    server: UpstreamAddr,
    server_ip: IpAddr,
    mode: FtpTransferMode,
    home: String,
    cache: FtpPathCache,
    must_close: bool,
    data_opened: bool,
    operations: usize,
}

impl FtpConnection {
    pub(crate) fn new(
        control: FtpControlChannel<FtpDataStream>,
        server: UpstreamAddr,
        server_ip: IpAddr,
        mode: FtpTransferMode,
        home: String,
        config: Arc<FtpClientConfig>,
    ) -> Self {
        FtpConnection {
            control,
            cache: FtpPathCache::new(config.cache_size),
            config,
            server,
            server_ip,
            mode,
            home,
            must_close: false,
            data_opened: false,
            operations: 0,
        }
    }

    #[inline]
    pub fn server(&self) -> &UpstreamAddr {
        &self.server
    }

    /// The working directory right after login.
    #[inline]
    pub fn home(&self) -> &str {
        &self.home
    }

    #[inline]
    pub fn transfer_mode(&self) -> FtpTransferMode {
        self.mode
    }

    pub fn set_must_close(&mut self) {
        self.must_close = true;
    }

    /// Log out. The session will not go back to the pool.
    pub async fn quit(&mut self) -> Result<(), FtpCommandError> {
        self.must_close = true;
        self.control.send_quit().await
    }

    fn canonical(&self, path: &str) -> String {
        canonical_path(&self.home, path)
    }

    fn start_operation(&mut self) {
        self.operations += 1;
        self.data_opened = false;
        let _ = self.control.take_replies();
    }

    /// Check every reply the operation got. A 550 means the cached view of
    /// the filesystem can no longer be trusted.
    fn finish_operation<T>(&mut self, r: Result<T, FtpFileError>) -> Result<T, FtpFileError> {
        for code in self.control.take_replies() {
            if MUST_CLOSE_REPLY_CODES.contains(&code) {
                if !self.must_close {
                    log::debug!("ftp session to {} must close after reply {code}", self.server);
                }
                self.must_close = true;
            } else if code == 550 {
                self.cache.clear();
            }
        }
        if let Err(e) = &r {
            if self.data_opened || e.is_connection_broken() {
                self.must_close = true;
            }
        }
        r
    }

    async fn open_data_channel(&mut self) -> Result<FtpDataStream, FtpFileError> {
        let mut addr = self.control.request_pasv_port().await?;
        if addr.ip().is_unspecified() {
            addr = SocketAddr::new(self.server_ip, addr.port());
        }

        let tcp = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| FtpTransferError::ConnectTimedOut(addr))?
            .map_err(|e| FtpTransferError::ConnectFailed(addr, e))?;
        self.data_opened = true;
        Ok(TimeoutStream::new(tcp, self.config.socket_timeout))
    }

    /// Run a line based listing command.
    ///
    /// Return false if the server reported the path as unavailable.
    async fn line_transfer<R: FtpLineDataReceiver>(
        &mut self,
        cmd: FtpCommand,
        path: &str,
        receiver: &mut R,
    ) -> Result<bool, FtpFileError> {
        let data = self.open_data_channel().await?;
        match self.control.start_transfer(cmd, Some(path)).await? {
            FtpTransferStart::Proceed => {}
            FtpTransferStart::Finished => return Ok(true),
            FtpTransferStart::Rejected(_) => return Ok(false),
        }

        let reader = FtpDataReader::new(data, self.mode);
        FtpLineDataTransfer::new(reader, &self.config.transfer)
            .read_to_end(receiver)
            .await
            .map_err(FtpTransferError::from)?;
        self.control
            .wait_transfer_end(self.config.transfer.end_wait_timeout)
            .await?;
        Ok(true)
    }

    async fn probe_dir(&mut self, path: &str) -> Result<bool, FtpFileError> {
        if !self.control.change_dir(path).await? {
            return Ok(false);
        }
        let home = self.home.clone();
        if !self.control.change_dir(&home).await? {
            log::debug!("unable to change back to home directory {home}");
            self.must_close = true;
        }
        Ok(true)
    }

    async fn probe_exists(&mut self, path: &str) -> Result<bool, FtpFileError> {
        let mut names = NameList::default();
        let listed = self.line_transfer(FtpCommand::NLST, path, &mut names).await?;
        if listed && !names.is_empty() {
            return Ok(true);
        }
        // some servers refuse to list an empty directory
        self.probe_dir(path).await
    }

    /// Names of the entries in directory `path`.
    pub async fn list(&mut self, path: &str) -> Result<Vec<String>, FtpFileError> {
        self.start_operation();
        let dir = self.canonical(path);
        let r = self.do_list(&dir).await;
        self.finish_operation(r)
    }

    async fn do_list(&mut self, dir: &str) -> Result<Vec<String>, FtpFileError> {
        let mut entries = DirectoryList::default();
        match self.line_transfer(FtpCommand::LIST, dir, &mut entries).await {
            Ok(_) => {}
            Err(e @ FtpFileError::TransferFailed(_)) => return Err(e),
            Err(e) if e.is_connection_broken() => return Err(e),
            Err(e) => log::debug!("ignore failed LIST of {dir}: {e}"),
        }

        let mut names = NameList::default();
        if !self.line_transfer(FtpCommand::NLST, dir, &mut names).await? {
            return Err(FtpFileError::FileUnavailable(dir.to_string()));
        }
        let names = names.into_names();

        self.cache.set_is_dir(dir, true);
        let listed: HashSet<&str> = names.iter().map(|s| s.as_str()).collect();
        for (name, is_dir) in entries.iter() {
            if listed.contains(name) {
                self.cache.set_is_dir(&canonical_path(dir, name), is_dir);
            }
        }
        for name in &names {
            self.cache.set_exists(&canonical_path(dir, name), true);
        }
        Ok(names)
    }

    pub async fn exists(&mut self, path: &str) -> Result<bool, FtpFileError> {
        let path = self.canonical(path);
        if let Some(exists) = self.cache.exists(&path) {
            return Ok(exists);
        }

        self.start_operation();
        let r = self.probe_exists(&path).await;
        let r = self.finish_operation(r);
        if let Ok(exists) = r {
            self.cache.set_exists(&path, exists);
        }
        r
    }

    pub async fn is_directory(&mut self, path: &str) -> Result<bool, FtpFileError> {
        let path = self.canonical(path);
        if let Some(is_dir) = self.cache.is_dir(&path) {
            return Ok(is_dir);
        }

        self.start_operation();
        let r = self.probe_dir(&path).await;
        let r = self.finish_operation(r);
        if let Ok(is_dir) = r {
            self.cache.set_is_dir(&path, is_dir);
        }
        r
    }

    /// Copy the remote file `path` into `writer`, returning the size.
    pub async fn retrieve<W>(&mut self, path: &str, writer: &mut W) -> Result<u64, FtpFileError>
    where
        W: AsyncWrite + Unpin,
    {
        self.start_operation();
        let path = self.canonical(path);
        let r = self.do_retrieve(&path, writer).await;
        let r = self.finish_operation(r);
        if r.is_ok() {
            self.cache.set_exists(&path, true);
        }
        r
    }

    async fn do_retrieve<W>(&mut self, path: &str, writer: &mut W) -> Result<u64, FtpFileError>
    where
        W: AsyncWrite + Unpin,
    {
        let data = self.open_data_channel().await?;
        match self.control.start_transfer(FtpCommand::RETR, Some(path)).await? {
            FtpTransferStart::Proceed => {}
            FtpTransferStart::Finished => return Ok(0),
            FtpTransferStart::Rejected(code) => return Err(rejected_error(code, path)),
        }

        let mut reader = FtpDataReader::new(data, self.mode);
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(FtpTransferError::ReadFailed)?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .await
                .map_err(FtpFileError::LocalIoFailed)?;
            total += n as u64;
        }
        drop(reader);

        self.control
            .wait_transfer_end(self.config.transfer.end_wait_timeout)
            .await?;
        writer.flush().await.map_err(FtpFileError::LocalIoFailed)?;
        Ok(total)
    }

    /// Upload everything from `reader` to the remote file `path`, returning
    /// the size.
    pub async fn store<R>(&mut self, path: &str, reader: &mut R) -> Result<u64, FtpFileError>
    where
        R: AsyncRead + Unpin,
    {
        self.start_operation();
        let path = self.canonical(path);
        let r = self.do_store(&path, reader).await;
        let r = self.finish_operation(r);
        if r.is_ok() {
            self.cache.set_is_dir(&path, false);
            self.cache.set_exists(&path, true);
            self.cache.set_is_dir(parent_path(&path), true);
        }
        r
    }

    async fn do_store<R>(&mut self, path: &str, reader: &mut R) -> Result<u64, FtpFileError>
    where
        R: AsyncRead + Unpin,
    {
        let data = self.open_data_channel().await?;
        match self.control.start_transfer(FtpCommand::STOR, Some(path)).await? {
            FtpTransferStart::Proceed => {}
            FtpTransferStart::Finished => return Ok(0),
            FtpTransferStart::Rejected(code) => return Err(rejected_error(code, path)),
        }

        let mut writer = FtpDataWriter::new(data, self.mode);
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(FtpFileError::LocalIoFailed)?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .await
                .map_err(FtpTransferError::WriteFailed)?;
            total += n as u64;
        }
        writer
            .shutdown()
            .await
            .map_err(FtpTransferError::WriteFailed)?;
        drop(writer);

        self.control
            .wait_transfer_end(self.config.transfer.end_wait_timeout)
            .await?;
        Ok(total)
    }

    async fn path_operation(&mut self, cmd: FtpCommand, path: &str) -> Result<(), FtpFileError> {
        let r = match self.control.path_command(cmd, path).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(FtpFileError::FileUnavailable(path.to_string())),
            Err(e) => Err(e.into()),
        };
        self.finish_operation(r)
    }

    pub async fn delete(&mut self, path: &str) -> Result<(), FtpFileError> {
        self.start_operation();
        let path = self.canonical(path);
        self.path_operation(FtpCommand::DELE, &path).await?;
        self.cache.set_exists(&path, false);
        Ok(())
    }

    pub async fn remove_dir(&mut self, path: &str) -> Result<(), FtpFileError> {
        self.start_operation();
        let path = self.canonical(path);
        self.path_operation(FtpCommand::RMD, &path).await?;
        self.cache.remove_tree(&path);
        self.cache.set_exists(&path, false);
        Ok(())
    }

    pub async fn make_dir(&mut self, path: &str) -> Result<(), FtpFileError> {
        self.start_operation();
        let path = self.canonical(path);
        self.path_operation(FtpCommand::MKD, &path).await?;
        self.cache.set_is_dir(&path, true);
        Ok(())
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> Result<(), FtpFileError> {
        self.start_operation();
        let from = self.canonical(from);
        let to = self.canonical(to);
        let r = match self.control.rename(&from, &to).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(FtpFileError::FileUnavailable(from.clone())),
            Err(e) => Err(e.into()),
        };
        self.finish_operation(r)?;
        self.cache.remove_tree(&from);
        self.cache.remove_tree(&to);
        self.cache.set_exists(&from, false);
        self.cache.set_exists(&to, true);
        Ok(())
    }

    /// Return `None` if the server has no size for `path`.
    pub async fn size(&mut self, path: &str) -> Result<Option<u64>, FtpFileError> {
        self.start_operation();
        let path = self.canonical(path);
        let r = self
            .control
            .request_size(&path)
            .await
            .map_err(FtpFileError::from);
        let r = self.finish_operation(r);
        if let Ok(Some(_)) = r {
            self.cache.set_exists(&path, true);
        }
        r
    }
}

impl ResourceAdapter for FtpConnection {
    fn is_alive(&mut self) -> bool {
        let stream = self.control.stream_mut();
        if self.must_close || !stream.buffer().is_empty() {
            return false;
        }
        // an idle session must have nothing to read, like a 421 timeout notice
        let inner = stream.get_mut();
        let mut probe = [0u8; 1];
        let mut buf = ReadBuf::new(&mut probe);
        poll_fn(|cx| Pin::new(&mut *inner).poll_read(cx, &mut buf))
            .now_or_never()
            .is_none()
    }

    fn must_close(&self) -> bool {
        self.must_close
    }

    fn close(&mut self) {
        log::debug!(
            "close ftp session to {} after {} operations, {} cached paths",
            self.server,
            self.operations,
            self.cache.len()
        );
    }
}
