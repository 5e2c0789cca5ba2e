/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;

use netpool_io_ext::TimeoutStream;
use netpool_resource::ResourceFactory;
use netpool_types::auth::{AuthProtocol, AuthScope, Authenticate, Credentials};
use netpool_types::net::UpstreamAddr;

use super::FtpConnection;
use crate::FtpClientConfig;
use crate::control::{FtpAuthStatus, FtpControlChannel};
use crate::error::{FtpCommandError, FtpConnectError, FtpSessionOpenError};
use crate::transfer::{FtpDataStream, FtpTransferMode};

const ANONYMOUS_USERNAME: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "netpool@";

/// Equivalence class of pooled FTP sessions.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FtpPoolKey {
    pub server: UpstreamAddr,
    /// Anonymous login if not set.
    pub credentials: Option<Credentials>,
}

impl FtpPoolKey {
    pub fn new(server: UpstreamAddr, credentials: Option<Credentials>) -> Self {
        FtpPoolKey {
            server,
            credentials,
        }
    }

    pub(crate) fn auth_scope(&self) -> AuthScope {
        AuthScope::new(AuthProtocol::Ftp, self.server.clone())
    }
}

impl fmt::Debug for FtpPoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.credentials {
            Some(c) => write!(f, "ftp://{}@{}", c.username, self.server),
            None => write!(f, "ftp://{}", self.server),
        }
    }
}

pub struct FtpConnectionFactory {
    config: Arc<FtpClientConfig>,
    auth: Option<Arc<dyn Authenticate>>,
}

impl FtpConnectionFactory {
    pub fn new(config: Arc<FtpClientConfig>, auth: Option<Arc<dyn Authenticate>>) -> Self {
        FtpConnectionFactory { config, auth }
    }

    async fn connect(&self, server: &UpstreamAddr) -> Result<TcpStream, FtpConnectError> {
        let host = server.host().to_string();
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect((host.as_str(), server.port())),
        )
        .await
        .map_err(|_| FtpConnectError::ConnectTimedOut(server.clone()))?
        .map_err(|e| FtpConnectError::ConnectFailed(server.clone(), e))?;
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    async fn wait_greetings(
        &self,
        control: &mut FtpControlChannel<FtpDataStream>,
    ) -> Result<(), FtpConnectError> {
        match tokio::time::timeout(self.config.greeting_timeout, control.wait_greetings()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(FtpCommandError::ServiceNotAvailable)) => {
                Err(FtpConnectError::ServiceNotAvailable)
            }
            Ok(Err(e)) => Err(FtpConnectError::GreetingFailed(e)),
            Err(_) => Err(FtpConnectError::GreetingTimedOut),
        }
    }

    async fn try_login(
        control: &mut FtpControlChannel<FtpDataStream>,
        username: &str,
        password: &str,
    ) -> Result<FtpAuthStatus, FtpCommandError> {
        match control.send_username(username).await? {
            FtpAuthStatus::NeedPassword => control.send_password(password).await,
            status => Ok(status),
        }
    }

    /// Log in with the key credentials, and once more with replacement
    /// credentials from the authenticator if the server rejected them.
    async fn login(
        &self,
        control: &mut FtpControlChannel<FtpDataStream>,
        key: &FtpPoolKey,
    ) -> Result<(), FtpSessionOpenError> {
        let (mut username, mut password) = match &key.credentials {
            Some(c) => (
                c.username.as_original().to_string(),
                c.password.as_original().to_string(),
            ),
            None => (
                ANONYMOUS_USERNAME.to_string(),
                ANONYMOUS_PASSWORD.to_string(),
            ),
        };

        let mut retried = false;
        loop {
            match Self::try_login(control, &username, &password).await? {
                FtpAuthStatus::LoggedIn => return Ok(()),
                FtpAuthStatus::NeedAccount => return Err(FtpSessionOpenError::AccountIsNeeded),
                FtpAuthStatus::NeedPassword | FtpAuthStatus::NotLoggedIn => {}
            }
            if retried {
                return Err(FtpSessionOpenError::NotLoggedIn);
            }
            retried = true;

            let Some(auth) = &self.auth else {
                return Err(FtpSessionOpenError::NotLoggedIn);
            };
            let scope = key.auth_scope();
            match auth.lookup(&scope) {
                Some(c)
                    if c.username.as_original() != username
                        || c.password.as_original() != password =>
                {
                    username = c.username.as_original().to_string();
                    password = c.password.as_original().to_string();
                    log::debug!("retry ftp login to {} as {username}", key.server);
                }
                _ => {
                    auth.invalidate(&scope);
                    return Err(FtpSessionOpenError::NotLoggedIn);
                }
            }
        }
    }

    async fn negotiate(
        &self,
        control: &mut FtpControlChannel<FtpDataStream>,
    ) -> Result<(FtpTransferMode, String), FtpSessionOpenError> {
        let mode = if self.config.try_block_mode && control.use_block_mode().await? {
            FtpTransferMode::Block
        } else {
            FtpTransferMode::Stream
        };
        control.use_binary_type().await?;

        let home = match control.print_working_dir().await {
            Ok(home) => home,
            Err(e) if e.is_connection_broken() => return Err(e.into()),
            Err(e) => {
                log::debug!("unable to get the home directory, use / instead: {e}");
                "/".to_string()
            }
        };
        Ok((mode, home))
    }
}

#[async_trait]
impl ResourceFactory for FtpConnectionFactory {
    type Key = FtpPoolKey;
    type Adapter = FtpConnection;
    type Error = FtpSessionOpenError;

    async fn create(&self, key: &FtpPoolKey) -> Result<FtpConnection, FtpSessionOpenError> {
        let tcp = self.connect(&key.server).await?;
        let peer_ip = tcp
            .peer_addr()
            .map_err(|e| FtpConnectError::ConnectFailed(key.server.clone(), e))?
            .ip();

        let stream = TimeoutStream::new(tcp, self.config.socket_timeout);
        let mut control = FtpControlChannel::new(
            stream,
            self.config.control.clone(),
            self.config.trace_connections,
        );
        self.wait_greetings(&mut control).await?;
        self.login(&mut control, key).await?;
        let (mode, home) = self.negotiate(&mut control).await?;
        log::debug!(
            "new ftp session {key:?} in {} mode, home {home}",
            mode.as_str()
        );

        Ok(FtpConnection::new(
            control,
            key.server.clone(),
            peer_ip,
            mode,
            home,
            self.config.clone(),
        ))
    }
}
