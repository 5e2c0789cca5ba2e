/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use log::Level;

pub const FTP_TRACE_LOG_LEVEL: Level = Level::Debug;
pub const FTP_TRACE_LOG_TARGET: &str = "netpool_ftp_client::trace";

#[inline]
pub(crate) fn log_cmd(cmd: &str) {
    log::log!(target: FTP_TRACE_LOG_TARGET, FTP_TRACE_LOG_LEVEL, "> {cmd}");
}

#[inline]
pub(crate) fn log_rsp(rsp: &str) {
    log::log!(target: FTP_TRACE_LOG_TARGET, FTP_TRACE_LOG_LEVEL, "< {rsp}");
}
