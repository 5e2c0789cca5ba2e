/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use log::Level;

pub const HTTP_TRACE_LOG_LEVEL: Level = Level::Debug;
pub const HTTP_TRACE_LOG_TARGET: &str = "netpool_http::trace";

pub(crate) fn log_request_head(head: &[u8]) {
    for line in String::from_utf8_lossy(head).lines() {
        if line.is_empty() {
            continue;
        }
        if let Some((name, _)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("authorization")
                || name.eq_ignore_ascii_case("proxy-authorization")
            {
                log::log!(target: HTTP_TRACE_LOG_TARGET, HTTP_TRACE_LOG_LEVEL, "> {name}: ******");
                continue;
            }
        }
        log::log!(target: HTTP_TRACE_LOG_TARGET, HTTP_TRACE_LOG_LEVEL, "> {line}");
    }
}

pub(crate) fn log_response_head(head: &crate::HttpResponseHead) {
    log::log!(
        target: HTTP_TRACE_LOG_TARGET,
        HTTP_TRACE_LOG_LEVEL,
        "< {:?} {} {}",
        head.version,
        head.code,
        head.reason
    );
    for (name, value) in head.headers.iter() {
        log::log!(
            target: HTTP_TRACE_LOG_TARGET,
            HTTP_TRACE_LOG_LEVEL,
            "< {name}: {}",
            String::from_utf8_lossy(value.as_bytes())
        );
    }
}
