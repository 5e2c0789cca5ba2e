/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod error;
pub use error::HttpLineParseError;

pub mod block;
pub mod chunked;

mod header_line;
pub use header_line::HttpHeaderLine;
