/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod error;
pub use error::HttpResponseParseError;

mod status_line;
pub use status_line::HttpStatusLine;
