/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod ext;
mod stream;

pub use ext::{FillWaitData, LimitedBufReadExt, LimitedReadUntil};
pub use stream::TimeoutStream;
