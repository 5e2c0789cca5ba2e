/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod line;
pub use line::HttpChunkedLine;

mod decoder;
pub use decoder::ChunkedDecodeReader;

mod encoder;
pub use encoder::ChunkedEncodeWriter;
