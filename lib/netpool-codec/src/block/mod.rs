/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

//! FTP block mode (`MODE B`) framing.
//!
//! Each block is a 1 byte descriptor, a 2 byte big endian length and the
//! payload. The descriptor bits are defined in RFC 959 section 3.4.2.

mod decoder;
pub use decoder::BlockDecodeReader;

mod encoder;
pub use encoder::BlockEncodeWriter;

pub const DESCRIPTOR_EOR: u8 = 0x80;
pub const DESCRIPTOR_EOF: u8 = 0x40;
pub const DESCRIPTOR_SUSPECT_ERRORS: u8 = 0x20;
pub const DESCRIPTOR_RESTART_MARKER: u8 = 0x10;

pub const MAX_BLOCK_SIZE: usize = u16::MAX as usize;
