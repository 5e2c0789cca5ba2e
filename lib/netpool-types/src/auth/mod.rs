/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod user;
pub use user::{Password, Username};

mod store;
pub use store::{AuthProtocol, AuthScope, Authenticate, Credentials, MemoryAuthenticator};
