/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod head;
pub(crate) use head::HttpBodyType;
pub use head::HttpResponseHead;

mod body;
pub use body::HttpResponse;
