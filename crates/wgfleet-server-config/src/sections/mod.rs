// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod bootstrap;
mod database;
mod http;
mod logging;
mod sessions;
mod ssh;
mod webhook;

pub use bootstrap::*;
pub use database::*;
pub use http::*;
pub use logging::*;
pub use sessions::*;
pub use ssh::*;
pub use webhook::*;
