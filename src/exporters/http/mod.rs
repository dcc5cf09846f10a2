// SPDX-License-Identifier: Apache-2.0

pub mod client;
pub mod tls;
pub mod types;
