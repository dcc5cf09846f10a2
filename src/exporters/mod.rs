// SPDX-License-Identifier: Apache-2.0

pub mod cloudwatch;
pub mod http;
pub mod shared;
