// SPDX-License-Identifier: Apache-2.0

pub mod aws_signing_service;
