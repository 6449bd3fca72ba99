// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod admin;
pub mod config;
pub mod constants;
pub mod controller;
pub mod engine;
pub mod error;
pub mod kubernetes;
pub mod machine;
pub mod process;
pub mod registry;
pub mod retry;
pub mod selector;
pub mod setup;
pub mod types;

#[cfg(test)]
pub mod test_utils;
