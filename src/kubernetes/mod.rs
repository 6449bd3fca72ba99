// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for contexts, client caching and registry discovery.

pub mod client;
pub mod contexts;
pub mod hosting;

pub use client::{ClientCache, ClientLoader, KubeconfigClientLoader};
pub use contexts::{product_from_context, ContextStore, KubeconfigStore};
pub use hosting::{publish_local_registry_hosting, read_local_registry_hosting};
