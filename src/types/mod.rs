// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Value types shared by the controller, admins and registry coordinator.

pub mod cluster;
pub mod hosting;
pub mod registry;

pub use cluster::{Cluster, ClusterList, ClusterStatus, Product};
pub use hosting::LocalRegistryHostingV1;
pub use registry::{Registry, RegistryList, RegistryStatus};
