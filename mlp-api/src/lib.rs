pub mod bootstrap;
pub mod config;
pub mod k8s;
