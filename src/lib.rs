pub mod archive;
pub mod auth;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod install;
pub mod package;
pub mod provider;
pub mod resolver;
pub mod runtime;
pub mod store;
