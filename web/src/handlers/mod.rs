//! HTTP request handlers for the Orderhub read API.

pub mod health;
pub mod order;
