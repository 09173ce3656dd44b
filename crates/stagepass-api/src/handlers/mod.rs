//! Request handlers

pub mod admin;
pub mod catalog;
pub mod health;
pub mod purchase;
pub mod resale;
pub mod transfer;
pub mod webhook;
