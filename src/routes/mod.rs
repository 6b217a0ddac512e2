//! Route modules for the invoice OCR server

pub mod health;
pub mod summary;
