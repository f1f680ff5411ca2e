//! Per-queue job handlers (spec.md §4.7).

pub mod image_upload;
pub mod product_family;
pub mod sink;
pub mod supplier_sync;
