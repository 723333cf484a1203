pub mod barcode;
pub mod model;
pub mod service;

pub use service::InventoryService;
