pub mod payment_service;
pub mod provision_service;
pub mod sync_service;
