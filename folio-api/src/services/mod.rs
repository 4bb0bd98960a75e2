pub mod contact_service;
pub mod notification_service;
pub mod project_service;
