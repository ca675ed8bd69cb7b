pub mod app;
pub mod app_event;
pub mod notifications;
pub mod view_state;
