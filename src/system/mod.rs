pub mod event;
pub mod logging;
