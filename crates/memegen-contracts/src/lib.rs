pub mod decode;
pub mod events;
pub mod input;
pub mod status;
pub mod templates;
