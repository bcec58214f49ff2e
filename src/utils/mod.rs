pub mod flexible;
pub mod image;
pub mod time;
pub mod token;
pub mod validation;
