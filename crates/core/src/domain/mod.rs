pub mod context;
pub mod intent;
pub mod message;
