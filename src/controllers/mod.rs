pub mod send_controller;

pub use send_controller::{SendController, SendOptions, SendPhase};
