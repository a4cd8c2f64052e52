pub mod process;
pub mod rules;
pub mod serve;
pub mod set_webhook;
