// Services module - certificate resolution pipeline

pub mod chain_session;
pub mod intake;
pub mod metadata_decoder;
pub mod orchestrator;
pub mod presentation;
pub mod qr_generator;
pub mod status_resolver;
