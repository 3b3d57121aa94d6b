pub mod orchestrator;
pub mod orders;
pub mod system;
