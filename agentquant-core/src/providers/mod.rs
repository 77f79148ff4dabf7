pub mod agent;
pub mod backend;

pub use agent::AgentClient;
pub use backend::BackendClient;
