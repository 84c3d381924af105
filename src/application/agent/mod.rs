pub mod errors;
pub mod policy;
pub mod prompts;
pub mod runner;
pub mod stepper;
pub mod validator;

pub use errors::{AgentError, DecisionError, InvalidAction};
pub use policy::CreateIntentConfig;
pub use runner::{AgentRunner, RunOptions};

#[cfg(test)]
mod tests;
