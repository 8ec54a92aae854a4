//! Chat pipeline
//!
//! - **Classifier**: picks the stateless path or the attachment workflow per message
//! - **Assistant registry**: single-flight get-or-create of the shared assistant
//! - **Run waiter**: cancellable timed wait on an assistant run
//! - **Service**: drives one chat job end to end

pub mod assistant_registry;
pub mod classifier;
pub mod prompts;
pub mod run_waiter;
pub mod service;

pub use assistant_registry::AssistantRegistry;
pub use classifier::{Classification, MessageClassifier, ModelTier};
pub use run_waiter::{wait_for_run, RunOutcome, WaitOptions};
pub use service::{ChatService, ChatSettings, JobError};
