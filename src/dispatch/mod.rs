mod dispatcher;
mod outcome;
mod status;

pub use dispatcher::Dispatcher;
pub use outcome::DispatchOutcome;
pub use status::{StatusClass, StatusClassifier};
