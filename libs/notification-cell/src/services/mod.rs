pub mod consumer;
pub mod dispatcher;
pub mod email;
pub mod queue;
pub mod templates;

pub use consumer::*;
pub use dispatcher::*;
pub use email::{email_transport, EmailTransport, HttpEmailTransport, LoggingEmailTransport};
pub use queue::*;
pub use templates::render;
