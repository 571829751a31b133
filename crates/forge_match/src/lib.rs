mod error;
mod matcher;
mod processor;

pub use error::Error;
pub use matcher::Matcher;
pub use processor::MatchProcessor;
