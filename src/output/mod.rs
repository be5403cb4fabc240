mod message;

pub use message::{CollectingSink, JsonLinesWriter, Message, MessageSink};
