pub mod conversation;
pub mod exchange;
pub mod message;
pub mod tool;

pub use conversation::Conversation;
pub use exchange::{
    AiProvider, CapturedRequest, CapturedResponse, EndpointDescriptor, InterceptedExchange,
    ParsedChatExchange, ParsedMessage,
};
pub use message::{Message, MessageRole};
pub use tool::ToolTag;
