//! Translation between the OpenAI wire format and the upstream chat API
//!
//! Both directions are plain functions over their inputs. The only stateful piece is
//! [`StreamTranslator`], whose state belongs to a single response stream.

pub mod request;
pub mod response;
pub mod stream;

pub use request::{translate, validate_tool_name, validate_tool_schema};
pub use response::translate_complete;
pub use stream::{translate_stream, StreamTranslator};
