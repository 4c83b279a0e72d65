pub mod canonical;
pub mod chunk;
pub(crate) mod error_shapes;
pub mod tool_calls;
