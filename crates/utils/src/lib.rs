pub mod response;
pub mod scratch;
