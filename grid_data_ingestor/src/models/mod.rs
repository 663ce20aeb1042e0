pub mod operator;
pub mod request;
