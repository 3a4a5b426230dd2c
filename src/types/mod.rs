pub mod policy;
pub mod request;
pub mod response;
