pub mod base64;
pub mod http;
pub mod path;
pub mod process;
pub mod range;
