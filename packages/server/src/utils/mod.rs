pub mod filename;
pub mod hash;
pub mod jwt;
pub mod mime;
pub mod slug;
pub mod token;
