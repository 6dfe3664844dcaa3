pub mod ban;
pub mod identity;
pub mod job;
pub mod surl;
pub mod transfer;
