pub mod ban_dto;
pub mod submission_dto;
