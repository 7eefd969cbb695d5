pub mod auth_dto;
pub mod playback_dto;
pub mod proctor_dto;
