pub mod push_token_dto;
pub mod push_token_handlers;
pub mod push_token_models;
pub mod push_token_repository;

pub use push_token_repository::PushTokenRepository;
