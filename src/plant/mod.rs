pub mod plant_dto;
pub mod plant_handlers;
pub mod plant_models;
pub mod plant_repository;
pub mod plant_service;

pub use plant_repository::PlantRepository;
pub use plant_service::PlantService;
