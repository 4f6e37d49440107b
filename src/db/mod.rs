pub mod entities;
pub mod enums;
pub mod models;
pub mod repository;
pub mod services;
