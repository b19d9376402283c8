pub mod admission;
pub mod audio;
pub mod cache;
pub mod config;
pub mod db;
pub mod http;
pub mod repositories;
