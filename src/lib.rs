pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod fanout;
pub mod repository;
pub mod resolver;
pub mod service;
pub mod storage;
