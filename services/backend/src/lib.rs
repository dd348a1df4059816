//! Song upload service: audio and cover blobs live in an object store, song
//! metadata in a document store, and [`controllers::SongController`] keeps the
//! two in step.

pub mod controllers;
pub mod db;
pub mod errors;
pub mod models;
pub mod routers;
pub mod secrets;
pub mod storage;
