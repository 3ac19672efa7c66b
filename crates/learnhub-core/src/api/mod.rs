//! REST API client module for the learning platform.
//!
//! This module provides the `Gateway`, the single chokepoint for every
//! HTTP call, and the `ResourceClient` that exposes the course, module,
//! enrollment, feedback, notification, attachment, and statistics
//! endpoints on top of it.
//!
//! The API uses bearer token authentication; the token is issued by
//! `POST /auth/login` and read from the shared session for each request.

pub mod error;
pub mod gateway;
pub mod resources;

pub use error::GatewayError;
pub use gateway::{Gateway, LOGIN_PATH, PROFILE_PATH, REGISTER_PATH};
pub use resources::{Endpoint, Resource, ResourceClient};
