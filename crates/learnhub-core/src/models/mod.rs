//! Data models for learnhub entities.
//!
//! This module contains the data structures exchanged with the course
//! platform API:
//!
//! - `UserProfile`, `Role`: the signed-in user's identity snapshot
//! - `Course`, `CourseModule`, `Enrollment`, `Feedback`, `Assessment`
//! - `Notification`, `UnreadCount`: inbox data and the polled badge count
//! - `Attachment`, `UploadedAttachment`: module file attachments
//! - Response envelopes for the auth endpoints

pub mod auth;
pub mod course;
pub mod notification;
pub mod user;

pub use auth::{ApiMessage, LoginRequest, LoginResponse, RegisterRequest};
pub use course::{
    Assessment, Course, CourseModule, Dashboard, Enrollment, Feedback, NewCourse, NewFeedback,
    NewModule,
};
pub use notification::{Attachment, Notification, UnreadCount, UploadedAttachment};
pub use user::{Role, UserProfile};
