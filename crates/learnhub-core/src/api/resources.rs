//! Typed access to the platform's resource endpoints.
//!
//! [`Endpoint`] names every operation the client performs and knows its
//! HTTP verb and path. [`ResourceClient`] sends them all through the
//! [`Gateway`], so authorization and error handling live in one place.

use std::fmt;

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use super::gateway::decode;
use super::{Gateway, GatewayError};
use crate::models::{
    ApiMessage, Assessment, Attachment, Course, CourseModule, Dashboard, Enrollment, Feedback,
    NewCourse, NewFeedback, NewModule, Notification, UnreadCount, UploadedAttachment,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Courses,
    Modules,
    Enrollments,
    Assessments,
    Feedbacks,
    Notifications,
    Attachments,
    Statistics,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Courses => "courses",
            Resource::Modules => "modules",
            Resource::Enrollments => "enrollments",
            Resource::Assessments => "assessments",
            Resource::Feedbacks => "feedbacks",
            Resource::Notifications => "notifications",
            Resource::Attachments => "attachments",
            Resource::Statistics => "statistics",
        };
        f.write_str(name)
    }
}

/// One API operation. Ids are course, module, notification, feedback, or
/// attachment ids depending on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    // Courses
    Courses,
    Course(i64),
    CreateCourse,
    UpdateCourse(i64),
    DeleteCourse(i64),
    PopularCourses,
    CourseStatistics,
    CourseModuleStatistics,

    // Modules
    CourseModules(i64),
    Module(i64),
    CreateModule(i64),
    UpdateModule(i64),
    DeleteModule(i64),

    // Enrollments
    Enroll(i64),
    Enrollments,
    Unenroll(i64),
    CourseProgress(i64),

    // Assessments
    Assessments,
    SaveAssessment(i64),

    // Feedback
    CourseFeedbacks(i64),
    CreateFeedback(i64),
    DeleteFeedback(i64),

    // Notifications
    Notifications { unread_only: bool },
    NotificationCount,
    MarkNotificationRead(i64),
    MarkAllNotificationsRead,
    DeleteNotification(i64),
    NotificationStatistics,

    // Attachments
    ModuleAttachments(i64),
    CourseAttachments(i64),
    UploadAttachment(i64),
    DeleteAttachment(i64),
    AttachmentStatistics,

    // Statistics
    UserPerformance,
    UserActivity,
    ActiveUsers,
}

impl Endpoint {
    pub fn method(&self) -> Method {
        use Endpoint::*;
        match self {
            CreateCourse | CreateModule(_) | Enroll(_) | SaveAssessment(_) | CreateFeedback(_)
            | UploadAttachment(_) => Method::POST,
            UpdateCourse(_) | UpdateModule(_) | MarkNotificationRead(_)
            | MarkAllNotificationsRead => Method::PUT,
            DeleteCourse(_) | DeleteModule(_) | Unenroll(_) | DeleteFeedback(_)
            | DeleteNotification(_) | DeleteAttachment(_) => Method::DELETE,
            _ => Method::GET,
        }
    }

    pub fn path(&self) -> String {
        use Endpoint::*;
        match self {
            Courses | CreateCourse => "/api/courses".to_string(),
            Endpoint::Course(id) | UpdateCourse(id) | DeleteCourse(id) => {
                format!("/api/courses/{}", id)
            }
            PopularCourses => "/api/courses/popular".to_string(),
            CourseStatistics => "/api/courses/statistics".to_string(),
            CourseModuleStatistics => "/api/courses/module-statistics".to_string(),

            CourseModules(course_id) | CreateModule(course_id) => {
                format!("/api/courses/{}/modules", course_id)
            }
            Module(id) | UpdateModule(id) | DeleteModule(id) => format!("/api/modules/{}", id),

            Enroll(course_id) => format!("/api/courses/{}/enroll", course_id),
            Enrollments => "/api/enrollments".to_string(),
            Unenroll(course_id) => format!("/api/courses/{}/unenroll", course_id),
            CourseProgress(course_id) => format!("/api/courses/{}/progress", course_id),

            Assessments => "/api/assessments".to_string(),
            SaveAssessment(module_id) => format!("/api/modules/{}/assessment", module_id),

            CourseFeedbacks(course_id) => format!("/api/courses/{}/feedbacks", course_id),
            CreateFeedback(course_id) => format!("/api/courses/{}/feedback", course_id),
            DeleteFeedback(id) => format!("/api/feedbacks/{}", id),

            Notifications { unread_only: false } => "/api/notifications".to_string(),
            Notifications { unread_only: true } => "/api/notifications?unread=true".to_string(),
            NotificationCount => "/api/notifications/count".to_string(),
            MarkNotificationRead(id) => format!("/api/notifications/{}/read", id),
            MarkAllNotificationsRead => "/api/notifications/read-all".to_string(),
            DeleteNotification(id) => format!("/api/notifications/{}", id),
            NotificationStatistics => "/api/notifications/statistics".to_string(),

            ModuleAttachments(module_id) | UploadAttachment(module_id) => {
                format!("/api/modules/{}/attachments", module_id)
            }
            CourseAttachments(course_id) => format!("/api/courses/{}/attachments", course_id),
            DeleteAttachment(id) => format!("/api/attachments/{}", id),
            AttachmentStatistics => "/api/modules/attachment-statistics".to_string(),

            UserPerformance => "/api/statistics/user-performance".to_string(),
            UserActivity => "/api/statistics/user-activity".to_string(),
            ActiveUsers => "/api/statistics/active-users".to_string(),
        }
    }

    pub fn resource(&self) -> Resource {
        use Endpoint::*;
        match self {
            Courses | Endpoint::Course(_) | CreateCourse | UpdateCourse(_) | DeleteCourse(_)
            | PopularCourses | CourseStatistics | CourseModuleStatistics => Resource::Courses,
            CourseModules(_) | Module(_) | CreateModule(_) | UpdateModule(_) | DeleteModule(_) => {
                Resource::Modules
            }
            Enroll(_) | Enrollments | Unenroll(_) | CourseProgress(_) => Resource::Enrollments,
            Assessments | SaveAssessment(_) => Resource::Assessments,
            CourseFeedbacks(_) | CreateFeedback(_) | DeleteFeedback(_) => Resource::Feedbacks,
            Notifications { .. } | NotificationCount | MarkNotificationRead(_)
            | MarkAllNotificationsRead | DeleteNotification(_) | NotificationStatistics => {
                Resource::Notifications
            }
            ModuleAttachments(_) | CourseAttachments(_) | UploadAttachment(_)
            | DeleteAttachment(_) | AttachmentStatistics => Resource::Attachments,
            UserPerformance | UserActivity | ActiveUsers => Resource::Statistics,
        }
    }
}

/// Typed client over the [`Gateway`].
/// Clone is cheap - it only wraps the gateway.
#[derive(Clone)]
pub struct ResourceClient {
    gateway: Gateway,
}

impl ResourceClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Call an endpoint that takes no body.
    pub async fn call<T: DeserializeOwned>(&self, endpoint: Endpoint) -> Result<T, GatewayError> {
        let path = Self::prepare(&endpoint)?;
        match endpoint.method() {
            Method::GET => self.gateway.get(&path).await,
            Method::DELETE => self.gateway.delete(&path).await,
            // Bodyless POST/PUT, e.g. enroll or read-all
            method => {
                let value = self.gateway.request(method, &path, None).await?;
                decode(&path, value)
            }
        }
    }

    /// Call an endpoint with a JSON body.
    pub async fn call_with<T, B>(&self, endpoint: Endpoint, body: &B) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let path = Self::prepare(&endpoint)?;
        match endpoint.method() {
            Method::POST => self.gateway.post(&path, body).await,
            Method::PUT => self.gateway.put(&path, body).await,
            method => Err(GatewayError::InvalidRequest(format!(
                "{} {} does not take a body",
                method, path
            ))),
        }
    }

    fn prepare(endpoint: &Endpoint) -> Result<String, GatewayError> {
        if let Endpoint::UploadAttachment(_) = endpoint {
            return Err(GatewayError::InvalidRequest(
                "Attachments are sent with upload_attachment".to_string(),
            ));
        }
        debug!(resource = %endpoint.resource(), ?endpoint, "Resource call");
        Ok(endpoint.path())
    }

    // ===== Courses =====

    pub async fn courses(&self) -> Result<Vec<Course>, GatewayError> {
        self.call(Endpoint::Courses).await
    }

    pub async fn course(&self, course_id: i64) -> Result<Course, GatewayError> {
        self.call(Endpoint::Course(course_id)).await
    }

    pub async fn create_course(&self, course: &NewCourse) -> Result<Value, GatewayError> {
        self.call_with(Endpoint::CreateCourse, course).await
    }

    pub async fn update_course(
        &self,
        course_id: i64,
        course: &NewCourse,
    ) -> Result<Value, GatewayError> {
        self.call_with(Endpoint::UpdateCourse(course_id), course).await
    }

    pub async fn delete_course(&self, course_id: i64) -> Result<Option<ApiMessage>, GatewayError> {
        self.call(Endpoint::DeleteCourse(course_id)).await
    }

    pub async fn popular_courses(&self) -> Result<Vec<Course>, GatewayError> {
        self.call(Endpoint::PopularCourses).await
    }

    // ===== Modules =====

    pub async fn course_modules(&self, course_id: i64) -> Result<Vec<CourseModule>, GatewayError> {
        self.call(Endpoint::CourseModules(course_id)).await
    }

    pub async fn module(&self, module_id: i64) -> Result<CourseModule, GatewayError> {
        self.call(Endpoint::Module(module_id)).await
    }

    pub async fn create_module(
        &self,
        course_id: i64,
        module: &NewModule,
    ) -> Result<Value, GatewayError> {
        self.call_with(Endpoint::CreateModule(course_id), module).await
    }

    pub async fn update_module(
        &self,
        module_id: i64,
        module: &NewModule,
    ) -> Result<Value, GatewayError> {
        self.call_with(Endpoint::UpdateModule(module_id), module).await
    }

    pub async fn delete_module(&self, module_id: i64) -> Result<Option<ApiMessage>, GatewayError> {
        self.call(Endpoint::DeleteModule(module_id)).await
    }

    // ===== Enrollments and assessments =====

    pub async fn enroll(&self, course_id: i64) -> Result<Option<ApiMessage>, GatewayError> {
        self.call(Endpoint::Enroll(course_id)).await
    }

    pub async fn unenroll(&self, course_id: i64) -> Result<Option<ApiMessage>, GatewayError> {
        self.call(Endpoint::Unenroll(course_id)).await
    }

    pub async fn enrollments(&self) -> Result<Vec<Enrollment>, GatewayError> {
        self.call(Endpoint::Enrollments).await
    }

    pub async fn course_progress(&self, course_id: i64) -> Result<Value, GatewayError> {
        self.call(Endpoint::CourseProgress(course_id)).await
    }

    pub async fn assessments(&self) -> Result<Vec<Assessment>, GatewayError> {
        self.call(Endpoint::Assessments).await
    }

    pub async fn save_assessment(&self, module_id: i64, grade: f64) -> Result<Value, GatewayError> {
        self.call_with(
            Endpoint::SaveAssessment(module_id),
            &serde_json::json!({ "grade": grade }),
        )
        .await
    }

    // ===== Feedback =====

    pub async fn course_feedbacks(&self, course_id: i64) -> Result<Vec<Feedback>, GatewayError> {
        self.call(Endpoint::CourseFeedbacks(course_id)).await
    }

    pub async fn create_feedback(
        &self,
        course_id: i64,
        feedback: &NewFeedback,
    ) -> Result<Value, GatewayError> {
        self.call_with(Endpoint::CreateFeedback(course_id), feedback).await
    }

    pub async fn delete_feedback(
        &self,
        feedback_id: i64,
    ) -> Result<Option<ApiMessage>, GatewayError> {
        self.call(Endpoint::DeleteFeedback(feedback_id)).await
    }

    // ===== Notifications =====

    pub async fn notifications(
        &self,
        unread_only: bool,
    ) -> Result<Vec<Notification>, GatewayError> {
        self.call(Endpoint::Notifications { unread_only }).await
    }

    pub async fn unread_count(&self) -> Result<u64, GatewayError> {
        let count: UnreadCount = self.call(Endpoint::NotificationCount).await?;
        Ok(count.unread_count)
    }

    pub async fn mark_notification_read(
        &self,
        notification_id: i64,
    ) -> Result<Option<ApiMessage>, GatewayError> {
        self.call(Endpoint::MarkNotificationRead(notification_id)).await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<Option<ApiMessage>, GatewayError> {
        self.call(Endpoint::MarkAllNotificationsRead).await
    }

    pub async fn delete_notification(
        &self,
        notification_id: i64,
    ) -> Result<Option<ApiMessage>, GatewayError> {
        self.call(Endpoint::DeleteNotification(notification_id)).await
    }

    // ===== Attachments =====

    pub async fn module_attachments(
        &self,
        module_id: i64,
    ) -> Result<Vec<Attachment>, GatewayError> {
        self.call(Endpoint::ModuleAttachments(module_id)).await
    }

    pub async fn course_attachments(
        &self,
        course_id: i64,
    ) -> Result<Vec<Attachment>, GatewayError> {
        self.call(Endpoint::CourseAttachments(course_id)).await
    }

    pub async fn upload_attachment(
        &self,
        module_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        mime: Option<&str>,
    ) -> Result<UploadedAttachment, GatewayError> {
        let endpoint = Endpoint::UploadAttachment(module_id);
        debug!(
            resource = %endpoint.resource(),
            file_name,
            size = bytes.len(),
            "Uploading attachment"
        );
        self.gateway
            .upload(&endpoint.path(), file_name, bytes, mime)
            .await
    }

    pub async fn delete_attachment(
        &self,
        attachment_id: i64,
    ) -> Result<Option<ApiMessage>, GatewayError> {
        self.call(Endpoint::DeleteAttachment(attachment_id)).await
    }

    // ===== Views =====

    /// Load the home view: popular courses and the user's enrollments,
    /// requested concurrently. Either failure fails the whole view.
    pub async fn load_dashboard(&self) -> Result<Dashboard, GatewayError> {
        let (popular_courses, enrollments) =
            futures::try_join!(self.popular_courses(), self.enrollments())?;
        Ok(Dashboard {
            popular_courses,
            enrollments,
        })
    }
}
