use serde::{Deserialize, Serialize};

use crate::utils::{format_date, format_percent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub enrollment_count: Option<u64>,
}

impl Course {
    pub fn rating_display(&self) -> String {
        match self.average_rating {
            Some(rating) => format!("{:.1}", rating),
            None => "-".to_string(),
        }
    }
}

/// Body for creating or updating a course.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewCourse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseModule {
    pub id: i64,
    #[serde(default)]
    pub course_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Body for creating or updating a module.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewModule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub course_id: i64,
    #[serde(default)]
    pub course_title: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub enrollment_date: Option<String>,
}

impl Enrollment {
    pub fn progress_display(&self) -> String {
        format_percent(self.progress)
    }

    pub fn enrolled_on(&self) -> String {
        self.enrollment_date
            .as_deref()
            .map(format_date)
            .unwrap_or_else(|| "-".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i64,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewFeedback {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: i64,
    pub module_id: i64,
    pub grade: f64,
    #[serde(default)]
    pub module_title: Option<String>,
}

/// Everything the home view needs, loaded as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dashboard {
    pub popular_courses: Vec<Course>,
    pub enrollments: Vec<Enrollment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrollment_display_helpers() {
        let json = r#"{
            "id": 1,
            "course_id": 3,
            "course_title": "Rust 101",
            "progress": 66.6,
            "enrollment_date": "2024-03-05T10:00:00+00:00"
        }"#;
        let enrollment: Enrollment = serde_json::from_str(json).unwrap();
        assert_eq!(enrollment.progress_display(), "67%");
        assert_eq!(enrollment.enrolled_on(), "Mar 05, 2024");
    }

    #[test]
    fn test_course_listing_shape() {
        // The plain listing endpoint only returns id and title
        let course: Course = serde_json::from_str(r#"{"id": 4, "title": "Databases"}"#).unwrap();
        assert_eq!(course.description, None);
        assert_eq!(course.rating_display(), "-");
    }

    #[test]
    fn test_new_course_skips_unset_fields() {
        let body = NewCourse {
            title: Some("Algorithms".to_string()),
            description: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"title": "Algorithms"})
        );
    }
}
