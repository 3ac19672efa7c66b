//! Plain-text rendering of views.

use learnhub_core::models::{
    Course, CourseModule, Dashboard, Enrollment, Notification, UserProfile,
};
use learnhub_core::utils::truncate_string;
use learnhub_core::GateDecision;
use serde_json::Value;

/// Column width for course titles
const TITLE_WIDTH: usize = 40;

pub fn profile(profile: &UserProfile) -> String {
    format!(
        "{} <{}>\nRole: {}",
        profile.name,
        profile.email,
        profile.role.display_name()
    )
}

pub fn greeting(profile: &UserProfile) -> String {
    format!("Welcome back, {}!", profile.first_name())
}

pub fn courses(courses: &[Course]) -> String {
    if courses.is_empty() {
        return "No courses yet.".to_string();
    }
    let mut out = format!(
        "{:>5}  {:<width$}  {:>6}\n",
        "ID",
        "TITLE",
        "RATING",
        width = TITLE_WIDTH
    );
    for course in courses {
        out.push_str(&format!(
            "{:>5}  {:<width$}  {:>6}\n",
            course.id,
            truncate_string(&course.title, TITLE_WIDTH),
            course.rating_display(),
            width = TITLE_WIDTH
        ));
    }
    out.trim_end().to_string()
}

pub fn enrollments(enrollments: &[Enrollment]) -> String {
    if enrollments.is_empty() {
        return "You are not enrolled in any courses.".to_string();
    }
    let mut out = String::new();
    for enrollment in enrollments {
        out.push_str(&format!(
            "{:<width$}  {:>4}  enrolled {}\n",
            truncate_string(&enrollment.course_title, TITLE_WIDTH),
            enrollment.progress_display(),
            enrollment.enrolled_on(),
            width = TITLE_WIDTH
        ));
    }
    out.trim_end().to_string()
}

pub fn dashboard(dashboard: &Dashboard) -> String {
    format!(
        "Popular courses\n{}\n\nMy courses\n{}",
        courses(&dashboard.popular_courses),
        enrollments(&dashboard.enrollments)
    )
}

pub fn course_details(course: &Course, modules: &[CourseModule]) -> String {
    let mut out = format!("{} (rating {})\n", course.title, course.rating_display());
    if let Some(description) = course.description.as_deref() {
        out.push_str(description);
        out.push('\n');
    }
    out.push_str("\nModules\n");
    if modules.is_empty() {
        out.push_str("  none");
    }
    for (i, module) in modules.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, module.title));
    }
    out.trim_end().to_string()
}

pub fn notifications(notifications: &[Notification]) -> String {
    if notifications.is_empty() {
        return "No notifications.".to_string();
    }
    let mut out = String::new();
    for n in notifications {
        let marker = if n.is_read { " " } else { "*" };
        out.push_str(&format!(
            "{} [{}] {}: {}\n",
            marker,
            n.created_display(),
            n.title,
            n.message
        ));
    }
    out.trim_end().to_string()
}

pub fn unread_badge(count: u64) -> String {
    match count {
        0 => "No unread notifications".to_string(),
        1 => "1 unread notification".to_string(),
        n => format!("{} unread notifications", n),
    }
}

pub fn statistics(stats: &Value) -> String {
    serde_json::to_string_pretty(stats).unwrap_or_else(|_| stats.to_string())
}

/// Message for a navigation that did not render.
pub fn redirect(decision: GateDecision) -> &'static str {
    match decision {
        GateDecision::RedirectToLogin => "Not logged in. Run `learnhub login` first.",
        GateDecision::RedirectToHome => "Already logged in. Run `learnhub logout` first.",
        GateDecision::Loading => "Still checking your session, try again.",
        GateDecision::RenderProtected | GateDecision::RenderPublic => "",
    }
}
