use crate::aggregate::{AttendanceSummary, DashboardStats, FinanceSummary};
use crate::api::attendance::{CheckInResponse, CheckOutRequest, CheckOutResponse};
use crate::api::finance::SalaryStatusUpdate;
use crate::api::kudos::KudosBalance;
use crate::api::leave_request::LeaveReview;
use crate::api::meeting::{AttendanceOutcome, AttendanceSheet};
use crate::api::training::EnrollRequest;
use crate::api::user::CreateUserRequest;
use crate::auth::roster::Teammate;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::finance::{
    FinanceTransaction, NewFinanceTransaction, NewSalaryRecord, SalaryRecord, SalaryStatus,
    TransactionType,
};
use crate::model::kudos::{KudosTransaction, NewKudos};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::model::meeting::{AttendanceMark, Meeting, MeetingAttendance, MeetingPatch, NewMeeting};
use crate::model::project::{NewProject, Project, ProjectPatch};
use crate::model::role::Role;
use crate::model::task::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
use crate::model::training::{
    CoursePatch, NewTrainingCourse, TrainingCourse, TrainingProgress, TrainingProgressUpdate,
};
use crate::model::user::{UserPatch, UserProfile};
use crate::models::{LoginRequest, LoginResponse};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Team Dashboard API",
        version = "1.0.0",
        description = r#"
## Team Dashboard

Backend for a small team's internal dashboard: projects and tasks, leave,
attendance, finance, kudos, training and meetings.

### Key Features
- **Aggregated reports**
  - Dashboard stats, finance summary and attendance summary computed on each request
- **Attendance**
  - Daily check-in and check-out with worked hours
- **Kudos ledger**
  - Manual grants, training completion rewards and missed-meeting penalties

### Security
Every endpoint except login requires a **JWT Bearer** token.
Provisioning users, reviewing leave and writing finance records need the **admin** role.

### Degraded reports
`/finance/summary` and `/attendance/summary` answer with an all-zero report and the
`x-report-degraded: true` header when the record store is unreachable.
"#,
    ),
    paths(
        crate::auth::handlers::login,

        crate::api::dashboard::stats,

        crate::api::user::list_users,
        crate::api::user::get_user,
        crate::api::user::create_user,
        crate::api::user::update_user,
        crate::api::user::delete_user,

        crate::api::project::list_projects,
        crate::api::project::create_project,
        crate::api::project::update_project,
        crate::api::project::delete_project,

        crate::api::task::list_tasks,
        crate::api::task::create_task,
        crate::api::task::update_task,
        crate::api::task::delete_task,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::review_leave,

        crate::api::finance::list_transactions,
        crate::api::finance::create_transaction,
        crate::api::finance::delete_transaction,
        crate::api::finance::list_salaries,
        crate::api::finance::create_salary,
        crate::api::finance::update_salary_status,
        crate::api::finance::summary,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::records,
        crate::api::attendance::summary,

        crate::api::kudos::list_transactions,
        crate::api::kudos::give_kudos,
        crate::api::kudos::balance,

        crate::api::training::list_courses,
        crate::api::training::create_course,
        crate::api::training::update_course,
        crate::api::training::list_progress,
        crate::api::training::enroll,
        crate::api::training::update_progress,

        crate::api::meeting::list_meetings,
        crate::api::meeting::create_meeting,
        crate::api::meeting::update_meeting,
        crate::api::meeting::list_attendance,
        crate::api::meeting::record_attendance,
        crate::api::meeting::apply_penalties
    ),
    components(
        schemas(
            LoginRequest,
            LoginResponse,
            Role,
            UserProfile,
            UserPatch,
            Teammate,
            CreateUserRequest,
            DashboardStats,
            FinanceSummary,
            AttendanceSummary,
            Project,
            NewProject,
            ProjectPatch,
            Task,
            NewTask,
            TaskPatch,
            TaskStatus,
            TaskPriority,
            LeaveRequest,
            NewLeaveRequest,
            LeaveReview,
            LeaveStatus,
            FinanceTransaction,
            NewFinanceTransaction,
            TransactionType,
            SalaryRecord,
            NewSalaryRecord,
            SalaryStatus,
            SalaryStatusUpdate,
            AttendanceRecord,
            AttendanceStatus,
            CheckInResponse,
            CheckOutRequest,
            CheckOutResponse,
            KudosTransaction,
            NewKudos,
            KudosBalance,
            TrainingCourse,
            NewTrainingCourse,
            CoursePatch,
            TrainingProgress,
            TrainingProgressUpdate,
            EnrollRequest,
            Meeting,
            NewMeeting,
            MeetingPatch,
            MeetingAttendance,
            AttendanceMark,
            AttendanceSheet,
            AttendanceOutcome
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login"),
        (name = "Dashboard", description = "Aggregated team and personal stats"),
        (name = "Users", description = "Teammate directory and provisioning"),
        (name = "Projects", description = "Project management APIs"),
        (name = "Tasks", description = "Task management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Finance", description = "Transactions, salaries and the finance summary"),
        (name = "Attendance", description = "Check-in, check-out and attendance summary"),
        (name = "Kudos", description = "Kudos ledger"),
        (name = "Training", description = "Courses and enrollment progress"),
        (name = "Meetings", description = "Meetings, attendance and penalties"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_protected_path_is_documented_with_bearer_auth() {
        let doc = ApiDoc::openapi();
        let components = doc.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/dashboard/stats"));
        assert!(doc.paths.paths.contains_key("/api/meetings/{meeting_id}/penalties"));
        assert!(doc.paths.paths.contains_key("/api/auth/login"));
        assert!(doc.paths.paths.contains_key("/api/users/{user_id}"));
        assert!(doc.paths.paths.contains_key("/api/training/courses/{course_id}"));
    }
}
