pub mod attendance;
pub mod finance;
pub mod kudos;
pub mod leave_request;
pub mod meeting;
pub mod project;
pub mod role;
pub mod task;
pub mod timestamp;
pub mod training;
pub mod user;
