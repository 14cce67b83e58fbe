pub mod availability;
pub mod course;
pub mod notification;
pub mod subscription;
