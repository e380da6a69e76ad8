mod handler;
mod model;

pub use handler::{create_appointment, delete_appointment, update_appointment, view_appointments};
pub use model::Appointment;
